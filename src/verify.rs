use crate::state::{Game, Score};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Home,
    Away,
}

/// Higher final score wins; a level score has no winner.
pub fn final_winner(score: Score) -> Option<Side> {
    if score.home > score.away {
        Some(Side::Home)
    } else if score.away > score.home {
        Some(Side::Away)
    } else {
        None
    }
}

/// Compares a committed pick against the final score.
pub fn verify_pick(pick_id: &str, home_id: &str, away_id: &str, score: Score) -> Option<bool> {
    let winner_id = match final_winner(score)? {
        Side::Home => home_id,
        Side::Away => away_id,
    };
    Some(pick_id == winner_id)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AccuracySummary {
    pub total: usize,
    pub correct: usize,
}

impl AccuracySummary {
    pub fn from_games(games: &[Game]) -> Self {
        let mut summary = Self::default();
        for verdict in games.iter().filter_map(|g| g.prediction_correct) {
            summary.total += 1;
            if verdict {
                summary.correct += 1;
            }
        }
        summary
    }

    pub fn wrong(&self) -> usize {
        self.total - self.correct
    }

    /// Whole-number accuracy; zero when nothing has been verified.
    pub fn percent(&self) -> u32 {
        if self.total == 0 {
            return 0;
        }
        (self.correct as f64 * 100.0 / self.total as f64).round() as u32
    }
}
