use std::collections::VecDeque;
use std::time::SystemTime;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::analysis::AiPrediction;
use crate::odds_snapshot::MarketTableRow;
use crate::verify::AccuracySummary;

const MAX_LOG_LINES: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameStatus {
    Scheduled,
    Live,
    Finished,
}

impl GameStatus {
    /// Maps the schedule feed's `status.type.state` value. Unknown states are
    /// treated as not started.
    pub fn from_feed_state(state: &str) -> Self {
        match state.trim().to_ascii_lowercase().as_str() {
            "in" => Self::Live,
            "post" => Self::Finished,
            _ => Self::Scheduled,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Scheduled => "SCHEDULED",
            Self::Live => "LIVE",
            Self::Finished => "FINISHED",
        }
    }
}

/// Which tier produced a game's probability. All tiers fill the same `MarketData`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OddsSource {
    #[serde(rename = "POLYMARKET")]
    PredictionMarket,
    #[serde(rename = "SPORTSBOOK")]
    Sportsbook,
    #[serde(rename = "STATS")]
    Stats,
}

impl OddsSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PredictionMarket => "POLYMARKET",
            Self::Sportsbook => "SPORTSBOOK",
            Self::Stats => "STATS",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "POLYMARKET" => Some(Self::PredictionMarket),
            "SPORTSBOOK" => Some(Self::Sportsbook),
            "STATS" => Some(Self::Stats),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    En,
    #[default]
    Zh,
}

impl Language {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "en" | "eng" | "english" => Some(Self::En),
            "zh" | "zh-tw" | "chinese" => Some(Self::Zh),
            _ => None,
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Self::En => Self::Zh,
            Self::Zh => Self::En,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Zh => "zh",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamStats {
    pub id: String,
    pub name: String,
    pub name_zh: String,
    pub wins: u32,
    pub losses: u32,
    pub ppg: f64,
    pub oppg: f64,
    pub last10: String,
    /// Recent form in [0, 1], always derived from `last10`.
    pub momentum: f64,
    pub logo: String,
}

impl TeamStats {
    pub fn display_name(&self, lang: Language) -> &str {
        match lang {
            Language::En => &self.name,
            Language::Zh => &self.name_zh,
        }
    }

    /// Season win rate; a team with no games played divides by one.
    pub fn win_rate(&self) -> f64 {
        let total = u64::from(self.wins) + u64::from(self.losses);
        f64::from(self.wins) / total.max(1) as f64
    }

    pub fn record(&self) -> String {
        format!("{}-{}", self.wins, self.losses)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarketData {
    pub home_win_prob: f64,
    pub away_win_prob: f64,
    pub volume: f64,
}

impl MarketData {
    pub fn from_home(home_win_prob: f64, volume: f64) -> Self {
        Self {
            home_win_prob,
            away_win_prob: 1.0 - home_win_prob,
            volume,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Score {
    pub home: u32,
    pub away: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Game {
    pub id: String,
    pub home: TeamStats,
    pub away: TeamStats,
    pub start_time: String,
    pub status: GameStatus,
    pub score: Option<Score>,
    pub period: Option<u32>,
    pub clock: Option<String>,
    pub market: MarketData,
    pub odds_source: OddsSource,
    /// True when `market` is the frozen pre-game snapshot rather than a fallback.
    pub is_closing_odds: bool,
    pub predicted_winner_id: Option<String>,
    pub prediction_correct: Option<bool>,
    pub is_locked: bool,
}

impl Game {
    pub fn result_verified(&self) -> bool {
        self.prediction_correct.is_some()
    }

    pub fn predicted_team(&self) -> Option<&TeamStats> {
        let pick = self.predicted_winner_id.as_deref()?;
        if pick == self.home.id {
            Some(&self.home)
        } else if pick == self.away.id {
            Some(&self.away)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Games,
    MarketTable,
}

#[derive(Debug, Clone)]
pub struct AnalysisPanel {
    pub game_id: String,
    pub loading: bool,
    pub prediction: Option<AiPrediction>,
}

pub struct AppState {
    pub screen: Screen,
    pub date: NaiveDate,
    pub language: Language,
    pub games: Vec<Game>,
    pub selected: usize,
    pub loading: bool,
    pub fetch_error: Option<String>,
    /// Bumped whenever a refresh is requested; deltas from older refreshes are dropped.
    pub generation: u64,
    pub last_refresh: Option<SystemTime>,
    pub analysis: Option<AnalysisPanel>,
    pub market_table: Vec<MarketTableRow>,
    pub help_overlay: bool,
    pub logs: VecDeque<String>,
}

impl AppState {
    pub fn new(date: NaiveDate, language: Language) -> Self {
        Self {
            screen: Screen::Games,
            date,
            language,
            games: Vec::new(),
            selected: 0,
            loading: false,
            fetch_error: None,
            generation: 0,
            last_refresh: None,
            analysis: None,
            market_table: Vec::new(),
            help_overlay: false,
            logs: VecDeque::with_capacity(MAX_LOG_LINES),
        }
    }

    /// Starts a new refresh cycle and returns its generation tag.
    pub fn begin_refresh(&mut self) -> u64 {
        self.generation = self.generation.wrapping_add(1);
        self.loading = true;
        self.generation
    }

    pub fn shift_date(&mut self, days: i64) {
        if let Some(next) = self.date.checked_add_signed(chrono::Duration::days(days)) {
            self.date = next;
            self.games.clear();
            self.selected = 0;
            self.analysis = None;
        }
    }

    pub fn selected_game(&self) -> Option<&Game> {
        self.games.get(self.selected)
    }

    pub fn select_next(&mut self) {
        if self.games.is_empty() {
            self.selected = 0;
            return;
        }
        self.selected = (self.selected + 1).min(self.games.len() - 1);
    }

    pub fn select_prev(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn toggle_screen(&mut self) {
        self.screen = match self.screen {
            Screen::Games => Screen::MarketTable,
            Screen::MarketTable => Screen::Games,
        };
    }

    pub fn accuracy(&self) -> AccuracySummary {
        AccuracySummary::from_games(&self.games)
    }

    pub fn push_log(&mut self, msg: impl Into<String>) {
        if self.logs.len() >= MAX_LOG_LINES {
            self.logs.pop_front();
        }
        self.logs.push_back(msg.into());
    }
}

#[derive(Debug, Clone)]
pub enum Delta {
    SetGames {
        generation: u64,
        games: Vec<Game>,
    },
    RefreshFailed {
        generation: u64,
        message: String,
    },
    SetAnalysis {
        game_id: String,
        prediction: AiPrediction,
    },
    SetMarketTable(Vec<MarketTableRow>),
    Log(String),
}

#[derive(Debug, Clone)]
pub enum ProviderCommand {
    Refresh { date: NaiveDate, generation: u64 },
    Analyze { game: Box<Game>, language: Language },
    LoadMarketTable,
}

pub fn apply_delta(state: &mut AppState, delta: Delta) {
    match delta {
        Delta::SetGames { generation, games } => {
            if generation != state.generation {
                // Superseded by a later refresh (date change or manual retry).
                return;
            }
            let selected_id = state.selected_game().map(|g| g.id.clone());
            state.games = games;
            state.loading = false;
            state.fetch_error = None;
            state.last_refresh = Some(SystemTime::now());
            state.selected = selected_id
                .and_then(|id| state.games.iter().position(|g| g.id == id))
                .unwrap_or(0);
        }
        Delta::RefreshFailed {
            generation,
            message,
        } => {
            if generation != state.generation {
                return;
            }
            state.games.clear();
            state.selected = 0;
            state.loading = false;
            state.push_log(format!("[WARN] {message}"));
            state.fetch_error = Some(message);
        }
        Delta::SetAnalysis {
            game_id,
            prediction,
        } => {
            let Some(panel) = state.analysis.as_mut() else {
                return;
            };
            if panel.game_id != game_id {
                // Panel was closed or moved to another game meanwhile.
                return;
            }
            panel.loading = false;
            panel.prediction = Some(prediction);
        }
        Delta::SetMarketTable(rows) => {
            state.market_table = rows;
        }
        Delta::Log(msg) => state.push_log(msg),
    }
}
