//! Odds resolution and prediction locking.
//!
//! A game is in exactly one [`GamePhase`]. While it is pre-game the tiered
//! resolvers run and the result is frozen into the snapshot cache. Once play
//! starts, live sources are never consulted again: the frozen snapshot is
//! replayed (or the stats formula stands in), a winner is committed once, and
//! a verdict is stamped when the final score is in.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::market_fetch::{self, MarketEvent};
use crate::resolvers::{self, Estimate, ResolveContext};
use crate::schedule_fetch::{self, ScheduleEvent};
use crate::snapshot_store::{CommittedPick, KeyValueStore, SnapshotCache};
use crate::state::{Game, GameStatus, MarketData, OddsSource, Score, TeamStats};
use crate::team_stats::normalize_competitor;
use crate::verify::verify_pick;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum GamePhase {
    PreGame,
    InProgress,
    Final,
}

impl From<GameStatus> for GamePhase {
    fn from(status: GameStatus) -> Self {
        match status {
            GameStatus::Scheduled => Self::PreGame,
            GameStatus::Live => Self::InProgress,
            GameStatus::Finished => Self::Final,
        }
    }
}

impl GamePhase {
    pub fn status(self) -> GameStatus {
        match self {
            Self::PreGame => GameStatus::Scheduled,
            Self::InProgress => GameStatus::Live,
            Self::Final => GameStatus::Finished,
        }
    }

    pub fn is_locked(self) -> bool {
        self != Self::PreGame
    }

    /// Phases only move forward. Staying put is allowed.
    pub fn can_transition_to(self, next: GamePhase) -> bool {
        next >= self
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OddsResolution {
    pub market: MarketData,
    pub source: OddsSource,
    /// True only when `market` was replayed from the frozen pre-game snapshot.
    pub is_closing_odds: bool,
}

impl OddsResolution {
    fn from_estimate(estimate: Estimate, is_closing_odds: bool) -> Self {
        Self {
            market: MarketData::from_home(estimate.home_prob, estimate.volume),
            source: estimate.source,
            is_closing_odds,
        }
    }
}

/// Upstream feeds consumed by a refresh. Both calls may run on different threads.
pub trait FeedSource: Sync {
    fn schedule(&self, date: NaiveDate) -> Result<Vec<ScheduleEvent>>;
    fn market_events(&self) -> Result<Vec<MarketEvent>>;
}

pub struct HttpFeeds {
    pub schedule_url: String,
    /// `None` disables the prediction-market tier entirely.
    pub market_url: Option<String>,
}

impl FeedSource for HttpFeeds {
    fn schedule(&self, date: NaiveDate) -> Result<Vec<ScheduleEvent>> {
        schedule_fetch::fetch_schedule(&self.schedule_url, date)
    }

    fn market_events(&self) -> Result<Vec<MarketEvent>> {
        match self.market_url.as_deref() {
            Some(url) => market_fetch::fetch_market_events(url),
            None => Ok(Vec::new()),
        }
    }
}

pub struct OddsPipeline<'s> {
    cache: SnapshotCache<'s>,
}

impl<'s> OddsPipeline<'s> {
    pub fn new(store: &'s dyn KeyValueStore, prefix: &str) -> Self {
        Self {
            cache: SnapshotCache::new(store, prefix),
        }
    }

    pub fn cache(&self) -> &SnapshotCache<'s> {
        &self.cache
    }

    /// Effective phase for a feed event. A game that already has a committed
    /// pick cannot fall back to pre-game even if the feed regresses.
    pub fn phase_for(&self, event: &ScheduleEvent) -> GamePhase {
        let reported = GamePhase::from(event.status);
        if reported == GamePhase::PreGame && self.cache.read_pick(&event.id).is_some() {
            warn!(game_id = %event.id, "feed reports scheduled after lock, keeping game in progress");
            return GamePhase::InProgress;
        }
        reported
    }

    /// Probability for one game in the given phase. Never fails: every path
    /// ends at the stats formula at worst.
    pub fn resolve_odds(
        &self,
        game_id: &str,
        phase: GamePhase,
        ctx: &ResolveContext<'_>,
        now_ms: i64,
    ) -> OddsResolution {
        if phase == GamePhase::PreGame {
            let estimate = resolvers::resolve_tiered(&resolvers::pregame_tiers(), ctx)
                .unwrap_or_else(|| resolvers::stats_estimate(ctx.home, ctx.away));
            self.cache.write(game_id, &estimate, now_ms);
            return OddsResolution::from_estimate(estimate, false);
        }

        match self.cache.read(game_id) {
            Some(snapshot) => OddsResolution::from_estimate(
                Estimate {
                    home_prob: snapshot.home_prob,
                    volume: snapshot.volume,
                    source: snapshot.source,
                },
                true,
            ),
            None => {
                debug!(game_id, "no closing snapshot, using stats fallback");
                OddsResolution::from_estimate(resolvers::stats_estimate(ctx.home, ctx.away), false)
            }
        }
    }

    /// Commits the side at or above even odds, unless a pick already exists.
    pub fn commit_pick(
        &self,
        game_id: &str,
        home: &TeamStats,
        away: &TeamStats,
        market: &MarketData,
        now_ms: i64,
    ) -> CommittedPick {
        let winner = if market.home_win_prob >= 0.5 { home } else { away };
        self.cache.commit_pick(
            game_id,
            CommittedPick {
                winner_id: winner.id.clone(),
                home_prob: market.home_win_prob,
                committed_at: now_ms,
                correct: None,
            },
        )
    }

    pub fn build_game(&self, event: &ScheduleEvent, market_events: &[MarketEvent], now_ms: i64) -> Game {
        let home = normalize_competitor(&event.home);
        let away = normalize_competitor(&event.away);
        let phase = self.phase_for(event);

        let ctx = ResolveContext {
            home: &home,
            away: &away,
            spread_details: event.spread_details.as_deref(),
            market_events,
        };
        let resolution = self.resolve_odds(&event.id, phase, &ctx, now_ms);

        let score = match (phase, event.home.score, event.away.score) {
            (GamePhase::PreGame, _, _) => None,
            (_, Some(home), Some(away)) => Some(Score { home, away }),
            _ => None,
        };

        let mut predicted_winner_id = None;
        let mut prediction_correct = None;
        if phase.is_locked() {
            let pick = self.commit_pick(&event.id, &home, &away, &resolution.market, now_ms);
            if phase == GamePhase::Final {
                prediction_correct = pick.correct.or_else(|| {
                    let verdict = verify_pick(&pick.winner_id, &home.id, &away.id, score?)?;
                    Some(self.cache.record_verdict(&event.id, verdict).unwrap_or(verdict))
                });
            }
            predicted_winner_id = Some(pick.winner_id);
        }

        Game {
            id: event.id.clone(),
            home,
            away,
            start_time: event.start_time.clone(),
            status: phase.status(),
            score,
            period: event.period.filter(|_| phase.is_locked()),
            clock: event.clock.clone().filter(|_| phase.is_locked()),
            market: resolution.market,
            odds_source: resolution.source,
            is_closing_odds: resolution.is_closing_odds,
            predicted_winner_id,
            prediction_correct,
            is_locked: phase.is_locked(),
        }
    }

    pub fn build_games(
        &self,
        events: &[ScheduleEvent],
        market_events: &[MarketEvent],
        now_ms: i64,
    ) -> Vec<Game> {
        events
            .iter()
            .map(|event| self.build_game(event, market_events, now_ms))
            .collect()
    }

    /// Fetches both feeds concurrently, then resolves every game.
    ///
    /// A schedule failure fails the whole refresh (no partial game list); a
    /// market failure only removes the market tier for this cycle.
    pub fn run_refresh(&self, feeds: &dyn FeedSource, date: NaiveDate, now_ms: i64) -> Result<Vec<Game>> {
        let (schedule, markets) = rayon::join(|| feeds.schedule(date), || feeds.market_events());
        let events = schedule.with_context(|| format!("schedule unavailable for {date}"))?;
        let market_events = markets.unwrap_or_else(|err| {
            warn!(%err, "market feed unavailable, continuing without market tier");
            Vec::new()
        });

        let games = self.build_games(&events, &market_events, now_ms);
        info!(
            %date,
            games = games.len(),
            market_events = market_events.len(),
            "refresh complete"
        );
        Ok(games)
    }
}
