//! Probability estimators, tried in strict priority order.
//!
//! Each tier either produces a full estimate or declines; a higher tier that
//! answers completely overrides the tiers below it. Nothing is blended.

use tracing::debug;

use crate::market_fetch::{MarketEvent, find_market_match};
use crate::state::{OddsSource, TeamStats};
use crate::team_db;

/// Nominal volume for sportsbook lines: present, but not crowd-sourced.
pub const SPORTSBOOK_VOLUME: f64 = 50_000.0;

const SPREAD_IMPACT_PER_POINT: f64 = 0.033;
const SPREAD_MAX_IMPACT: f64 = 0.49;
const SPREAD_PROB_MIN: f64 = 0.10;
const SPREAD_PROB_MAX: f64 = 0.99;

const SEASON_WEIGHT: f64 = 0.7;
const MOMENTUM_WEIGHT: f64 = 0.3;
const HOME_COURT_BONUS: f64 = 0.05;
const STATS_PROB_MIN: f64 = 0.25;
const STATS_PROB_MAX: f64 = 0.75;

/// Inputs every resolver may read. Resolvers never fetch anything themselves.
#[derive(Debug, Clone, Copy)]
pub struct ResolveContext<'a> {
    pub home: &'a TeamStats,
    pub away: &'a TeamStats,
    pub spread_details: Option<&'a str>,
    pub market_events: &'a [MarketEvent],
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Estimate {
    pub home_prob: f64,
    pub volume: f64,
    pub source: OddsSource,
}

pub trait OddsResolver {
    fn source(&self) -> OddsSource;

    /// `None` means "no data for this game", never an error.
    fn resolve(&self, ctx: &ResolveContext<'_>) -> Option<Estimate>;
}

pub struct MarketResolver;
pub struct SportsbookResolver;
pub struct StatsResolver;

impl OddsResolver for MarketResolver {
    fn source(&self) -> OddsSource {
        OddsSource::PredictionMarket
    }

    fn resolve(&self, ctx: &ResolveContext<'_>) -> Option<Estimate> {
        let m = find_market_match(ctx.market_events, ctx.home, ctx.away)?;
        Some(Estimate {
            home_prob: m.home_prob,
            volume: m.volume,
            source: self.source(),
        })
    }
}

impl OddsResolver for SportsbookResolver {
    fn source(&self) -> OddsSource {
        OddsSource::Sportsbook
    }

    fn resolve(&self, ctx: &ResolveContext<'_>) -> Option<Estimate> {
        let details = ctx.spread_details?;
        let home_prob = sportsbook_probability(details, &ctx.home.id, &ctx.away.id)?;
        Some(Estimate {
            home_prob,
            volume: SPORTSBOOK_VOLUME,
            source: self.source(),
        })
    }
}

impl OddsResolver for StatsResolver {
    fn source(&self) -> OddsSource {
        OddsSource::Stats
    }

    fn resolve(&self, ctx: &ResolveContext<'_>) -> Option<Estimate> {
        Some(stats_estimate(ctx.home, ctx.away))
    }
}

/// Full pre-game tier order: market, sportsbook, stats.
pub fn pregame_tiers() -> [&'static dyn OddsResolver; 3] {
    [&MarketResolver, &SportsbookResolver, &StatsResolver]
}

/// Returns the first tier that answers. With `pregame_tiers` this is always
/// `Some`, because the stats tier never declines.
pub fn resolve_tiered(
    tiers: &[&dyn OddsResolver],
    ctx: &ResolveContext<'_>,
) -> Option<Estimate> {
    for tier in tiers {
        match tier.resolve(ctx) {
            Some(estimate) => return Some(estimate),
            None => debug!(
                source = tier.source().as_str(),
                home = %ctx.home.id,
                away = %ctx.away.id,
                "tier declined"
            ),
        }
    }
    None
}

/// Converts a point spread (negative = favored) into the favored side's
/// win probability.
pub fn spread_to_probability(spread: f64) -> f64 {
    if spread == 0.0 || !spread.is_finite() {
        return 0.5;
    }
    let impact = (spread.abs() * SPREAD_IMPACT_PER_POINT).min(SPREAD_MAX_IMPACT);
    let prob = if spread < 0.0 {
        0.5 + impact
    } else {
        0.5 - impact
    };
    prob.clamp(SPREAD_PROB_MIN, SPREAD_PROB_MAX)
}

/// Splits `"<abbrev> <signed spread>"`. Extra trailing tokens are ignored.
pub fn parse_spread(details: &str) -> Option<(String, f64)> {
    let mut parts = details.split_whitespace();
    let team = parts.next()?;
    let spread = parts.next()?.parse::<f64>().ok()?;
    if !spread.is_finite() {
        return None;
    }
    Some((team_db::canonical_id(team), spread))
}

/// Home win probability implied by a sportsbook line, or `None` when the line
/// is unparseable or names neither team.
pub fn sportsbook_probability(details: &str, home_id: &str, away_id: &str) -> Option<f64> {
    let (favored, spread) = parse_spread(details)?;
    if favored == team_db::canonical_id(home_id) {
        Some(spread_to_probability(spread))
    } else if favored == team_db::canonical_id(away_id) {
        Some(1.0 - spread_to_probability(spread))
    } else {
        None
    }
}

/// Blended rating: 70% season win rate, 30% recent momentum.
pub fn team_power(team: &TeamStats) -> f64 {
    team.win_rate() * SEASON_WEIGHT + team.momentum * MOMENTUM_WEIGHT
}

/// Formula-only home win probability, always within [0.25, 0.75].
pub fn stats_probability(home: &TeamStats, away: &TeamStats) -> f64 {
    let diff = team_power(home) - team_power(away);
    let prob = 0.5 + 0.5 * diff + HOME_COURT_BONUS;
    if prob.is_nan() {
        return 0.5 + HOME_COURT_BONUS;
    }
    prob.clamp(STATS_PROB_MIN, STATS_PROB_MAX)
}

pub fn stats_estimate(home: &TeamStats, away: &TeamStats) -> Estimate {
    Estimate {
        home_prob: stats_probability(home, away),
        volume: 0.0,
        source: OddsSource::Stats,
    }
}
