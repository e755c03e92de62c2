use crate::schedule_fetch::CompetitorRow;
use crate::state::TeamStats;
use crate::team_db::{self, TeamEntry};

const DEFAULT_PPG: f64 = 110.0;
const DEFAULT_LAST10: &str = "5-5";
const NEUTRAL_MOMENTUM: f64 = 0.5;

/// Parses a `"W-L"` record. Anything else (missing separator, non-numeric
/// halves, extra segments) yields `None`.
pub fn parse_record(raw: &str) -> Option<(u32, u32)> {
    let (wins, losses) = raw.trim().split_once('-')?;
    let wins = wins.trim().parse::<u32>().ok()?;
    let losses = losses.trim().parse::<u32>().ok()?;
    Some((wins, losses))
}

/// Recent-form score: wins / (wins + losses) over the record window.
/// Never fails; malformed or empty windows score 0.5.
pub fn calculate_momentum(record: &str) -> f64 {
    let Some((wins, losses)) = parse_record(record) else {
        return NEUTRAL_MOMENTUM;
    };
    let total = u64::from(wins) + u64::from(losses);
    if total == 0 {
        return NEUTRAL_MOMENTUM;
    }
    f64::from(wins) / total as f64
}

/// Merges a schedule-feed competitor with the static team table.
///
/// The static row is authoritative for per-game stats and the last-10 window;
/// the feed is authoritative for the season record whenever it carries one.
pub fn normalize_team(live: &CompetitorRow, reference: Option<&TeamEntry>) -> TeamStats {
    let mut stats = match reference {
        Some(entry) => from_reference(entry),
        None => synthesize(live),
    };

    if let Some((wins, losses)) = live.record_summary.as_deref().and_then(parse_record) {
        stats.wins = wins;
        stats.losses = losses;
    }

    stats.momentum = calculate_momentum(&stats.last10);
    stats
}

/// Convenience wrapper that resolves the reference row by abbreviation.
pub fn normalize_competitor(live: &CompetitorRow) -> TeamStats {
    normalize_team(live, team_db::lookup(&live.abbreviation))
}

fn from_reference(entry: &TeamEntry) -> TeamStats {
    TeamStats {
        id: entry.id.to_string(),
        name: entry.name.to_string(),
        name_zh: entry.name_zh.to_string(),
        wins: entry.wins,
        losses: entry.losses,
        ppg: entry.ppg,
        oppg: entry.oppg,
        last10: entry.last10.to_string(),
        momentum: NEUTRAL_MOMENTUM,
        logo: entry.logo_url(),
    }
}

fn synthesize(live: &CompetitorRow) -> TeamStats {
    let name = if live.name.trim().is_empty() {
        live.abbreviation.clone()
    } else {
        live.name.clone()
    };
    TeamStats {
        id: live.abbreviation.clone(),
        name_zh: name.clone(),
        name,
        wins: 0,
        losses: 0,
        ppg: DEFAULT_PPG,
        oppg: DEFAULT_PPG,
        last10: DEFAULT_LAST10.to_string(),
        momentum: NEUTRAL_MOMENTUM,
        logo: live.logo.clone().unwrap_or_default(),
    }
}
