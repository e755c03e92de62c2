//! Bookmaker odds snapshot file.
//!
//! A scheduled job pulls head-to-head and spread prices and merges them into
//! a JSON file. Games that have tipped off keep the entry captured before
//! tip-off; everything else takes the fresh read. The dashboard reads the
//! same file for its display-only odds table.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::http_client::get_text;

pub const ODDS_API_BASE: &str = "https://api.the-odds-api.com/v4/sports";
pub const SPORT_KEY: &str = "basketball_nba";
pub const DEFAULT_SNAPSHOT_PATH: &str = "public/nba_odds.json";
const REGIONS: &str = "us";
const MARKETS: &str = "h2h,spreads";
const ODDS_FORMAT: &str = "decimal";
const PREFERRED_BOOK: &str = "pinnacle";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotGame {
    pub id: String,
    #[serde(default)]
    pub commence_time: String,
    #[serde(default)]
    pub home_team: String,
    #[serde(default)]
    pub away_team: String,
    #[serde(default)]
    pub bookmakers: Vec<Bookmaker>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bookmaker {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub markets: Vec<BookMarket>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookMarket {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub outcomes: Vec<BookOutcome>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookOutcome {
    pub name: String,
    pub price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub point: Option<f64>,
}

impl SnapshotGame {
    pub fn commence_ts(&self) -> Option<i64> {
        DateTime::parse_from_rfc3339(self.commence_time.trim())
            .ok()
            .map(|dt| dt.timestamp())
    }

    /// Unparseable start times count as not started.
    pub fn has_started(&self, now: DateTime<Utc>) -> bool {
        self.commence_ts()
            .map(|ts| now.timestamp() >= ts)
            .unwrap_or(false)
    }

    fn matchup(&self) -> String {
        format!("{} vs {}", self.home_team, self.away_team)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub locked: usize,
    pub updated: usize,
    pub added: usize,
}

/// Merges a fresh pull into the previous snapshot.
///
/// Output follows the fresh pull's order and membership; games no longer
/// offered are dropped.
pub fn merge_snapshot(
    existing: Vec<SnapshotGame>,
    fresh: Vec<SnapshotGame>,
    now: DateTime<Utc>,
) -> (Vec<SnapshotGame>, MergeStats) {
    let mut previous: std::collections::HashMap<String, SnapshotGame> =
        existing.into_iter().map(|g| (g.id.clone(), g)).collect();
    let mut stats = MergeStats::default();
    let mut merged = Vec::with_capacity(fresh.len());

    for game in fresh {
        match previous.remove(&game.id) {
            Some(old) if game.has_started(now) => {
                info!(matchup = %game.matchup(), "game started, keeping pre-game odds");
                stats.locked += 1;
                merged.push(old);
            }
            Some(_) => {
                debug!(matchup = %game.matchup(), "updating pre-game odds");
                stats.updated += 1;
                merged.push(game);
            }
            None => {
                debug!(matchup = %game.matchup(), "new game");
                stats.added += 1;
                merged.push(game);
            }
        }
    }
    (merged, stats)
}

/// Missing or unreadable files start from an empty snapshot.
pub fn load_snapshot(path: &Path) -> Vec<SnapshotGame> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(_) => return Vec::new(),
    };
    match serde_json::from_str::<Vec<SnapshotGame>>(&raw) {
        Ok(games) => games,
        Err(err) => {
            warn!(path = %path.display(), %err, "unreadable odds snapshot, starting fresh");
            Vec::new()
        }
    }
}

pub fn save_snapshot(path: &Path, games: &[SnapshotGame]) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    }
    let json = serde_json::to_string_pretty(games).context("encode odds snapshot")?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json).with_context(|| format!("write {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("replace {}", path.display()))?;
    Ok(())
}

pub fn fetch_odds_api(base_url: &str, api_key: &str) -> Result<Vec<SnapshotGame>> {
    let url = format!("{}/{SPORT_KEY}/odds", base_url.trim_end_matches('/'));
    let body = get_text(
        &url,
        &[
            ("apiKey", api_key),
            ("regions", REGIONS),
            ("markets", MARKETS),
            ("oddsFormat", ODDS_FORMAT),
        ],
    )
    .context("odds api request failed")?;
    serde_json::from_str(&body).context("invalid odds api json")
}

/// One row of the display-only odds table.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketTableRow {
    pub game_id: String,
    pub commence_time: String,
    pub home_team: String,
    pub away_team: String,
    pub bookmaker: String,
    pub home_decimal: Option<f64>,
    pub away_decimal: Option<f64>,
}

impl MarketTableRow {
    /// Raw implied probability, `1 / decimal`, without removing the margin.
    pub fn implied(decimal: Option<f64>) -> Option<f64> {
        decimal.filter(|p| *p > 0.0).map(|p| 1.0 / p)
    }

    pub fn home_implied(&self) -> Option<f64> {
        Self::implied(self.home_decimal)
    }

    pub fn away_implied(&self) -> Option<f64> {
        Self::implied(self.away_decimal)
    }

    pub fn favourite_is_home(&self) -> Option<bool> {
        match (self.home_decimal, self.away_decimal) {
            (Some(h), Some(a)) if h != a => Some(h < a),
            _ => None,
        }
    }
}

/// Builds table rows sorted by start time, preferring the sharp book's
/// head-to-head prices and falling back to the first book listed.
pub fn table_rows(games: &[SnapshotGame]) -> Vec<MarketTableRow> {
    let mut rows: Vec<(Option<i64>, MarketTableRow)> = games
        .iter()
        .map(|game| {
            let book = game
                .bookmakers
                .iter()
                .find(|b| b.key == PREFERRED_BOOK)
                .or_else(|| game.bookmakers.first());
            let h2h = book.and_then(|b| b.markets.iter().find(|m| m.key == "h2h"));
            let price_for = |team: &str| {
                h2h.and_then(|m| m.outcomes.iter().find(|o| o.name == team))
                    .map(|o| o.price)
                    .filter(|p| p.is_finite() && *p > 0.0)
            };
            let row = MarketTableRow {
                game_id: game.id.clone(),
                commence_time: game.commence_time.clone(),
                home_team: game.home_team.clone(),
                away_team: game.away_team.clone(),
                bookmaker: book
                    .map(|b| b.title.clone())
                    .filter(|t| !t.is_empty())
                    .unwrap_or_else(|| "Unknown".to_string()),
                home_decimal: price_for(&game.home_team),
                away_decimal: price_for(&game.away_team),
            };
            (game.commence_ts(), row)
        })
        .collect();
    rows.sort_by_key(|(ts, _)| ts.unwrap_or(i64::MAX));
    rows.into_iter().map(|(_, row)| row).collect()
}

/// Reads the snapshot file for display. Never fails.
pub fn load_table(path: &Path) -> Vec<MarketTableRow> {
    table_rows(&load_snapshot(path))
}
