use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::http_client::get_text;
use crate::state::TeamStats;

pub const DEFAULT_MARKET_URL: &str =
    "https://gamma-api.polymarket.com/events?closed=false&limit=50&tag_slug=nba";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MarketEvent {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub markets: Vec<MarketOutcome>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub volume: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MarketOutcome {
    #[serde(rename = "groupItemTitle", default)]
    pub group_item_title: Option<String>,
    #[serde(default)]
    pub outcome: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub price: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub volume: Option<f64>,
}

impl MarketOutcome {
    fn label(&self) -> &str {
        self.outcome
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .or(self.group_item_title.as_deref())
            .unwrap_or("")
    }
}

/// Renormalized head-to-head read from a matched market event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarketMatch {
    pub home_prob: f64,
    pub away_prob: f64,
    pub volume: f64,
}

pub fn fetch_market_events(url: &str) -> Result<Vec<MarketEvent>> {
    let body = get_text(url, &[]).context("market feed request failed")?;
    parse_market_events_json(&body)
}

pub fn parse_market_events_json(raw: &str) -> Result<Vec<MarketEvent>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(Vec::new());
    }
    serde_json::from_str(trimmed).context("invalid market events json")
}

/// Splits on anything but ASCII letters and digits, lowercasing each word.
pub fn name_tokens(raw: &str) -> Vec<String> {
    raw.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_ascii_lowercase)
        .collect()
}

/// True when `team` appears as whole consecutive words somewhere in `text`.
fn mentions_team(text: &[String], team: &[String]) -> bool {
    !team.is_empty() && text.windows(team.len()).any(|w| w == team)
}

/// Finds the event whose title names both teams, then reads per-team prices.
///
/// Names are compared word by word, so "Nets" never matches "Hornets". An
/// outcome belongs to a team when its label ends with the team's name
/// ("Nets" or "Brooklyn Nets").
///
/// A single priced side implies the other as its complement; two priced sides
/// are rescaled so they sum to exactly one (removing the market's spread).
pub fn find_market_match(
    events: &[MarketEvent],
    home: &TeamStats,
    away: &TeamStats,
) -> Option<MarketMatch> {
    let home_key = name_tokens(&home.name);
    let away_key = name_tokens(&away.name);
    if home_key.is_empty() || away_key.is_empty() {
        return None;
    }

    let event = events.iter().find(|e| {
        let title = name_tokens(&e.title);
        mentions_team(&title, &home_key) && mentions_team(&title, &away_key)
    })?;

    let price_for = |key: &[String]| {
        event
            .markets
            .iter()
            .find(|m| name_tokens(m.label()).ends_with(key))
            .and_then(|m| m.price)
            .filter(|p| p.is_finite() && (0.0..=1.0).contains(p))
    };

    let (home_price, away_price) = match (price_for(&home_key[..]), price_for(&away_key[..])) {
        (Some(h), Some(a)) => (h, a),
        (Some(h), None) => (h, 1.0 - h),
        (None, Some(a)) => (1.0 - a, a),
        (None, None) => return None,
    };

    let total = home_price + away_price;
    if total <= 0.0 {
        return None;
    }
    Some(MarketMatch {
        home_prob: home_price / total,
        away_prob: away_price / total,
        volume: event.volume.unwrap_or(0.0),
    })
}

fn lenient_f64<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    })
}
