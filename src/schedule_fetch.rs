use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::http_client::get_text;
use crate::state::GameStatus;
use crate::team_db;

pub const DEFAULT_SCHEDULE_URL: &str =
    "https://site.api.espn.com/apis/site/v2/sports/basketball/nba/scoreboard";

/// One competitor as reported by the schedule feed.
#[derive(Debug, Clone, PartialEq)]
pub struct CompetitorRow {
    pub abbreviation: String,
    pub name: String,
    pub logo: Option<String>,
    /// Season record summary, e.g. `"45-12"`.
    pub record_summary: Option<String>,
    pub score: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleEvent {
    pub id: String,
    pub start_time: String,
    pub status: GameStatus,
    pub period: Option<u32>,
    pub clock: Option<String>,
    pub home: CompetitorRow,
    pub away: CompetitorRow,
    /// Sportsbook line text such as `"BOS -6.5"`.
    pub spread_details: Option<String>,
}

pub fn format_feed_date(date: NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}

pub fn fetch_schedule(base_url: &str, date: NaiveDate) -> Result<Vec<ScheduleEvent>> {
    let date = format_feed_date(date);
    let body = get_text(base_url, &[("dates", date.as_str()), ("limit", "100")])
        .context("schedule feed request failed")?;
    parse_scoreboard_json(&body)
}

#[derive(Debug, Deserialize)]
struct Scoreboard {
    #[serde(default)]
    events: Vec<FeedEvent>,
}

#[derive(Debug, Deserialize)]
struct FeedEvent {
    id: String,
    #[serde(default)]
    date: String,
    #[serde(default)]
    status: Option<FeedStatus>,
    #[serde(default)]
    competitions: Vec<FeedCompetition>,
}

#[derive(Debug, Deserialize)]
struct FeedStatus {
    #[serde(default)]
    period: Option<u32>,
    #[serde(rename = "displayClock", default)]
    display_clock: Option<String>,
    #[serde(rename = "type", default)]
    kind: Option<FeedStatusType>,
}

#[derive(Debug, Deserialize)]
struct FeedStatusType {
    #[serde(default)]
    state: String,
}

#[derive(Debug, Deserialize)]
struct FeedCompetition {
    #[serde(default)]
    competitors: Vec<FeedCompetitor>,
    #[serde(default)]
    odds: Vec<FeedOdds>,
}

#[derive(Debug, Deserialize)]
struct FeedCompetitor {
    #[serde(rename = "homeAway", default)]
    home_away: String,
    #[serde(default)]
    score: Value,
    team: FeedTeam,
    #[serde(default)]
    records: Vec<FeedRecord>,
}

#[derive(Debug, Deserialize)]
struct FeedTeam {
    abbreviation: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(rename = "displayName", default)]
    display_name: Option<String>,
    #[serde(default)]
    logo: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FeedRecord {
    #[serde(default)]
    summary: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FeedOdds {
    #[serde(default)]
    details: Option<String>,
}

pub fn parse_scoreboard_json(raw: &str) -> Result<Vec<ScheduleEvent>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(Vec::new());
    }
    let board: Scoreboard = serde_json::from_str(trimmed).context("invalid scoreboard json")?;
    Ok(board.events.into_iter().filter_map(event_to_row).collect())
}

fn event_to_row(event: FeedEvent) -> Option<ScheduleEvent> {
    let Some(competition) = event.competitions.into_iter().next() else {
        debug!(event_id = %event.id, "skipping event without competition");
        return None;
    };

    let mut home = None;
    let mut away = None;
    for competitor in competition.competitors {
        let side = competitor.home_away.to_ascii_lowercase();
        if side == "home" && home.is_none() {
            home = Some(competitor_row(competitor));
        } else if side == "away" && away.is_none() {
            away = Some(competitor_row(competitor));
        }
    }
    let (Some(home), Some(away)) = (home, away) else {
        debug!(event_id = %event.id, "skipping event missing a home or away side");
        return None;
    };

    let status = event.status.as_ref();
    let state = status
        .and_then(|s| s.kind.as_ref())
        .map(|k| k.state.as_str())
        .unwrap_or("pre");

    let spread_details = competition
        .odds
        .into_iter()
        .next()
        .and_then(|o| o.details)
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty());

    Some(ScheduleEvent {
        id: event.id,
        start_time: event.date,
        status: GameStatus::from_feed_state(state),
        period: status.and_then(|s| s.period),
        clock: status.and_then(|s| s.display_clock.clone()),
        home,
        away,
        spread_details,
    })
}

fn competitor_row(c: FeedCompetitor) -> CompetitorRow {
    let name = c
        .team
        .name
        .or(c.team.display_name)
        .unwrap_or_else(|| c.team.abbreviation.clone());
    CompetitorRow {
        abbreviation: team_db::canonical_id(&c.team.abbreviation),
        name,
        logo: c.team.logo.filter(|l| !l.is_empty()),
        record_summary: c
            .records
            .into_iter()
            .next()
            .and_then(|r| r.summary)
            .filter(|s| !s.trim().is_empty()),
        score: parse_score(&c.score),
    }
}

fn parse_score(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
        Value::String(s) => s.trim().parse::<u32>().ok(),
        _ => None,
    }
}
