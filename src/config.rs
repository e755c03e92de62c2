use std::path::PathBuf;
use std::time::Duration;

use chrono::{Local, NaiveDate};

use crate::analysis::DEFAULT_MODEL;
use crate::http_client::DEFAULT_TIMEOUT;
use crate::market_fetch::DEFAULT_MARKET_URL;
use crate::odds_snapshot::{DEFAULT_SNAPSHOT_PATH, ODDS_API_BASE};
use crate::schedule_fetch::DEFAULT_SCHEDULE_URL;
use crate::snapshot_store::default_db_path;
use crate::state::Language;

const DEFAULT_REFRESH_SECS: u64 = 30;
const MIN_REFRESH_SECS: u64 = 5;
const HTTP_TIMEOUT_RANGE_SECS: (u64, u64) = (1, 120);
pub const DEFAULT_CACHE_PREFIX: &str = "hoops_odds";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DbLocation {
    Memory,
    File(PathBuf),
}

#[derive(Debug, Clone)]
pub struct OracleConfig {
    pub refresh_interval: Duration,
    /// Applied to the shared HTTP client when the provider or snapshot job starts.
    pub http_timeout: Duration,
    pub start_date: NaiveDate,
    pub language: Language,
    pub cache_prefix: String,
    pub db: DbLocation,
    pub market_enabled: bool,
    pub schedule_url: String,
    pub market_url: String,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub odds_api_key: Option<String>,
    pub odds_api_base: String,
    pub odds_snapshot_path: PathBuf,
}

impl OracleConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let refresh_secs = get("HOOPS_REFRESH_SECS")
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_REFRESH_SECS)
            .max(MIN_REFRESH_SECS);
        let (min_timeout, max_timeout) = HTTP_TIMEOUT_RANGE_SECS;
        let http_timeout_secs = get("HTTP_TIMEOUT_SECS")
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT.as_secs())
            .clamp(min_timeout, max_timeout);
        let start_date = get("HOOPS_DATE")
            .and_then(|v| parse_date(&v))
            .unwrap_or_else(|| Local::now().date_naive());
        let language = get("HOOPS_LANG")
            .and_then(|v| Language::parse(&v))
            .unwrap_or_default();
        let db = match get("HOOPS_DB_PATH") {
            Some(v) if v == ":memory:" => DbLocation::Memory,
            Some(v) => DbLocation::File(PathBuf::from(v)),
            None => default_db_path()
                .map(DbLocation::File)
                .unwrap_or(DbLocation::Memory),
        };

        Self {
            refresh_interval: Duration::from_secs(refresh_secs),
            http_timeout: Duration::from_secs(http_timeout_secs),
            start_date,
            language,
            cache_prefix: get("HOOPS_CACHE_PREFIX")
                .unwrap_or_else(|| DEFAULT_CACHE_PREFIX.to_string()),
            db,
            market_enabled: get("HOOPS_MARKET_ENABLED")
                .map(|v| parse_bool(&v))
                .unwrap_or(true),
            schedule_url: get("SCHEDULE_API_BASE")
                .unwrap_or_else(|| DEFAULT_SCHEDULE_URL.to_string()),
            market_url: get("MARKET_API_URL").unwrap_or_else(|| DEFAULT_MARKET_URL.to_string()),
            gemini_api_key: get("GEMINI_API_KEY").or_else(|| get("API_KEY")),
            gemini_model: get("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            odds_api_key: get("ODDS_API_KEY"),
            odds_api_base: get("ODDS_API_BASE").unwrap_or_else(|| ODDS_API_BASE.to_string()),
            odds_snapshot_path: PathBuf::from(
                get("ODDS_SNAPSHOT_PATH").unwrap_or_else(|| DEFAULT_SNAPSHOT_PATH.to_string()),
            ),
        }
    }

    pub fn market_url(&self) -> Option<&str> {
        self.market_enabled.then_some(self.market_url.as_str())
    }
}

/// Accepts `YYYYMMDD` or `YYYY-MM-DD`.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y%m%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y-%m-%d"))
        .ok()
}

fn parse_bool(raw: &str) -> bool {
    let t = raw.trim().to_ascii_lowercase();
    !(t == "0" || t == "false" || t == "off" || t == "no")
}
