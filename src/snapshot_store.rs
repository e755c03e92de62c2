//! Persistent pre-game odds snapshots and committed picks.
//!
//! Storage sits behind [`KeyValueStore`]; the cache layer on top tolerates a
//! missing backend, absent keys, and malformed values, treating all of them as
//! a miss.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::resolvers::Estimate;
use crate::state::OddsSource;

const APP_DIR: &str = "hoops_oracle";
const DB_FILE: &str = "snapshots.sqlite";

// Exact 0/1 style values are feed artifacts, not estimates worth freezing.
const PERSIST_MIN_PROB: f64 = 0.01;
const PERSIST_MAX_PROB: f64 = 0.99;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn delete(&self, key: &str) -> Result<(), StoreError>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".into()))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".into()))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".into()))?;
        entries.remove(key);
        Ok(())
    }
}

/// Single-table sqlite key-value store; survives restarts.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let conn =
            Connection::open(path).with_context(|| format!("open sqlite db {}", path.display()))?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory sqlite")?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )
        .context("create kv schema")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Unavailable("sqlite lock poisoned".into()))
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let conn = self.conn()?;
        let value = conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get::<_, String>(0)
            })
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO kv(key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }
}

pub fn default_db_path() -> Option<PathBuf> {
    if let Ok(base) = std::env::var("XDG_CACHE_HOME") {
        if !base.trim().is_empty() {
            return Some(PathBuf::from(base).join(APP_DIR).join(DB_FILE));
        }
    }
    let home = std::env::var("HOME").ok()?;
    if home.trim().is_empty() {
        return None;
    }
    Some(PathBuf::from(home).join(".cache").join(APP_DIR).join(DB_FILE))
}

/// Frozen pre-game read for one game, stored as
/// `{"homeProb", "source", "volume", "timestamp"}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OddsSnapshot {
    pub home_prob: f64,
    pub source: OddsSource,
    pub volume: f64,
    /// Milliseconds since the unix epoch.
    pub timestamp: i64,
}

impl OddsSnapshot {
    pub fn is_sane(&self) -> bool {
        self.home_prob.is_finite() && self.home_prob > 0.0 && self.home_prob < 1.0
    }
}

/// The side committed to when a game left the scheduled state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommittedPick {
    pub winner_id: String,
    pub home_prob: f64,
    pub committed_at: i64,
    #[serde(default)]
    pub correct: Option<bool>,
}

pub struct SnapshotCache<'s> {
    store: &'s dyn KeyValueStore,
    prefix: String,
}

impl<'s> SnapshotCache<'s> {
    pub fn new(store: &'s dyn KeyValueStore, prefix: &str) -> Self {
        Self {
            store,
            prefix: prefix.trim().to_string(),
        }
    }

    pub fn snapshot_key(&self, game_id: &str) -> String {
        format!("{}_{}", self.prefix, game_id)
    }

    /// Picks live under `<prefix>:pick:`. No snapshot key has `:` right after
    /// the prefix, so no game id can address another game's pick.
    pub fn pick_key(&self, game_id: &str) -> String {
        format!("{}:pick:{}", self.prefix, game_id)
    }

    /// Returns a usable snapshot, or `None` on miss, backend failure, or a
    /// corrupt entry. Corrupt entries are removed.
    pub fn read(&self, game_id: &str) -> Option<OddsSnapshot> {
        let key = self.snapshot_key(game_id);
        let raw = self.get_raw(&key)?;
        match serde_json::from_str::<OddsSnapshot>(&raw) {
            Ok(snapshot) if snapshot.is_sane() => Some(snapshot),
            Ok(snapshot) => {
                warn!(game_id, home_prob = snapshot.home_prob, "discarding insane cached probability");
                self.purge(&key);
                None
            }
            Err(err) => {
                warn!(game_id, %err, "discarding unparseable cached snapshot");
                self.purge(&key);
                None
            }
        }
    }

    /// Last-write-wins store of a pre-game estimate. Degenerate probabilities
    /// and storage failures are skipped; returns whether the write landed.
    pub fn write(&self, game_id: &str, estimate: &Estimate, timestamp_ms: i64) -> bool {
        let p = estimate.home_prob;
        if !(p > PERSIST_MIN_PROB && p < PERSIST_MAX_PROB) {
            debug!(game_id, home_prob = p, "not persisting degenerate probability");
            return false;
        }
        let snapshot = OddsSnapshot {
            home_prob: p,
            source: estimate.source,
            volume: estimate.volume,
            timestamp: timestamp_ms,
        };
        self.put_json(&self.snapshot_key(game_id), &snapshot)
    }

    pub fn read_pick(&self, game_id: &str) -> Option<CommittedPick> {
        let key = self.pick_key(game_id);
        let raw = self.get_raw(&key)?;
        match serde_json::from_str::<CommittedPick>(&raw) {
            Ok(pick) if !pick.winner_id.trim().is_empty() => Some(pick),
            Ok(_) => {
                warn!(game_id, "discarding committed pick without winner");
                self.purge(&key);
                None
            }
            Err(err) => {
                warn!(game_id, %err, "discarding unparseable committed pick");
                self.purge(&key);
                None
            }
        }
    }

    /// Commits `candidate` unless a pick already exists, in which case the
    /// stored pick wins and is returned unchanged.
    pub fn commit_pick(&self, game_id: &str, candidate: CommittedPick) -> CommittedPick {
        if let Some(existing) = self.read_pick(game_id) {
            return existing;
        }
        if self.put_json(&self.pick_key(game_id), &candidate) {
            info!(game_id, winner = %candidate.winner_id, home_prob = candidate.home_prob, "prediction locked");
        }
        candidate
    }

    /// Stamps the verdict onto the stored pick the first time only.
    pub fn record_verdict(&self, game_id: &str, correct: bool) -> Option<bool> {
        let mut pick = self.read_pick(game_id)?;
        if let Some(existing) = pick.correct {
            return Some(existing);
        }
        pick.correct = Some(correct);
        if self.put_json(&self.pick_key(game_id), &pick) {
            info!(game_id, correct, "prediction verified");
        }
        Some(correct)
    }

    fn get_raw(&self, key: &str) -> Option<String> {
        match self.store.get(key) {
            Ok(value) => value,
            Err(err) => {
                warn!(key, %err, "cache read failed, treating as miss");
                None
            }
        }
    }

    fn put_json<T: Serialize>(&self, key: &str, value: &T) -> bool {
        let json = match serde_json::to_string(value) {
            Ok(json) => json,
            Err(err) => {
                warn!(key, %err, "failed to encode cache entry");
                return false;
            }
        };
        match self.store.set(key, &json) {
            Ok(()) => true,
            Err(err) => {
                warn!(key, %err, "cache write skipped");
                false
            }
        }
    }

    fn purge(&self, key: &str) {
        if let Err(err) = self.store.delete(key) {
            debug!(key, %err, "failed to remove corrupt cache entry");
        }
    }
}
