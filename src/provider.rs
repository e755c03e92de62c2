use std::sync::Arc;
use std::sync::mpsc::{Receiver, Sender};
use std::thread;

use chrono::Utc;
use tracing::{error, info, warn};

use crate::analysis::{self, GameAnalyst};
use crate::config::{DbLocation, OracleConfig};
use crate::http_client::init_http_client;
use crate::odds_snapshot;
use crate::pipeline::{HttpFeeds, OddsPipeline};
use crate::snapshot_store::{KeyValueStore, MemoryStore, SqliteStore};
use crate::state::{Delta, ProviderCommand};

/// Opens the configured store. A store that cannot be opened degrades to an
/// in-memory one so odds resolution keeps working for this session.
pub fn open_store(db: &DbLocation) -> Box<dyn KeyValueStore> {
    let opened = match db {
        DbLocation::Memory => SqliteStore::open_in_memory(),
        DbLocation::File(path) => SqliteStore::open(path),
    };
    match opened {
        Ok(store) => Box::new(store),
        Err(err) => {
            warn!(%err, "snapshot store unavailable, using memory store");
            Box::new(MemoryStore::new())
        }
    }
}

pub fn spawn_provider(cfg: OracleConfig, tx: Sender<Delta>, cmd_rx: Receiver<ProviderCommand>) {
    thread::spawn(move || {
        if let Err(err) = init_http_client(cfg.http_timeout) {
            error!(err = %format!("{err:#}"), "http client setup failed");
        }
        let store = open_store(&cfg.db);
        let pipeline = OddsPipeline::new(store.as_ref(), &cfg.cache_prefix);
        let feeds = HttpFeeds {
            schedule_url: cfg.schedule_url.clone(),
            market_url: cfg.market_url().map(str::to_string),
        };
        let analyst: Arc<dyn GameAnalyst> = Arc::from(analysis::analyst_from_key(
            cfg.gemini_api_key.as_deref(),
            &cfg.gemini_model,
        ));
        if cfg.gemini_api_key.is_none() {
            let _ = tx.send(Delta::Log(
                "[INFO] GEMINI_API_KEY not set, analysis returns placeholders".to_string(),
            ));
        }

        while let Ok(cmd) = cmd_rx.recv() {
            match cmd {
                ProviderCommand::Refresh { date, generation } => {
                    let now_ms = Utc::now().timestamp_millis();
                    match pipeline.run_refresh(&feeds, date, now_ms) {
                        Ok(games) => {
                            let _ = tx.send(Delta::SetGames { generation, games });
                        }
                        Err(err) => {
                            error!(%date, err = %format!("{err:#}"), "refresh failed");
                            let _ = tx.send(Delta::RefreshFailed {
                                generation,
                                message: format!("Schedule fetch failed: {err}"),
                            });
                        }
                    }
                }
                ProviderCommand::Analyze { game, language } => {
                    let analyst = Arc::clone(&analyst);
                    let tx = tx.clone();
                    thread::spawn(move || {
                        let prediction = analyst.analyze(&game, language);
                        let _ = tx.send(Delta::SetAnalysis {
                            game_id: game.id.clone(),
                            prediction,
                        });
                    });
                }
                ProviderCommand::LoadMarketTable => {
                    let rows = odds_snapshot::load_table(&cfg.odds_snapshot_path);
                    info!(rows = rows.len(), "loaded odds table");
                    if rows.is_empty() {
                        let _ = tx.send(Delta::Log(format!(
                            "[INFO] No odds snapshot at {}",
                            cfg.odds_snapshot_path.display()
                        )));
                    }
                    let _ = tx.send(Delta::SetMarketTable(rows));
                }
            }
        }
    });
}
