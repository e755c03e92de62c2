use anyhow::{Context, Result, bail};
use chrono::Utc;
use tracing_subscriber::EnvFilter;

use hoops_oracle::config::OracleConfig;
use hoops_oracle::http_client::init_http_client;
use hoops_oracle::odds_snapshot::{fetch_odds_api, load_snapshot, merge_snapshot, save_snapshot};

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("hoops_oracle=info,odds_snapshot=info,warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cfg = OracleConfig::from_env();
    let Some(api_key) = cfg.odds_api_key.as_deref() else {
        bail!("ODDS_API_KEY is not set");
    };
    init_http_client(cfg.http_timeout)?;
    let path = cfg.odds_snapshot_path.as_path();

    let existing = load_snapshot(path);
    println!("Loaded {} existing games from {}", existing.len(), path.display());

    let fresh = fetch_odds_api(&cfg.odds_api_base, api_key).context("fetch odds")?;
    println!("Fetched {} games from odds api", fresh.len());

    let (merged, stats) = merge_snapshot(existing, fresh, Utc::now());
    save_snapshot(path, &merged)?;
    println!(
        "Saved {} games to {} (locked {}, updated {}, new {})",
        merged.len(),
        path.display(),
        stats.locked,
        stats.updated,
        stats.added
    );
    Ok(())
}
