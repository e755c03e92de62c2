pub mod analysis;
pub mod config;
pub mod http_client;
pub mod market_fetch;
pub mod odds_snapshot;
pub mod pipeline;
pub mod provider;
pub mod resolvers;
pub mod schedule_fetch;
pub mod snapshot_store;
pub mod state;
pub mod team_db;
pub mod team_stats;
pub mod verify;
