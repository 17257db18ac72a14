mod config;
mod queue;
mod state;
mod web;

use anyhow::Result;
use std::{env, sync::Arc};
use tokio::sync::RwLock;
use tracing::info;
use tracing_subscriber::EnvFilter;

use state::RelayState;
use web::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "relay.toml".to_string());
    let cfg = Arc::new(config::load(&config_path)?);

    info!(
        port = cfg.port,
        batch = cfg.batch_size,
        retention_secs = cfg.retention_secs,
        device_base = %cfg.device_base,
        "relay starting"
    );

    // All state is memory-resident and lost on restart by design.
    let shared = Arc::new(RwLock::new(RelayState::new(&cfg)));

    web::serve(AppState { shared, cfg }).await
}
