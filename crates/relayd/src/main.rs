//! Daemon entry point.

use anyhow::Result;
use relayd::config::Config;
use relayd::server::{self, AppState};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("relayd {}", env!("CARGO_PKG_VERSION"));
    let config = Config::from_env();
    std::fs::create_dir_all(&config.data_dir)?;

    let state = AppState::new(config);
    if !state.backend.is_available().await {
        tracing::warn!("LM backend not reachable; local solvers and cache still serve");
    }

    server::run(state).await
}
