//! Binary entrypoint for the Sitesmith API server.
use anyhow::Context;
use sitesmith_api::{config::ServerConfig, run, AppState};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ServerConfig::from_env()?;
    let state = AppState::from_config(&config)?;
    run(&config.addr, state)
        .await
        .with_context(|| format!("server on {} stopped", config.addr))
}
