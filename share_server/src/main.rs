use anyhow::Result;
use share_core::otp::spawn_sweeper;
use share_core::{ServerConfig, SignalHub, http_share};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 0. Environment and logging
    let _ = dotenvy::dotenv();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // 1. Configuration
    let config = ServerConfig::load()?;
    tracing::info!(
        "Code lifetime {}s, sweep every {}s, at most {} connections",
        config.otp_ttl().as_secs(),
        config.sweep_interval().as_secs(),
        config.max_connections
    );

    // 2. Shared state and the background sweeper
    let hub = Arc::new(SignalHub::new(&config));
    let cancel_token = CancellationToken::new();
    let sweeper = spawn_sweeper(
        hub.otp.clone(),
        hub.negotiations.clone(),
        config.sweep_interval(),
        cancel_token.clone(),
    );

    // 3. Stop everything on Ctrl-C
    let ct = cancel_token.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
        }
        tracing::info!("Shutdown requested");
        ct.cancel();
    });

    // 4. Serve until cancelled
    let served = http_share::start_server(&config, hub, cancel_token.clone()).await;
    cancel_token.cancel();
    let _ = sweeper.await;

    served
}
