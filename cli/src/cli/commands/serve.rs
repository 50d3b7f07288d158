use std::sync::Arc;

use wnrake_core::config::Config;
use wnrake_core::fetcher::Fetcher;
use wnrake_core::server::Gateway;

pub async fn run(mut config: Config, host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    tracing::info!("Starting wnrake gateway...");
    tracing::info!("  Solver: {}", config.solver);
    match config.cache_dir() {
        Some(dir) => tracing::info!("  Cache: {:?}", dir),
        None => tracing::info!("  Cache: disabled"),
    }
    tracing::info!("  Recovery: {:?}, {} attempt(s)", config.retry.recovery, config.retry.attempts);

    let fetcher = Arc::new(Fetcher::from_config(&config).await?);
    if fetcher.pool().is_empty() {
        tracing::warn!("No proxies configured, requests go out directly from the solver");
    } else {
        tracing::info!("Loaded {} proxy(ies)", fetcher.pool().len());
    }

    let gateway = Gateway::new(config.server.host.clone(), config.server.port, fetcher);

    tracing::info!("Gateway starting on http://{}:{}", config.server.host, config.server.port);
    tracing::info!("Press Ctrl+C to stop");

    gateway.run().await?;

    Ok(())
}
