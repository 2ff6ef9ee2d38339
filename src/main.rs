use anyhow::Result;
use std::sync::Arc;
use tokenbalance::config::Config;
use tokenbalance::rpc::RpcClient;
use tokenbalance::server::{self, AppState};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    info!("Starting TokenBalance server");

    let config = Config::from_env()?;
    info!("Configuration loaded");
    info!("RPC URLs: {} endpoint(s) configured", config.rpc.urls.len());

    let client = RpcClient::new(&config.rpc)?;
    match client.get_latest_block().await {
        Ok(block) => info!("Connected to {} at block {}", client.get_current_url(), block),
        Err(e) => error!("RPC endpoint not reachable yet: {}", e),
    }

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown signal received");
                signal.cancel();
            }
            Err(e) => error!("Failed to listen for shutdown signal: {}", e),
        }
    });

    let state = AppState::new(Arc::new(client), config, shutdown);
    if let Err(e) = server::serve(state).await {
        error!("Server error: {}", e);
        return Err(e);
    }

    Ok(())
}
