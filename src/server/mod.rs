pub mod error;
pub mod handlers;

use crate::chain::ChainReader;
use crate::config::Config;
use crate::scanner::Scanner;
use anyhow::{Context, Result};
use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub chain: Arc<dyn ChainReader>,
    pub scanner: Arc<Scanner<dyn ChainReader>>,
    pub config: Arc<Config>,
    /// Cancelled on shutdown; every scan runs on a child token.
    pub shutdown: CancellationToken,
    /// Background dumps; drained before `serve` returns.
    pub tasks: TaskTracker,
}

impl AppState {
    pub fn new(chain: Arc<dyn ChainReader>, config: Config, shutdown: CancellationToken) -> Self {
        let scanner = Arc::new(Scanner::new(
            Arc::clone(&chain),
            config.scan.progress_interval,
        ));
        Self {
            chain,
            scanner,
            config: Arc::new(config),
            shutdown,
            tasks: TaskTracker::new(),
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/tokenInfo/:contract", get(handlers::get_token_info))
        .route("/getBlockInfo", get(handlers::get_block_range_info))
        .route("/blockInfo/:block", get(handlers::get_block_info))
        .route("/dump", post(handlers::start_dump))
        .with_state(state)
}

pub async fn serve(state: AppState) -> Result<()> {
    let addr = state.config.listen_addr();
    let shutdown = state.shutdown.clone();
    let tasks = state.tasks.clone();

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("TokenBalance Server Running: http://{}", addr);

    let stop = shutdown.clone();
    let served = axum::serve(listener, create_router(state))
        .with_graceful_shutdown(async move { stop.cancelled().await })
        .await;

    // Dumps see the cancelled token, finish their current block and finalize
    shutdown.cancel();
    drain_tasks(&tasks).await;

    served?;
    info!("Server stopped");
    Ok(())
}

/// Closes the tracker and waits for every background dump to return.
pub async fn drain_tasks(tasks: &TaskTracker) {
    tasks.close();
    if !tasks.is_empty() {
        info!("Waiting for {} background dump(s) to finish", tasks.len());
    }
    tasks.wait().await;
}
