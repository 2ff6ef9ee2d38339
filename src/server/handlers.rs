use super::AppState;
use super::error::{ApiError, ApiResult};
use crate::dump::{DumpOptions, DumpTarget, artifact_path, run_dump};
use crate::models::{BlockSummary, ScanRange, ScanSummary, TokenInfo};
use crate::scanner::LogObserver;
use crate::sink::CollectingSink;
use alloy_primitives::Address;
use axum::{
    Json,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::{error, info};

#[derive(Debug, Deserialize)]
pub struct BlockRangeQuery {
    pub start: Option<i64>,
    pub end: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DumpRequest {
    pub start_block: i64,
    pub end_block: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DumpStarted {
    pub file: String,
    pub start_block: u64,
    pub end_block: u64,
}

#[derive(Debug, Serialize)]
pub struct BlockInfoResponse {
    pub block: BlockSummary,
    pub tokens: Vec<TokenInfo>,
}

/// A scan interrupted by shutdown holds only part of the range.
fn ensure_complete(range: &ScanRange, summary: &ScanSummary) -> ApiResult<()> {
    if summary.cancelled {
        info!(
            "Scan of {} interrupted after {} blocks",
            range, summary.blocks_scanned
        );
        return Err(ApiError::Unavailable(
            "server is shutting down, scan was interrupted".to_string(),
        ));
    }
    Ok(())
}

/// GET /tokenInfo/:contract
pub async fn get_token_info(
    State(state): State<AppState>,
    Path(contract): Path<String>,
) -> ApiResult<Json<TokenInfo>> {
    info!("Fetching contract: {}", contract);

    let address = Address::from_str(&contract)
        .map_err(|_| ApiError::BadRequest(format!("invalid contract address: {contract}")))?;

    let token = state
        .scanner
        .resolver()
        .resolve(address)
        .await
        .map_err(|e| {
            info!("Contract {} did not resolve: {}", contract, e);
            ApiError::NotFound("could not find contract address".to_string())
        })?;

    Ok(Json(token))
}

/// GET /getBlockInfo?start=&end=
///
/// Scans a bounded range and answers with the tokens as one JSON array.
pub async fn get_block_range_info(
    State(state): State<AppState>,
    Query(query): Query<BlockRangeQuery>,
) -> ApiResult<impl IntoResponse> {
    let start = query
        .start
        .ok_or_else(|| ApiError::BadRequest("start block is required".to_string()))?;
    let end = query.end.unwrap_or(start);
    let range = ScanRange::new(start, end).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let max = state.config.scan.max_http_range;
    if range.block_count() > max {
        return Err(ApiError::BadRequest(format!(
            "range {range} exceeds {max} blocks, use POST /dump instead"
        )));
    }

    let mut sink = CollectingSink::new();
    let cancel = state.shutdown.child_token();
    let summary = state
        .scanner
        .scan(range, &mut sink, &mut LogObserver, &cancel)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    ensure_complete(&range, &summary)?;
    info!(
        "Block range {} scanned: {} tokens, {} block errors",
        range, summary.tokens_found, summary.block_errors
    );

    let body = sink
        .body()
        .map(str::to_string)
        .ok_or_else(|| ApiError::Internal("scan output was not finalized".to_string()))?;
    Ok(([(header::CONTENT_TYPE, "application/json")], body))
}

/// GET /blockInfo/:block
pub async fn get_block_info(
    State(state): State<AppState>,
    Path(block): Path<u64>,
) -> ApiResult<Json<BlockInfoResponse>> {
    let summary = state.chain.block_summary(block).await.map_err(|e| {
        info!("Block {} unavailable: {}", block, e);
        ApiError::NotFound(format!("could not find block {block}"))
    })?;

    let range = ScanRange::single(block);
    let mut sink = CollectingSink::new();
    let cancel = state.shutdown.child_token();
    let scanned = state
        .scanner
        .scan(range, &mut sink, &mut LogObserver, &cancel)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    ensure_complete(&range, &scanned)?;

    Ok(Json(BlockInfoResponse {
        block: summary,
        tokens: sink.into_tokens(),
    }))
}

/// POST /dump
///
/// Starts a background dump to the output directory and returns immediately.
/// The dump runs on the server's task tracker so shutdown waits for it to
/// finalize its artifact.
pub async fn start_dump(
    State(state): State<AppState>,
    Json(request): Json<DumpRequest>,
) -> ApiResult<impl IntoResponse> {
    let range = ScanRange::new(request.start_block, request.end_block)
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let options = DumpOptions {
        output_dir: state.config.output_dir.clone(),
        target: DumpTarget::File,
        database_url: Some(state.config.database_url.clone()),
        resume: false,
    };
    let file = artifact_path(&options.output_dir, &range);

    let scanner = state.scanner.clone();
    let cancel = state.shutdown.child_token();
    state.tasks.spawn(async move {
        if let Err(e) = run_dump(&scanner, range, &options, &cancel).await {
            error!("Dump {} failed: {:#}", range, e);
        }
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(DumpStarted {
            file: file.display().to_string(),
            start_block: range.start(),
            end_block: range.end(),
        }),
    ))
}
