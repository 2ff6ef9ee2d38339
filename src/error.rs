use alloy_primitives::Address;
use thiserror::Error;

/// Errors that stop a scan. Block and token failures are never reported
/// through this type; they surface as [`crate::scanner::ScanEvent`]s.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("invalid block range {start}..={end}")]
    InvalidRange { start: i64, end: i64 },

    #[error("output sink failed: {0}")]
    Sink(#[from] SinkError),
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode token: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),

    #[error("sink already finalized")]
    Finalized,
}

/// Why an address did not resolve into a token.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("{0:?} has no contract code")]
    NotAContract(Address),

    #[error("{address:?} does not implement {method}()")]
    MissingMetadata {
        address: Address,
        method: &'static str,
    },

    #[error("metadata lookup for {address:?} failed: {reason}")]
    Unreachable { address: Address, reason: String },
}
