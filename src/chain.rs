use crate::error::ResolveError;
use crate::models::BlockSummary;
use alloy_primitives::Address;
use anyhow::Result;
use async_trait::async_trait;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenMetadata {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

/// Read-only view of the chain used by the scanner and the HTTP handlers.
///
/// Implementations are shared between concurrent scans and must not keep
/// per-call mutable state. Each call is expected to finish within a bounded
/// time; the scanner does not add its own timeout.
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// Addresses of contracts deployed in `block`, in transaction order.
    async fn contracts_created_in_block(&self, block: u64) -> Result<Vec<Address>>;

    async fn token_metadata(&self, address: Address) -> Result<TokenMetadata, ResolveError>;

    async fn block_summary(&self, block: u64) -> Result<BlockSummary>;
}
