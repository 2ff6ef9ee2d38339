use crate::chain::ChainReader;
use crate::error::ResolveError;
use crate::models::TokenInfo;
use alloy_primitives::Address;
use std::sync::Arc;
use tracing::debug;

/// Turns contract addresses into [`TokenInfo`] records.
///
/// One metadata lookup per address and no retries: a transient failure is
/// reported the same way as a non-token contract and the caller moves on.
pub struct TokenResolver<R: ?Sized> {
    reader: Arc<R>,
}

impl<R: ?Sized> Clone for TokenResolver<R> {
    fn clone(&self) -> Self {
        Self {
            reader: Arc::clone(&self.reader),
        }
    }
}

impl<R: ChainReader + ?Sized> TokenResolver<R> {
    pub fn new(reader: Arc<R>) -> Self {
        Self { reader }
    }

    pub async fn resolve(&self, address: Address) -> Result<TokenInfo, ResolveError> {
        let metadata = self.reader.token_metadata(address).await?;
        debug!(
            "Resolved {:?} as {} ({}, {} decimals)",
            address, metadata.symbol, metadata.name, metadata.decimals
        );
        Ok(TokenInfo::erc20(
            address,
            metadata.name,
            metadata.symbol,
            metadata.decimals,
        ))
    }
}
