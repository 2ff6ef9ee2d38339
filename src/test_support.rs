use crate::chain::{ChainReader, TokenMetadata};
use crate::error::ResolveError;
use crate::models::BlockSummary;
use alloy_primitives::Address;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Scripted chain used by unit tests.
#[derive(Default)]
pub struct FakeChain {
    blocks: HashMap<u64, Vec<Address>>,
    failing_blocks: HashSet<u64>,
    tokens: HashMap<Address, TokenMetadata>,
    unreachable: HashSet<Address>,
    cancel_on: Option<(u64, CancellationToken)>,
    metadata_calls: Mutex<HashMap<Address, usize>>,
    block_reads: Mutex<Vec<u64>>,
}

impl FakeChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_block(mut self, block: u64, contracts: &[Address]) -> Self {
        self.blocks.insert(block, contracts.to_vec());
        self
    }

    pub fn with_failing_block(mut self, block: u64) -> Self {
        self.failing_blocks.insert(block);
        self
    }

    pub fn with_token(mut self, address: Address, name: &str, symbol: &str, decimals: u8) -> Self {
        self.tokens.insert(
            address,
            TokenMetadata {
                name: name.to_string(),
                symbol: symbol.to_string(),
                decimals,
            },
        );
        self
    }

    pub fn with_unreachable_token(mut self, address: Address) -> Self {
        self.unreachable.insert(address);
        self
    }

    /// Trigger `token` while block `block` is being read.
    pub fn with_cancel_on(mut self, block: u64, token: CancellationToken) -> Self {
        self.cancel_on = Some((block, token));
        self
    }

    pub fn metadata_calls(&self, address: Address) -> usize {
        self.metadata_calls
            .lock()
            .unwrap()
            .get(&address)
            .copied()
            .unwrap_or(0)
    }

    pub fn block_reads(&self) -> Vec<u64> {
        self.block_reads.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChainReader for FakeChain {
    async fn contracts_created_in_block(&self, block: u64) -> anyhow::Result<Vec<Address>> {
        self.block_reads.lock().unwrap().push(block);
        if let Some((at, token)) = &self.cancel_on {
            if *at == block {
                token.cancel();
            }
        }
        if self.failing_blocks.contains(&block) {
            anyhow::bail!("block {} unavailable", block);
        }
        Ok(self.blocks.get(&block).cloned().unwrap_or_default())
    }

    async fn token_metadata(&self, address: Address) -> Result<TokenMetadata, ResolveError> {
        *self
            .metadata_calls
            .lock()
            .unwrap()
            .entry(address)
            .or_default() += 1;
        if self.unreachable.contains(&address) {
            return Err(ResolveError::Unreachable {
                address,
                reason: "connection reset".to_string(),
            });
        }
        self.tokens
            .get(&address)
            .cloned()
            .ok_or(ResolveError::NotAContract(address))
    }

    async fn block_summary(&self, block: u64) -> anyhow::Result<BlockSummary> {
        if self.failing_blocks.contains(&block) {
            anyhow::bail!("block {} unavailable", block);
        }
        Ok(BlockSummary {
            number: block,
            hash: format!("0x{block:064x}"),
            timestamp: 1_500_000_000 + block,
            transaction_count: self.blocks.get(&block).map_or(0, Vec::len),
            gas_used: 21_000,
        })
    }
}
