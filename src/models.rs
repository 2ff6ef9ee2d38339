use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

use crate::error::ScanError;

pub const ERC20_KIND: &str = "erc20";

/// A resolved token contract.
///
/// Field names and order are shared with existing dump consumers, so the
/// serialized form keeps `decimal` and `type` even though the Rust names differ.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    #[serde(with = "checksummed")]
    pub address: Address,
    pub symbol: String,
    #[serde(rename = "decimal")]
    pub decimals: u8,
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
}

impl TokenInfo {
    pub fn erc20(address: Address, name: String, symbol: String, decimals: u8) -> Self {
        Self {
            address,
            symbol,
            decimals,
            kind: ERC20_KIND.to_string(),
            name,
        }
    }
}

mod checksummed {
    use alloy_primitives::Address;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::str::FromStr;

    pub fn serialize<S: Serializer>(address: &Address, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&address.to_checksum(None))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Address, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Address::from_str(&raw).map_err(serde::de::Error::custom)
    }
}

/// Inclusive block range. Only obtainable through [`ScanRange::new`], so every
/// value satisfies `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanRange {
    start: u64,
    end: u64,
}

impl ScanRange {
    pub fn new(start: i64, end: i64) -> Result<Self, ScanError> {
        if start < 0 || end < 0 || start > end {
            return Err(ScanError::InvalidRange { start, end });
        }
        Ok(Self {
            start: start as u64,
            end: end as u64,
        })
    }

    pub fn single(block: u64) -> Self {
        Self {
            start: block,
            end: block,
        }
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn end(&self) -> u64 {
        self.end
    }

    pub fn block_count(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Remaining part of the range after `block` has been processed.
    pub fn resume_after(&self, block: u64) -> Option<Self> {
        if block < self.start {
            return Some(*self);
        }
        if block >= self.end {
            return None;
        }
        Some(Self {
            start: block + 1,
            end: self.end,
        })
    }

    pub fn blocks(&self) -> std::ops::RangeInclusive<u64> {
        self.start..=self.end
    }
}

impl std::fmt::Display for ScanRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanProgress {
    pub current_block: u64,
    pub scanned: u64,
    pub total: u64,
    pub errors: u64,
}

impl ScanProgress {
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        self.scanned as f64 / self.total as f64
    }

    pub fn percent(&self) -> f64 {
        self.fraction() * 100.0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanSummary {
    pub blocks_scanned: u64,
    pub block_errors: u64,
    pub tokens_found: u64,
    pub cancelled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockSummary {
    pub number: u64,
    pub hash: String,
    pub timestamp: u64,
    pub transaction_count: usize,
    pub gas_used: u64,
}
