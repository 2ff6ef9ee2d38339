use crate::abi::{decimalsCall, nameCall, symbolCall};
use crate::chain::{ChainReader, TokenMetadata};
use crate::config::RpcConfig;
use crate::error::ResolveError;
use crate::models::BlockSummary;
use alloy::network::TransactionBuilder;
use alloy::providers::fillers::FillProvider;
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::{BlockId, BlockNumberOrTag, TransactionRequest};
use alloy::sol_types::SolCall;
use alloy::transports::{RpcError, TransportErrorKind};
use alloy_primitives::{Address, Bytes};
use anyhow::Result;
use async_trait::async_trait;
use std::future::IntoFuture;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::timeout;
use tokio_retry::Retry;
use tokio_retry::strategy::{ExponentialBackoff, jitter};
use tracing::{debug, warn};

type AlloyFullProvider = FillProvider<
    alloy::providers::fillers::JoinFill<
        alloy::providers::Identity,
        alloy::providers::fillers::JoinFill<
            alloy::providers::fillers::GasFiller,
            alloy::providers::fillers::JoinFill<
                alloy::providers::fillers::BlobGasFiller,
                alloy::providers::fillers::JoinFill<
                    alloy::providers::fillers::NonceFiller,
                    alloy::providers::fillers::ChainIdFiller,
                >,
            >,
        >,
    >,
    alloy::providers::RootProvider,
>;

#[derive(Clone)]
pub struct RpcClient {
    providers: Vec<AlloyFullProvider>,
    urls: Vec<String>,
    current_provider: Arc<AtomicUsize>,
    max_retries: usize,
    request_timeout: Duration,
}

impl RpcClient {
    pub fn new(config: &RpcConfig) -> Result<Self> {
        if config.urls.is_empty() {
            return Err(anyhow::anyhow!("At least one RPC URL must be provided"));
        }

        let mut providers = Vec::new();
        for url in &config.urls {
            let parsed_url = url
                .parse()
                .map_err(|_| anyhow::anyhow!("Invalid RPC URL: {}", url))?;
            let provider: AlloyFullProvider = ProviderBuilder::new().connect_http(parsed_url);
            providers.push(provider);
        }

        Ok(RpcClient {
            providers,
            urls: config.urls.clone(),
            current_provider: Arc::new(AtomicUsize::new(0)),
            max_retries: config.max_retries,
            request_timeout: config.request_timeout,
        })
    }

    fn get_provider(&self) -> &AlloyFullProvider {
        let index = self.current_provider.load(Ordering::Relaxed) % self.providers.len();
        &self.providers[index]
    }

    pub fn get_current_url(&self) -> &str {
        let index = self.current_provider.load(Ordering::Relaxed) % self.urls.len();
        &self.urls[index]
    }

    pub fn rotate_provider(&self) {
        let current = self.current_provider.load(Ordering::Relaxed);
        let next = (current + 1) % self.providers.len();
        self.current_provider.store(next, Ordering::Relaxed);

        if self.providers.len() > 1 {
            debug!("Rotating to RPC provider #{}", next);
        }
    }

    fn get_retry_strategy(&self) -> impl Iterator<Item = Duration> + use<> {
        ExponentialBackoff::from_millis(100)
            .factor(2)
            .max_delay(Duration::from_secs(10))
            .map(jitter)
            .take(self.max_retries)
    }

    fn handle_error(&self, error_str: &str) {
        let current_url = self.get_current_url();
        warn!(
            "RPC error on {}: {}, rotating provider",
            current_url, error_str
        );
        self.rotate_provider();
    }

    fn handle_timeout(&self) -> anyhow::Error {
        let current_url = self.get_current_url();
        warn!(
            "Request timeout after {} seconds on {}, rotating provider",
            self.request_timeout.as_secs(),
            current_url
        );
        self.rotate_provider();
        anyhow::anyhow!(
            "Request timeout after {} seconds",
            self.request_timeout.as_secs()
        )
    }

    pub async fn get_latest_block(&self) -> Result<u64> {
        let client = self.clone();
        Retry::spawn(self.get_retry_strategy(), move || {
            let client = client.clone();
            async move {
                let provider = client.get_provider();
                match timeout(client.request_timeout, provider.get_block_number()).await {
                    Ok(Ok(block_number)) => Ok(block_number),
                    Ok(Err(e)) => {
                        let error_str = e.to_string();
                        client.handle_error(&error_str);
                        Err(anyhow::anyhow!("{}", e))
                    }
                    Err(_) => Err(client.handle_timeout()),
                }
            }
        })
        .await
    }

    /// Contract addresses from the receipts of `block_number`, in
    /// transaction order.
    pub async fn get_created_contracts(&self, block_number: u64) -> Result<Vec<Address>> {
        let client = self.clone();
        Retry::spawn(self.get_retry_strategy(), move || {
            let client = client.clone();
            async move {
                let provider = client.get_provider();
                let future = provider
                    .get_block_receipts(BlockId::number(block_number))
                    .into_future();

                match timeout(client.request_timeout, future).await {
                    Ok(Ok(Some(receipts))) => Ok(receipts
                        .iter()
                        .filter_map(|receipt| receipt.contract_address)
                        .collect()),
                    Ok(Ok(None)) => Err(anyhow::anyhow!("Block {} not found", block_number)),
                    Ok(Err(e)) => {
                        let error_str = e.to_string();
                        client.handle_error(&error_str);
                        Err(anyhow::anyhow!("{}", e))
                    }
                    Err(_) => Err(client.handle_timeout()),
                }
            }
        })
        .await
    }

    pub async fn get_block_summary(&self, block_number: u64) -> Result<BlockSummary> {
        let client = self.clone();
        Retry::spawn(self.get_retry_strategy(), move || {
            let client = client.clone();
            async move {
                let provider = client.get_provider();
                let future = provider
                    .get_block_by_number(BlockNumberOrTag::Number(block_number))
                    .into_future();

                match timeout(client.request_timeout, future).await {
                    Ok(Ok(Some(block))) => Ok(BlockSummary {
                        number: block.header.number,
                        hash: format!("{:?}", block.header.hash),
                        timestamp: block.header.timestamp,
                        transaction_count: block.transactions.len(),
                        gas_used: block.header.gas_used,
                    }),
                    Ok(Ok(None)) => Err(anyhow::anyhow!("Block {} not found", block_number)),
                    Ok(Err(e)) => {
                        let error_str = e.to_string();
                        client.handle_error(&error_str);
                        Err(anyhow::anyhow!("{}", e))
                    }
                    Err(_) => Err(client.handle_timeout()),
                }
            }
        })
        .await
    }

    /// Single `eth_call` against `address`, decoded as `C`'s return type.
    /// Not retried: a failing view call is an answer, not a transient error.
    pub async fn call_contract<C: SolCall>(
        &self,
        address: Address,
        call: C,
    ) -> Result<C::Return, ResolveError> {
        let request = TransactionRequest::default()
            .with_to(address)
            .with_input(Bytes::from(call.abi_encode()));

        let future = self.get_provider().call(request).into_future();
        let output = match timeout(self.request_timeout, future).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) if is_execution_error(&e) => {
                debug!("Call to {:?} failed in execution: {}", address, e);
                return Err(ResolveError::MissingMetadata {
                    address,
                    method: C::SIGNATURE.trim_end_matches("()"),
                });
            }
            Ok(Err(e)) => {
                let error_str = e.to_string();
                self.handle_error(&error_str);
                return Err(ResolveError::Unreachable {
                    address,
                    reason: error_str,
                });
            }
            Err(_) => {
                let reason = self.handle_timeout().to_string();
                return Err(ResolveError::Unreachable { address, reason });
            }
        };

        if output.is_empty() {
            return Err(ResolveError::NotAContract(address));
        }

        C::abi_decode_returns(&output).map_err(|_| ResolveError::MissingMetadata {
            address,
            method: C::SIGNATURE.trim_end_matches("()"),
        })
    }
}

/// Whether the node ran the call and the contract itself failed it.
///
/// Geth-style nodes answer a revert with code 3 and the revert data, or with
/// code -32000 and an "execution reverted" message when there is no data.
/// Anything else (transport failures, rate limits, unknown methods) is the
/// endpoint's fault, not the contract's.
fn is_execution_error(error: &RpcError<TransportErrorKind>) -> bool {
    let RpcError::ErrorResp(payload) = error else {
        return false;
    };
    if payload.code == 3 || payload.as_revert_data().is_some() {
        return true;
    }
    payload.code == -32000 && {
        let message = payload.message.to_ascii_lowercase();
        message.contains("revert") || message.contains("invalid opcode")
    }
}

#[async_trait]
impl ChainReader for RpcClient {
    async fn contracts_created_in_block(&self, block: u64) -> Result<Vec<Address>> {
        self.get_created_contracts(block).await
    }

    async fn token_metadata(&self, address: Address) -> Result<TokenMetadata, ResolveError> {
        let name = self.call_contract(address, nameCall {}).await?;
        let symbol = self.call_contract(address, symbolCall {}).await?;
        let decimals = self.call_contract(address, decimalsCall {}).await?;

        Ok(TokenMetadata {
            name,
            symbol,
            decimals,
        })
    }

    async fn block_summary(&self, block: u64) -> Result<BlockSummary> {
        self.get_block_summary(block).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::rpc::json_rpc::ErrorPayload;

    fn config(urls: &[&str]) -> RpcConfig {
        RpcConfig {
            urls: urls.iter().map(|u| u.to_string()).collect(),
            request_timeout: Duration::from_secs(5),
            max_retries: 2,
        }
    }

    fn error_response(code: i64, message: &'static str) -> RpcError<TransportErrorKind> {
        RpcError::ErrorResp(ErrorPayload {
            code,
            message: message.into(),
            data: None,
        })
    }

    #[test]
    fn reverted_calls_are_execution_errors() {
        assert!(is_execution_error(&error_response(3, "execution reverted")));
        assert!(is_execution_error(&error_response(-32000, "Execution Reverted")));
    }

    #[test]
    fn endpoint_failures_are_not_execution_errors() {
        assert!(!is_execution_error(&error_response(-32005, "limit exceeded")));
        assert!(!is_execution_error(&error_response(
            -32601,
            "the method eth_call does not exist"
        )));
        assert!(!is_execution_error(&RpcError::Transport(
            TransportErrorKind::BackendGone
        )));
        assert!(!is_execution_error(&RpcError::NullResp));
    }

    #[test]
    fn requires_at_least_one_url() {
        assert!(RpcClient::new(&config(&[])).is_err());
    }

    #[test]
    fn rejects_malformed_url() {
        let err = RpcClient::new(&config(&["not a url"])).err().unwrap();
        assert!(err.to_string().contains("Invalid RPC URL"));
    }

    #[tokio::test]
    async fn rotates_between_providers() {
        let client =
            RpcClient::new(&config(&["http://localhost:8545", "http://localhost:8546"])).unwrap();
        assert_eq!(client.get_current_url(), "http://localhost:8545");
        client.rotate_provider();
        assert_eq!(client.get_current_url(), "http://localhost:8546");
        client.rotate_provider();
        assert_eq!(client.get_current_url(), "http://localhost:8545");
    }
}
