use crate::chain::ChainReader;
use crate::error::{ResolveError, ScanError};
use crate::models::{ScanProgress, ScanRange, ScanSummary, TokenInfo};
use crate::resolver::TokenResolver;
use crate::sink::TokenSink;
use alloy_primitives::Address;
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const DEFAULT_PROGRESS_INTERVAL: u64 = 50;

/// Everything that happens during a scan, in the order it happens.
#[derive(Debug)]
pub enum ScanEvent<'a> {
    Progress(ScanProgress),
    BlockFailed {
        block: u64,
        error: &'a anyhow::Error,
    },
    TokenSkipped {
        block: u64,
        address: Address,
        error: &'a ResolveError,
    },
    TokenFound {
        block: u64,
        token: &'a TokenInfo,
    },
    BlockCompleted {
        block: u64,
        progress: ScanProgress,
    },
}

/// Receives scan events. Observers decide whether an event is logged,
/// persisted or ignored; the scanner itself never logs.
pub trait ScanObserver {
    fn observe(&mut self, event: &ScanEvent<'_>);
}

impl<T: ScanObserver + ?Sized> ScanObserver for &mut T {
    fn observe(&mut self, event: &ScanEvent<'_>) {
        (**self).observe(event);
    }
}

impl<A: ScanObserver, B: ScanObserver> ScanObserver for (A, B) {
    fn observe(&mut self, event: &ScanEvent<'_>) {
        self.0.observe(event);
        self.1.observe(event);
    }
}

impl<T: ScanObserver> ScanObserver for Option<T> {
    fn observe(&mut self, event: &ScanEvent<'_>) {
        if let Some(inner) = self {
            inner.observe(event);
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ScanObserver for NoopObserver {
    fn observe(&mut self, _event: &ScanEvent<'_>) {}
}

/// Console/log reporting: `<block>: <percent>%` progress lines, a warning per
/// unreadable block and debug lines for skipped contracts.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl ScanObserver for LogObserver {
    fn observe(&mut self, event: &ScanEvent<'_>) {
        match event {
            ScanEvent::Progress(progress) => {
                info!("{}: {:.2}%", progress.current_block, progress.percent());
            }
            ScanEvent::BlockFailed { block, error } => {
                warn!("Error at block {}: {}", block, error);
            }
            ScanEvent::TokenSkipped {
                block,
                address,
                error,
            } => {
                debug!("Skipping {:?} from block {}: {}", address, block, error);
            }
            ScanEvent::TokenFound { block, token } => {
                debug!(
                    "Found token {} ({:?}) in block {}",
                    token.symbol, token.address, block
                );
            }
            ScanEvent::BlockCompleted { progress, .. } => {
                if progress.scanned == progress.total {
                    info!(
                        "Scan finished: {} blocks, {} block errors",
                        progress.scanned, progress.errors
                    );
                }
            }
        }
    }
}

/// Sequential block-range walker.
///
/// Blocks are read one at a time in ascending order; every resolved token is
/// handed to the sink before the next address is looked at.
pub struct Scanner<R: ?Sized> {
    reader: Arc<R>,
    resolver: TokenResolver<R>,
    progress_interval: u64,
}

impl<R: ChainReader + ?Sized> Scanner<R> {
    pub fn new(reader: Arc<R>, progress_interval: u64) -> Self {
        let resolver = TokenResolver::new(Arc::clone(&reader));
        Scanner {
            reader,
            resolver,
            progress_interval: progress_interval.max(1),
        }
    }

    pub fn resolver(&self) -> &TokenResolver<R> {
        &self.resolver
    }

    pub async fn scan<S, O>(
        &self,
        range: ScanRange,
        sink: &mut S,
        observer: &mut O,
        cancel: &CancellationToken,
    ) -> Result<ScanSummary, ScanError>
    where
        S: TokenSink + Send,
        O: ScanObserver + Send,
    {
        let total = range.block_count();
        let mut summary = ScanSummary::default();
        let mut seen: HashSet<Address> = HashSet::new();

        for block in range.blocks() {
            if cancel.is_cancelled() {
                summary.cancelled = true;
                break;
            }

            if (block - range.start()) % self.progress_interval == 0 {
                observer.observe(&ScanEvent::Progress(ScanProgress {
                    current_block: block,
                    scanned: summary.blocks_scanned,
                    total,
                    errors: summary.block_errors,
                }));
            }

            match self.reader.contracts_created_in_block(block).await {
                Ok(addresses) => {
                    for address in addresses {
                        if !seen.insert(address) {
                            continue;
                        }
                        match self.resolver.resolve(address).await {
                            Ok(token) => {
                                sink.append(&token)?;
                                summary.tokens_found += 1;
                                observer.observe(&ScanEvent::TokenFound {
                                    block,
                                    token: &token,
                                });
                            }
                            Err(error) => observer.observe(&ScanEvent::TokenSkipped {
                                block,
                                address,
                                error: &error,
                            }),
                        }
                    }
                }
                Err(error) => {
                    summary.block_errors += 1;
                    observer.observe(&ScanEvent::BlockFailed {
                        block,
                        error: &error,
                    });
                }
            }

            summary.blocks_scanned += 1;
            observer.observe(&ScanEvent::BlockCompleted {
                block,
                progress: ScanProgress {
                    current_block: block,
                    scanned: summary.blocks_scanned,
                    total,
                    errors: summary.block_errors,
                },
            });
        }

        sink.finalize()?;
        Ok(summary)
    }
}
