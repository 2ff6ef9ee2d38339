use crate::chain::ChainReader;
use crate::dump::{DumpOptions, run_dump};
use crate::models::ScanRange;
use crate::query::formatters::{
    OutputFormat, format_block_info, format_dump_report, format_tokens,
};
use crate::repository::TokenRepository;
use crate::scanner::{LogObserver, Scanner};
use crate::sink::CollectingSink;
use alloy_primitives::Address;
use anyhow::Result;
use std::str::FromStr;
use tokio_util::sync::CancellationToken;

pub async fn cmd_token_info<R: ChainReader + ?Sized>(
    scanner: &Scanner<R>,
    contract: &str,
    format: &OutputFormat,
) -> Result<()> {
    let address = Address::from_str(contract)
        .map_err(|_| anyhow::anyhow!("Invalid address format: {}", contract))?;

    let token = scanner
        .resolver()
        .resolve(address)
        .await
        .map_err(|e| anyhow::anyhow!("Could not find contract address {}: {}", contract, e))?;
    println!("{}", format_tokens(std::slice::from_ref(&token), format));

    Ok(())
}

pub async fn cmd_block_info<R: ChainReader + ?Sized>(
    reader: &R,
    scanner: &Scanner<R>,
    block: u64,
    cancel: &CancellationToken,
    format: &OutputFormat,
) -> Result<()> {
    let summary = reader.block_summary(block).await?;

    let mut sink = CollectingSink::new();
    scanner
        .scan(ScanRange::single(block), &mut sink, &mut LogObserver, cancel)
        .await?;

    println!("{}", format_block_info(&summary, sink.tokens(), format));

    Ok(())
}

pub fn cmd_tokens(
    token_repo: &TokenRepository,
    limit: usize,
    offset: usize,
    format: &OutputFormat,
) -> Result<()> {
    let tokens = token_repo.list(limit, offset)?;
    println!("{}", format_tokens(&tokens, format));

    if matches!(format, OutputFormat::Table) {
        let total = token_repo.count()?;
        println!("Showing {} of {} stored tokens", tokens.len(), total);
    }

    Ok(())
}

pub async fn cmd_dump<R: ChainReader + ?Sized>(
    scanner: &Scanner<R>,
    range: ScanRange,
    options: &DumpOptions,
    cancel: &CancellationToken,
    format: &OutputFormat,
) -> Result<()> {
    let report = run_dump(scanner, range, options, cancel).await?;
    println!("{}", format_dump_report(&report, format));

    Ok(())
}
