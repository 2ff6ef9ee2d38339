use crate::dump::DumpReport;
use crate::models::{BlockSummary, ScanSummary, TokenInfo};
use comfy_table::{Cell, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};
use csv::Writer;
use serde_json::json;

#[derive(Debug, Clone)]
pub enum OutputFormat {
    Table,
    Json,
    Csv,
}

impl From<&str> for OutputFormat {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => OutputFormat::Json,
            "csv" => OutputFormat::Csv,
            _ => OutputFormat::Table,
        }
    }
}

pub fn format_tokens(tokens: &[TokenInfo], format: &OutputFormat) -> String {
    match format {
        OutputFormat::Table => format_tokens_table(tokens),
        OutputFormat::Json => format_tokens_json(tokens),
        OutputFormat::Csv => format_tokens_csv(tokens),
    }
}

fn format_tokens_table(tokens: &[TokenInfo]) -> String {
    if tokens.is_empty() {
        return "No tokens found.".to_string();
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec!["Address", "Symbol", "Name", "Decimals", "Type"]);

    for token in tokens {
        table.add_row(vec![
            Cell::new(token.address.to_checksum(None)),
            Cell::new(&token.symbol),
            Cell::new(&token.name),
            Cell::new(token.decimals),
            Cell::new(&token.kind),
        ]);
    }

    table.to_string()
}

fn format_tokens_json(tokens: &[TokenInfo]) -> String {
    serde_json::to_string_pretty(tokens).unwrap_or_else(|_| "[]".to_string())
}

fn format_tokens_csv(tokens: &[TokenInfo]) -> String {
    let mut wtr = Writer::from_writer(vec![]);

    let _ = wtr.write_record(["address", "symbol", "decimal", "type", "name"]);

    for token in tokens {
        let _ = wtr.write_record([
            &token.address.to_checksum(None),
            &token.symbol,
            &token.decimals.to_string(),
            &token.kind,
            &token.name,
        ]);
    }

    String::from_utf8(wtr.into_inner().unwrap_or_default()).unwrap_or_default()
}

pub fn format_block_info(
    block: &BlockSummary,
    tokens: &[TokenInfo],
    format: &OutputFormat,
) -> String {
    match format {
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .apply_modifier(UTF8_ROUND_CORNERS)
                .set_header(vec!["Metric", "Value"]);

            table.add_row(vec![Cell::new("Block"), Cell::new(block.number)]);
            table.add_row(vec![Cell::new("Hash"), Cell::new(&block.hash)]);
            table.add_row(vec![Cell::new("Timestamp"), Cell::new(block.timestamp)]);
            table.add_row(vec![
                Cell::new("Transactions"),
                Cell::new(block.transaction_count),
            ]);
            table.add_row(vec![Cell::new("Gas Used"), Cell::new(block.gas_used)]);
            table.add_row(vec![Cell::new("Tokens Created"), Cell::new(tokens.len())]);

            format!("{}\n{}", table, format_tokens_table(tokens))
        }
        OutputFormat::Json => serde_json::to_string_pretty(&json!({
            "block": block,
            "tokens": tokens,
        }))
        .unwrap_or_else(|_| "{}".to_string()),
        // Block metadata has no natural CSV shape, so only the token rows are emitted
        OutputFormat::Csv => format_tokens_csv(tokens),
    }
}

pub fn format_scan_summary(summary: &ScanSummary, format: &OutputFormat) -> String {
    match format {
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .apply_modifier(UTF8_ROUND_CORNERS)
                .set_header(vec!["Metric", "Value"]);

            table.add_row(vec![
                Cell::new("Blocks Scanned"),
                Cell::new(summary.blocks_scanned),
            ]);
            table.add_row(vec![
                Cell::new("Block Errors"),
                Cell::new(summary.block_errors),
            ]);
            table.add_row(vec![
                Cell::new("Tokens Found"),
                Cell::new(summary.tokens_found),
            ]);
            table.add_row(vec![
                Cell::new("Cancelled"),
                Cell::new(if summary.cancelled { "yes" } else { "no" }),
            ]);

            table.to_string()
        }
        OutputFormat::Json => {
            serde_json::to_string_pretty(summary).unwrap_or_else(|_| "{}".to_string())
        }
        OutputFormat::Csv => {
            let mut wtr = Writer::from_writer(vec![]);
            let _ = wtr.write_record(["metric", "value"]);
            let rows = [
                ("blocks_scanned", summary.blocks_scanned.to_string()),
                ("block_errors", summary.block_errors.to_string()),
                ("tokens_found", summary.tokens_found.to_string()),
                ("cancelled", summary.cancelled.to_string()),
            ];
            for (metric, value) in &rows {
                let _ = wtr.write_record([*metric, value.as_str()]);
            }
            String::from_utf8(wtr.into_inner().unwrap_or_default()).unwrap_or_default()
        }
    }
}

pub fn format_dump_report(report: &DumpReport, format: &OutputFormat) -> String {
    let output = report
        .output
        .as_ref()
        .map_or("database".to_string(), |p| p.display().to_string());

    match format {
        OutputFormat::Json => {
            serde_json::to_string_pretty(report).unwrap_or_else(|_| "{}".to_string())
        }
        _ => format!(
            "Dump {} (blocks {}-{}) -> {}\n{}",
            report.job,
            report.start_block,
            report.end_block,
            output,
            format_scan_summary(&report.summary, format)
        ),
    }
}
