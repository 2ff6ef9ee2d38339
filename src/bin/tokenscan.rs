use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tokenbalance::config::Config;
use tokenbalance::dump::{DumpOptions, DumpTarget};
use tokenbalance::models::ScanRange;
use tokenbalance::query::commands::{cmd_block_info, cmd_dump, cmd_token_info, cmd_tokens};
use tokenbalance::query::formatters::OutputFormat;
use tokenbalance::repository::{Database, TokenRepository};
use tokenbalance::rpc::RpcClient;
use tokenbalance::scanner::Scanner;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tokenscan")]
#[command(about = "Discover ERC20 tokens deployed in a block range", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "table")]
    format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a block range into a file or the database
    Dump {
        #[arg(long)]
        start: Option<i64>,

        #[arg(long)]
        end: Option<i64>,

        #[arg(long, default_value = "false")]
        resume: bool,

        #[arg(long, value_enum, default_value_t = DumpTarget::File)]
        sink: DumpTarget,
    },
    BlockInfo {
        block: u64,
    },
    TokenInfo {
        contract: String,
    },
    /// List tokens stored by database dumps
    Tokens {
        #[arg(long, default_value = "100")]
        limit: usize,

        #[arg(long, default_value = "0")]
        offset: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let format = OutputFormat::from(cli.format.as_str());

    let config = Config::from_env()?;

    let cancel = CancellationToken::new();
    let signal = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                warn!("Interrupted, stopping after the current block");
                signal.cancel();
            }
            Err(e) => error!("Failed to listen for shutdown signal: {}", e),
        }
    });

    match cli.command {
        Commands::Dump {
            start,
            end,
            resume,
            sink,
        } => {
            let default = config.scan.default_range;
            let range = ScanRange::new(
                start.unwrap_or(default.start() as i64),
                end.unwrap_or(default.end() as i64),
            )?;
            let options = DumpOptions {
                output_dir: config.output_dir.clone(),
                target: sink,
                database_url: Some(config.database_url.clone()),
                resume,
            };

            let client = Arc::new(RpcClient::new(&config.rpc)?);
            info!("Using RPC endpoint {}", client.get_current_url());
            let scanner = Scanner::new(client, config.scan.progress_interval);
            cmd_dump(&scanner, range, &options, &cancel, &format).await?;
        }
        Commands::BlockInfo { block } => {
            let client = Arc::new(RpcClient::new(&config.rpc)?);
            let scanner = Scanner::new(Arc::clone(&client), config.scan.progress_interval);
            cmd_block_info(client.as_ref(), &scanner, block, &cancel, &format).await?;
        }
        Commands::TokenInfo { contract } => {
            let client = Arc::new(RpcClient::new(&config.rpc)?);
            let scanner = Scanner::new(client, config.scan.progress_interval);
            cmd_token_info(&scanner, &contract, &format).await?;
        }
        Commands::Tokens { limit, offset } => {
            let db = Database::new(&config.database_url)?;
            let token_repo = TokenRepository::new(&db.conn);
            cmd_tokens(&token_repo, limit, offset, &format)?;
        }
    }

    Ok(())
}
