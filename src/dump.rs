use crate::chain::ChainReader;
use crate::models::{ScanRange, ScanSummary};
use crate::repository::{CheckpointRepository, Database};
use crate::scanner::{LogObserver, ScanEvent, ScanObserver, Scanner};
use crate::sink::{DatabaseSink, StreamingSink, TokenSink};
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const CHECKPOINT_INTERVAL: u64 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum DumpTarget {
    /// Streaming JSON array in the output directory.
    #[default]
    File,
    /// Rows in the `tokens` table.
    Db,
}

#[derive(Debug, Clone)]
pub struct DumpOptions {
    pub output_dir: PathBuf,
    pub target: DumpTarget,
    /// Enables checkpoints; required for `Db` targets and for `resume`.
    pub database_url: Option<String>,
    pub resume: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DumpReport {
    pub job: String,
    pub start_block: u64,
    pub end_block: u64,
    pub output: Option<PathBuf>,
    pub summary: ScanSummary,
}

pub fn job_name(range: &ScanRange) -> String {
    format!("tokens{}-{}", range.start(), range.end())
}

pub fn artifact_path(output_dir: &Path, range: &ScanRange) -> PathBuf {
    output_dir.join(format!("{}.out", job_name(range)))
}

/// Last block a scan over `range` fully processed, if any.
fn last_scanned(range: &ScanRange, summary: &ScanSummary) -> Option<u64> {
    summary
        .blocks_scanned
        .checked_sub(1)
        .map(|n| range.start() + n)
}

/// Records the last fully processed block of a dump so an interrupted run can
/// pick up where it stopped.
pub struct CheckpointObserver {
    db: Database,
    job: String,
    range: ScanRange,
    interval: u64,
    failed: bool,
}

impl CheckpointObserver {
    pub fn new(db: Database, job: String, range: ScanRange) -> Self {
        Self {
            db,
            job,
            range,
            interval: CHECKPOINT_INTERVAL,
            failed: false,
        }
    }

    pub fn with_interval(mut self, interval: u64) -> Self {
        self.interval = interval.max(1);
        self
    }
}

impl ScanObserver for CheckpointObserver {
    fn observe(&mut self, event: &ScanEvent<'_>) {
        let ScanEvent::BlockCompleted { block, progress } = event else {
            return;
        };
        if progress.scanned % self.interval != 0 && progress.scanned != progress.total {
            return;
        }
        let repo = CheckpointRepository::new(&self.db.conn);
        match repo.save(&self.job, &self.range, *block) {
            Ok(()) => self.failed = false,
            Err(e) if !self.failed => {
                warn!("Failed to save checkpoint for {}: {}", self.job, e);
                self.failed = true;
            }
            Err(_) => {}
        }
    }
}

/// Runs a long scan into a file or the database, with optional checkpoints.
pub async fn run_dump<R>(
    scanner: &Scanner<R>,
    range: ScanRange,
    options: &DumpOptions,
    cancel: &CancellationToken,
) -> Result<DumpReport>
where
    R: ChainReader + ?Sized,
{
    let job = job_name(&range);

    let effective = match (&options.database_url, options.resume) {
        (Some(url), true) => {
            let db = Database::new(url)?;
            match CheckpointRepository::new(&db.conn).get(&job)? {
                Some(checkpoint) => {
                    info!(
                        "Resuming {} after block {}",
                        job, checkpoint.last_block
                    );
                    range.resume_after(checkpoint.last_block)
                }
                None => Some(range),
            }
        }
        (None, true) => anyhow::bail!("Resuming a dump requires DATABASE_URL"),
        _ => Some(range),
    };

    let Some(effective) = effective else {
        info!("Dump {} already complete", job);
        return Ok(DumpReport {
            job,
            start_block: range.start(),
            end_block: range.end(),
            output: None,
            summary: ScanSummary::default(),
        });
    };

    let (mut sink, output): (Box<dyn TokenSink + Send>, Option<PathBuf>) = match options.target
    {
        DumpTarget::File => {
            std::fs::create_dir_all(&options.output_dir).with_context(|| {
                format!("Failed to create {}", options.output_dir.display())
            })?;
            let path = artifact_path(&options.output_dir, &effective);
            let sink = StreamingSink::create(&path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            info!("Writing tokens to {}", path.display());
            (Box::new(sink), Some(path))
        }
        DumpTarget::Db => {
            let url = options
                .database_url
                .as_deref()
                .context("Database dumps require DATABASE_URL")?;
            (Box::new(DatabaseSink::new(Database::new(url)?)), None)
        }
    };

    let checkpoints = match &options.database_url {
        Some(url) => Some(CheckpointObserver::new(
            Database::new(url)?,
            job.clone(),
            range,
        )),
        None => None,
    };
    let mut observer = (LogObserver, checkpoints);

    info!("Starting dump {} over blocks {}", job, effective);
    let summary = scanner
        .scan(effective, &mut sink, &mut observer, cancel)
        .await?;

    if summary.cancelled {
        warn!(
            "Dump {} cancelled after {} blocks ({} tokens)",
            job, summary.blocks_scanned, summary.tokens_found
        );
        // Blocks are only counted once fully processed, so this is exact
        let last = last_scanned(&effective, &summary);
        if let (Some(url), Some(last)) = (&options.database_url, last) {
            CheckpointRepository::new(&Database::new(url)?.conn).save(&job, &range, last)?;
            info!("Dump {} can be resumed after block {}", job, last);
        }
    } else {
        if let Some(url) = &options.database_url {
            CheckpointRepository::new(&Database::new(url)?.conn).clear(&job)?;
        }
        info!(
            "Dump {} finished: {} blocks, {} block errors, {} tokens",
            job, summary.blocks_scanned, summary.block_errors, summary.tokens_found
        );
    }

    Ok(DumpReport {
        job,
        start_block: effective.start(),
        end_block: effective.end(),
        output,
        summary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TokenInfo;
    use crate::repository::TokenRepository;
    use crate::scanner::DEFAULT_PROGRESS_INTERVAL;
    use crate::test_support::FakeChain;
    use alloy_primitives::Address;
    use std::sync::Arc;

    fn chain() -> FakeChain {
        FakeChain::new()
            .with_block(10, &[Address::repeat_byte(1)])
            .with_block(12, &[Address::repeat_byte(2)])
            .with_token(Address::repeat_byte(1), "One", "ONE", 18)
            .with_token(Address::repeat_byte(2), "Two", "TWO", 6)
    }

    fn options(dir: &Path, target: DumpTarget, resume: bool) -> DumpOptions {
        DumpOptions {
            output_dir: dir.join("output"),
            target,
            database_url: Some(dir.join("tokens.db").to_string_lossy().to_string()),
            resume,
        }
    }

    #[test]
    fn artifact_is_named_after_range() {
        let range = ScanRange::new(4080066, 4380066).unwrap();
        assert_eq!(job_name(&range), "tokens4080066-4380066");
        assert_eq!(
            artifact_path(Path::new("./output"), &range),
            PathBuf::from("./output/tokens4080066-4380066.out")
        );
    }

    #[tokio::test]
    async fn file_dump_writes_parseable_array() {
        let dir = tempfile::tempdir().unwrap();
        let scanner = Scanner::new(Arc::new(chain()), DEFAULT_PROGRESS_INTERVAL);
        let options = DumpOptions {
            database_url: None,
            ..options(dir.path(), DumpTarget::File, false)
        };

        let report = run_dump(
            &scanner,
            ScanRange::new(10, 12).unwrap(),
            &options,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        let path = report.output.unwrap();
        assert!(path.ends_with("tokens10-12.out"));
        let parsed: Vec<TokenInfo> =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(parsed.len() as u64, report.summary.tokens_found);
        assert_eq!(parsed[1].symbol, "TWO");
    }

    #[tokio::test]
    async fn db_dump_stores_tokens_and_clears_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let scanner = Scanner::new(Arc::new(chain()), DEFAULT_PROGRESS_INTERVAL);
        let options = options(dir.path(), DumpTarget::Db, false);

        let report = run_dump(
            &scanner,
            ScanRange::new(10, 12).unwrap(),
            &options,
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert!(report.output.is_none());

        let db = Database::new(options.database_url.as_deref().unwrap()).unwrap();
        assert_eq!(TokenRepository::new(&db.conn).count().unwrap(), 2);
        assert!(
            CheckpointRepository::new(&db.conn)
                .get("tokens10-12")
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn cancelled_dump_resumes_after_last_scanned_block() {
        let dir = tempfile::tempdir().unwrap();
        let cancel = CancellationToken::new();
        let chain = Arc::new(chain().with_cancel_on(11, cancel.clone()));
        let scanner = Scanner::new(Arc::clone(&chain), DEFAULT_PROGRESS_INTERVAL);
        let range = ScanRange::new(10, 12).unwrap();
        let options = options(dir.path(), DumpTarget::File, true);

        let first = run_dump(&scanner, range, &options, &cancel).await.unwrap();
        assert!(first.summary.cancelled);
        assert_eq!(first.summary.blocks_scanned, 2);

        let db = Database::new(options.database_url.as_deref().unwrap()).unwrap();
        let checkpoint = CheckpointRepository::new(&db.conn)
            .get("tokens10-12")
            .unwrap()
            .unwrap();
        assert_eq!(checkpoint.last_block, 11);

        let report = run_dump(&scanner, range, &options, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.start_block, 12);
        assert_eq!(report.summary.blocks_scanned, 1);
        assert_eq!(report.summary.tokens_found, 1);
        assert!(report.output.unwrap().ends_with("tokens12-12.out"));

        // The interrupted segment keeps its own, still valid, artifact
        let first_path = first.output.unwrap();
        let kept: Vec<TokenInfo> =
            serde_json::from_str(&std::fs::read_to_string(first_path).unwrap()).unwrap();
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].symbol, "ONE");
    }

    #[tokio::test]
    async fn cancellation_between_interval_checkpoints_is_not_lost() {
        let dir = tempfile::tempdir().unwrap();
        let cancel = CancellationToken::new();
        let mut chain = FakeChain::new().with_cancel_on(130, cancel.clone());
        for offset in 0..=200u8 {
            let address = Address::with_last_byte(offset);
            chain = chain
                .with_block(100 + u64::from(offset), &[address])
                .with_token(address, "Token", "TK", 18);
        }
        let scanner = Scanner::new(Arc::new(chain), DEFAULT_PROGRESS_INTERVAL);
        let range = ScanRange::new(100, 300).unwrap();
        let options = options(dir.path(), DumpTarget::File, true);

        let first = run_dump(&scanner, range, &options, &cancel).await.unwrap();
        assert_eq!(first.summary.blocks_scanned, 31);
        assert_eq!(first.summary.tokens_found, 31);

        let resumed = run_dump(&scanner, range, &options, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(resumed.start_block, 131);
        assert_eq!(resumed.summary.blocks_scanned, 170);
        assert_eq!(resumed.summary.tokens_found, 170);

        let first_tokens: Vec<TokenInfo> = serde_json::from_str(
            &std::fs::read_to_string(first.output.unwrap()).unwrap(),
        )
        .unwrap();
        assert_eq!(first_tokens.len(), 31);
    }

    #[tokio::test]
    async fn resume_of_finished_job_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let options = options(dir.path(), DumpTarget::File, true);
        let range = ScanRange::new(10, 12).unwrap();
        let db = Database::new(options.database_url.as_deref().unwrap()).unwrap();
        CheckpointRepository::new(&db.conn)
            .save(&job_name(&range), &range, 12)
            .unwrap();

        let chain = Arc::new(chain());
        let scanner = Scanner::new(Arc::clone(&chain), DEFAULT_PROGRESS_INTERVAL);
        let report = run_dump(&scanner, range, &options, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.summary, ScanSummary::default());
        assert!(chain.block_reads().is_empty());
    }

    #[tokio::test]
    async fn resume_without_database_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let scanner = Scanner::new(Arc::new(chain()), DEFAULT_PROGRESS_INTERVAL);
        let options = DumpOptions {
            database_url: None,
            ..options(dir.path(), DumpTarget::File, true)
        };

        let result = run_dump(
            &scanner,
            ScanRange::single(10),
            &options,
            &CancellationToken::new(),
        )
        .await;
        assert!(result.is_err());
    }
}
