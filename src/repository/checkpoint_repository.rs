use crate::models::ScanRange;
use anyhow::Result;
use rusqlite::{OptionalExtension, params};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint {
    pub start_block: u64,
    pub end_block: u64,
    pub last_block: u64,
}

pub struct CheckpointRepository<'a> {
    conn: &'a rusqlite::Connection,
}

impl<'a> CheckpointRepository<'a> {
    const UPSERT_CHECKPOINT: &'static str =
        "INSERT INTO scan_checkpoints (job, start_block, end_block, last_block)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(job) DO UPDATE SET last_block = excluded.last_block";

    const GET_CHECKPOINT: &'static str =
        "SELECT start_block, end_block, last_block FROM scan_checkpoints WHERE job = ?1";

    const DELETE_CHECKPOINT: &'static str = "DELETE FROM scan_checkpoints WHERE job = ?1";

    pub fn new(conn: &'a rusqlite::Connection) -> Self {
        Self { conn }
    }

    pub fn get(&self, job: &str) -> Result<Option<Checkpoint>> {
        let checkpoint = self
            .conn
            .query_row(Self::GET_CHECKPOINT, params![job], |row| {
                Ok(Checkpoint {
                    start_block: row.get(0)?,
                    end_block: row.get(1)?,
                    last_block: row.get(2)?,
                })
            })
            .optional()?;
        Ok(checkpoint)
    }

    pub fn save(&self, job: &str, range: &ScanRange, last_block: u64) -> Result<()> {
        self.conn.execute(
            Self::UPSERT_CHECKPOINT,
            params![job, range.start(), range.end(), last_block],
        )?;
        Ok(())
    }

    pub fn clear(&self, job: &str) -> Result<()> {
        self.conn.execute(Self::DELETE_CHECKPOINT, params![job])?;
        Ok(())
    }
}
