use anyhow::{Context, Result};
use rusqlite::Connection;

pub struct Database {
    pub conn: Connection,
}

impl Database {
    pub fn new(db_path: &str) -> Result<Self> {
        let db_path = db_path.strip_prefix("sqlite:").unwrap_or(db_path);
        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open database {db_path}"))?;

        let db = Database { conn };
        db.create_tables()?;
        Ok(db)
    }

    pub fn in_memory() -> Result<Self> {
        let db = Database {
            conn: Connection::open_in_memory().context("Failed to open in-memory database")?,
        };
        db.create_tables()?;
        Ok(db)
    }

    fn create_tables(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS tokens (
                address TEXT PRIMARY KEY,
                symbol TEXT NOT NULL,
                decimals INTEGER NOT NULL,
                name TEXT NOT NULL,
                kind TEXT NOT NULL
            )",
            [],
        )?;

        // One row per dump job; last_block is the highest fully processed block
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS scan_checkpoints (
                job TEXT PRIMARY KEY,
                start_block INTEGER NOT NULL,
                end_block INTEGER NOT NULL,
                last_block INTEGER NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_tokens_symbol
             ON tokens(symbol)",
            [],
        )?;

        Ok(())
    }
}
