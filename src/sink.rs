use crate::error::SinkError;
use crate::models::TokenInfo;
use crate::repository::{Database, TokenRepository};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Destination for resolved tokens. The scanner appends records one at a time
/// and calls `finalize` exactly once when the run ends, cancelled or not.
pub trait TokenSink {
    fn append(&mut self, token: &TokenInfo) -> Result<(), SinkError>;

    fn finalize(&mut self) -> Result<(), SinkError>;
}

impl<T: TokenSink + ?Sized> TokenSink for Box<T> {
    fn append(&mut self, token: &TokenInfo) -> Result<(), SinkError> {
        (**self).append(token)
    }

    fn finalize(&mut self) -> Result<(), SinkError> {
        (**self).finalize()
    }
}

/// Keeps every record in memory; for request/response sized scans.
#[derive(Debug, Default)]
pub struct CollectingSink {
    tokens: Vec<TokenInfo>,
    body: Option<String>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tokens(&self) -> &[TokenInfo] {
        &self.tokens
    }

    pub fn into_tokens(self) -> Vec<TokenInfo> {
        self.tokens
    }

    /// JSON array produced by `finalize`, if it ran.
    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }
}

impl TokenSink for CollectingSink {
    fn append(&mut self, token: &TokenInfo) -> Result<(), SinkError> {
        if self.body.is_some() {
            return Err(SinkError::Finalized);
        }
        self.tokens.push(token.clone());
        Ok(())
    }

    fn finalize(&mut self) -> Result<(), SinkError> {
        if self.body.is_none() {
            self.body = Some(serde_json::to_string(&self.tokens)?);
        }
        Ok(())
    }
}

/// Writes a JSON array incrementally, flushing after every record.
///
/// A killed process leaves every flushed record on disk but no closing
/// bracket; only `finalize` makes the output a complete array.
pub struct StreamingSink<W: Write> {
    writer: BufWriter<W>,
    written: u64,
    finalized: bool,
}

impl StreamingSink<File> {
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self, SinkError> {
        let file = File::create(path)?;
        Self::new(file)
    }
}

impl<W: Write> StreamingSink<W> {
    pub fn new(inner: W) -> Result<Self, SinkError> {
        let mut writer = BufWriter::new(inner);
        writer.write_all(b"[")?;
        writer.flush()?;
        Ok(Self {
            writer,
            written: 0,
            finalized: false,
        })
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn into_inner(self) -> Result<W, SinkError> {
        self.writer
            .into_inner()
            .map_err(|e| SinkError::Io(e.into_error()))
    }
}

impl<W: Write> TokenSink for StreamingSink<W> {
    fn append(&mut self, token: &TokenInfo) -> Result<(), SinkError> {
        if self.finalized {
            return Err(SinkError::Finalized);
        }
        // Encode first so a failed encode never leaves half a record behind.
        let record = serde_json::to_vec(token)?;
        let separator: &[u8] = if self.written == 0 { b"\n" } else { b",\n" };
        self.writer.write_all(separator)?;
        self.writer.write_all(&record)?;
        self.writer.flush()?;
        self.written += 1;
        Ok(())
    }

    fn finalize(&mut self) -> Result<(), SinkError> {
        if self.finalized {
            return Ok(());
        }
        let closing: &[u8] = if self.written == 0 { b"]" } else { b"\n]" };
        self.writer.write_all(closing)?;
        self.writer.flush()?;
        self.finalized = true;
        Ok(())
    }
}

/// Inserts every record into the `tokens` table as soon as it is appended.
pub struct DatabaseSink {
    db: Database,
    inserted: u64,
}

impl DatabaseSink {
    pub fn new(db: Database) -> Self {
        Self { db, inserted: 0 }
    }

    /// Rows actually added; addresses already stored by an earlier run are not counted.
    pub fn inserted(&self) -> u64 {
        self.inserted
    }

    pub fn into_database(self) -> Database {
        self.db
    }
}

impl TokenSink for DatabaseSink {
    fn append(&mut self, token: &TokenInfo) -> Result<(), SinkError> {
        if TokenRepository::new(&self.db.conn).insert(token)? {
            self.inserted += 1;
        }
        Ok(())
    }

    fn finalize(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}
