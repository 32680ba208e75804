//! CSV sink
//!
//! Writes one `Title,Description,Keywords,URL` row per record. Each row is
//! serialized into its own buffer first and appended with a single
//! `write_all` while the file lock is held, so concurrent writers can never
//! interleave partial rows. A failed append is cut back off the file.

use crate::output::traits::{PageRecord, Sink, SinkError, SinkResult};
use crate::state::PageStatus;
use std::fs::File;
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Column header, written once when the sink is created
pub const CSV_HEADER: [&str; 4] = ["Title", "Description", "Keywords", "URL"];

/// Appends page records to a CSV file
pub struct CsvSink {
    file: Mutex<File>,
    include_failures: bool,
}

impl CsvSink {
    /// Creates (or truncates) the file at `path` and writes the header
    ///
    /// When `include_failures` is false, FetchError records are skipped so
    /// the file only lists pages that answered.
    pub fn create(path: &Path, include_failures: bool) -> SinkResult<Self> {
        let mut file = File::create(path)?;
        file.write_all(&encode_row(&CSV_HEADER)?)?;
        tracing::debug!("Opened CSV sink at {}", path.display());

        Ok(Self {
            file: Mutex::new(file),
            include_failures,
        })
    }

    fn lock(&self) -> SinkResult<MutexGuard<'_, File>> {
        self.file
            .lock()
            .map_err(|e| SinkError::Unavailable(format!("CSV file lock poisoned: {}", e)))
    }
}

impl Sink for CsvSink {
    fn write(&self, record: &PageRecord) -> SinkResult<()> {
        if record.status == PageStatus::FetchError && !self.include_failures {
            return Ok(());
        }

        let row = encode_row(&[
            record.title.as_str(),
            record.description.as_str(),
            record.keywords.as_str(),
            record.url.as_str(),
        ])?;

        append_whole(&mut *self.lock()?, &row)
    }

    fn flush(&self) -> SinkResult<()> {
        let mut file = self.lock()?;
        file.flush()?;
        file.sync_data()?;
        Ok(())
    }
}

/// An output that can be cut back to an earlier length
trait Truncate: Write + Seek {
    fn truncate(&mut self, len: u64) -> std::io::Result<()>;
}

impl Truncate for File {
    fn truncate(&mut self, len: u64) -> std::io::Result<()> {
        self.set_len(len)
    }
}

/// Appends `row` in full, or restores the previous end of the output
///
/// If the partial row cannot be removed the sink is reported unavailable,
/// since later rows would follow a corrupt line.
fn append_whole<W: Truncate>(out: &mut W, row: &[u8]) -> SinkResult<()> {
    let start = out.seek(SeekFrom::End(0))?;

    let error = match out.write_all(row) {
        Ok(()) => return Ok(()),
        Err(e) => e,
    };

    let rollback = out
        .truncate(start)
        .and_then(|()| out.seek(SeekFrom::Start(start)).map(|_| ()));
    if let Err(e) = rollback {
        return Err(SinkError::Unavailable(format!(
            "failed to remove partial CSV row after '{}': {}",
            error, e
        )));
    }

    Err(SinkError::Io(error))
}

/// Serializes one row, with quoting and line terminator, into a fresh buffer
fn encode_row(fields: &[&str]) -> SinkResult<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(fields)?;
    writer
        .into_inner()
        .map_err(|e| SinkError::Io(std::io::Error::new(e.error().kind(), e.error().to_string())))
}
