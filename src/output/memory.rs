//! In-memory sink

use crate::output::traits::{PageRecord, Sink, SinkError, SinkResult};
use std::sync::{Mutex, MutexGuard};

/// Collects records in memory, in arrival order
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<PageRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything written so far
    pub fn records(&self) -> SinkResult<Vec<PageRecord>> {
        Ok(self.lock()?.clone())
    }

    pub fn len(&self) -> SinkResult<usize> {
        Ok(self.lock()?.len())
    }

    pub fn is_empty(&self) -> SinkResult<bool> {
        Ok(self.lock()?.is_empty())
    }

    fn lock(&self) -> SinkResult<MutexGuard<'_, Vec<PageRecord>>> {
        self.records
            .lock()
            .map_err(|e| SinkError::Unavailable(format!("memory sink lock poisoned: {}", e)))
    }
}

impl Sink for MemorySink {
    fn write(&self, record: &PageRecord) -> SinkResult<()> {
        self.lock()?.push(record.clone());
        Ok(())
    }

    fn flush(&self) -> SinkResult<()> {
        Ok(())
    }
}
