//! Sink trait and the record type it receives
//!
//! Every page the engine attempts ends up as exactly one [`PageRecord`]
//! handed to a [`Sink`]. Sinks are shared between workers, so each
//! implementation must make a single `write` one atomic unit.

use crate::crawler::{ExtractedPage, FetchError, FrontierEntry, ParseError};
use crate::state::PageStatus;
use chrono::{DateTime, Utc};
use thiserror::Error;
use url::Url;

/// Errors that can occur while writing records
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// The sink panicked while writing
    #[error("Sink panicked: {0}")]
    Panicked(String),

    /// The sink can no longer accept writes at all
    #[error("Sink unavailable: {0}")]
    Unavailable(String),
}

/// Result type for sink operations
pub type SinkResult<T> = Result<T, SinkError>;

/// The outcome of crawling one URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRecord {
    /// Normalized URL that was requested
    pub url: Url,

    pub depth: u32,

    /// Page the link was found on; None for seeds
    pub source: Option<Url>,

    pub title: String,
    pub description: String,
    pub keywords: String,

    pub fetched_at: DateTime<Utc>,

    pub status: PageStatus,

    /// HTTP status, when the server answered
    pub http_status: Option<u16>,

    /// Failure description for non-success records
    pub error: Option<String>,
}

impl PageRecord {
    fn blank(entry: &FrontierEntry, status: PageStatus) -> Self {
        Self {
            url: entry.url.clone(),
            depth: entry.depth,
            source: entry.source.clone(),
            title: String::new(),
            description: String::new(),
            keywords: String::new(),
            fetched_at: Utc::now(),
            status,
            http_status: None,
            error: None,
        }
    }

    /// Record for a page that was fetched and extracted
    pub fn success(entry: &FrontierEntry, http_status: u16, page: &ExtractedPage) -> Self {
        Self {
            title: page.title.clone(),
            description: page.description.clone(),
            keywords: page.keywords.clone(),
            http_status: Some(http_status),
            ..Self::blank(entry, PageStatus::Success)
        }
    }

    /// Minimal record for a page that could not be fetched
    pub fn fetch_failed(entry: &FrontierEntry, error: &FetchError) -> Self {
        Self {
            http_status: error.status_code(),
            error: Some(error.cause.to_string()),
            ..Self::blank(entry, PageStatus::FetchError)
        }
    }

    /// Minimal record for a page whose body could not be extracted
    pub fn parse_failed(entry: &FrontierEntry, http_status: u16, error: &ParseError) -> Self {
        Self {
            http_status: Some(http_status),
            error: Some(error.to_string()),
            ..Self::blank(entry, PageStatus::ParseError)
        }
    }

    /// Record standing in for a worker that failed mid-entry
    pub fn worker_fault(entry: &FrontierEntry, message: &str) -> Self {
        Self {
            error: Some(format!("worker fault: {}", message)),
            ..Self::blank(entry, PageStatus::FetchError)
        }
    }
}

/// Destination for page records
///
/// Implementations are shared by all workers and must be thread-safe.
pub trait Sink: Send + Sync {
    /// Appends one record
    ///
    /// A record is either written completely or not at all.
    fn write(&self, record: &PageRecord) -> SinkResult<()>;

    /// Pushes buffered data to durable storage
    fn flush(&self) -> SinkResult<()>;

    /// Number of independent destinations behind this sink
    fn destinations(&self) -> usize {
        1
    }

    /// Appends one record to a single destination
    ///
    /// Retries go through here so a destination that already holds the
    /// record is not written twice.
    fn write_to(&self, destination: usize, record: &PageRecord) -> SinkResult<()> {
        match destination {
            0 => self.write(record),
            _ => Err(no_destination(destination)),
        }
    }
}

fn no_destination(destination: usize) -> SinkError {
    SinkError::Unavailable(format!("no sink destination {}", destination))
}

impl<S: Sink + ?Sized> Sink for std::sync::Arc<S> {
    fn write(&self, record: &PageRecord) -> SinkResult<()> {
        (**self).write(record)
    }

    fn destinations(&self) -> usize {
        (**self).destinations()
    }

    fn write_to(&self, destination: usize, record: &PageRecord) -> SinkResult<()> {
        (**self).write_to(destination, record)
    }

    fn flush(&self) -> SinkResult<()> {
        (**self).flush()
    }
}

/// Fans every record out to several sinks
///
/// `write` attempts every inner sink and returns the first error. Each inner
/// sink is a separate destination, so callers can retry only the ones that
/// failed through [`Sink::write_to`].
pub struct MultiSink {
    sinks: Vec<Box<dyn Sink>>,
}

impl MultiSink {
    pub fn new(sinks: Vec<Box<dyn Sink>>) -> Self {
        Self { sinks }
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl Sink for MultiSink {
    fn write(&self, record: &PageRecord) -> SinkResult<()> {
        let mut first_error = None;
        for sink in &self.sinks {
            if let Err(e) = sink.write(record) {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn flush(&self) -> SinkResult<()> {
        let mut first_error = None;
        for sink in &self.sinks {
            if let Err(e) = sink.flush() {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn destinations(&self) -> usize {
        self.sinks.len()
    }

    fn write_to(&self, destination: usize, record: &PageRecord) -> SinkResult<()> {
        match self.sinks.get(destination) {
            Some(sink) => sink.write(record),
            None => Err(no_destination(destination)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::FetchCause;
    use crate::output::MemorySink;

    fn entry() -> FrontierEntry {
        FrontierEntry::seed(Url::parse("https://example.com/").unwrap())
    }

    #[test]
    fn test_success_record_copies_metadata() {
        let page = ExtractedPage {
            title: "Home".to_string(),
            description: "Welcome".to_string(),
            keywords: "a,b".to_string(),
            links: vec![],
        };
        let record = PageRecord::success(&entry(), 200, &page);

        assert_eq!(record.status, PageStatus::Success);
        assert_eq!(record.title, "Home");
        assert_eq!(record.description, "Welcome");
        assert_eq!(record.keywords, "a,b");
        assert_eq!(record.http_status, Some(200));
        assert!(record.error.is_none());
    }

    #[test]
    fn test_fetch_failed_record_is_minimal() {
        let entry = entry();
        let error = FetchError::new(&entry.url, FetchCause::HttpStatus(500));
        let record = PageRecord::fetch_failed(&entry, &error);

        assert_eq!(record.status, PageStatus::FetchError);
        assert_eq!(record.title, "");
        assert_eq!(record.http_status, Some(500));
        assert_eq!(record.error.as_deref(), Some("HTTP status 500"));
    }

    #[test]
    fn test_parse_failed_record() {
        let record = PageRecord::parse_failed(&entry(), 200, &ParseError::Binary);
        assert_eq!(record.status, PageStatus::ParseError);
        assert_eq!(record.http_status, Some(200));
        assert!(record.error.is_some());
    }

    #[test]
    fn test_worker_fault_record() {
        let record = PageRecord::worker_fault(&entry(), "boom");
        assert_eq!(record.status, PageStatus::FetchError);
        assert_eq!(record.error.as_deref(), Some("worker fault: boom"));
    }

    #[test]
    fn test_multi_sink_fans_out() {
        let first = std::sync::Arc::new(MemorySink::new());
        let second = std::sync::Arc::new(MemorySink::new());
        let multi = MultiSink::new(vec![
            Box::new(std::sync::Arc::clone(&first)),
            Box::new(std::sync::Arc::clone(&second)),
        ]);

        let record = PageRecord::worker_fault(&entry(), "x");
        multi.write(&record).unwrap();
        multi.flush().unwrap();

        assert_eq!(multi.len(), 2);
        assert_eq!(first.records().unwrap(), vec![record.clone()]);
        assert_eq!(second.records().unwrap(), vec![record]);
    }

    #[test]
    fn test_multi_sink_writes_single_destination() {
        let first = std::sync::Arc::new(MemorySink::new());
        let second = std::sync::Arc::new(MemorySink::new());
        let multi = MultiSink::new(vec![
            Box::new(std::sync::Arc::clone(&first)),
            Box::new(std::sync::Arc::clone(&second)),
        ]);

        let record = PageRecord::worker_fault(&entry(), "x");
        assert_eq!(multi.destinations(), 2);
        multi.write_to(1, &record).unwrap();

        assert!(first.is_empty().unwrap());
        assert_eq!(second.records().unwrap(), vec![record.clone()]);
        assert!(matches!(
            multi.write_to(2, &record),
            Err(SinkError::Unavailable(_))
        ));
    }

    #[test]
    fn test_single_sink_has_one_destination() {
        let sink = MemorySink::new();
        let record = PageRecord::worker_fault(&entry(), "x");

        assert_eq!(sink.destinations(), 1);
        sink.write_to(0, &record).unwrap();
        assert_eq!(sink.len().unwrap(), 1);
        assert!(sink.write_to(1, &record).is_err());
    }
}
