//! Output module: where page records and run summaries go
//!
//! This module handles:
//! - The [`Sink`] trait every record destination implements
//! - CSV, SQLite and in-memory sinks
//! - The end-of-run [`CrawlSummary`] and its markdown report

mod csv_sink;
mod markdown;
mod memory;
mod sqlite_sink;
mod summary;
mod traits;

pub use csv_sink::{CsvSink, CSV_HEADER};
pub use markdown::{format_markdown_summary, generate_markdown_summary};
pub use memory::MemorySink;
pub use sqlite_sink::{initialize_schema, SqliteSink};
pub use summary::{print_summary, CrawlSummary};
pub use traits::{MultiSink, PageRecord, Sink, SinkError, SinkResult};
