//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `PageStatus`: Outcome of a single page fetch (success, fetch error, parse error)
//! - `RunState`: Lifecycle of a whole crawl run (idle, running, draining, done, ...)

mod page_status;
mod run_state;

// Re-export main types
pub use page_status::PageStatus;
pub use run_state::RunState;
