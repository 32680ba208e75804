//! URL handling module for Meta-Trawl
//!
//! This module provides URL normalization (the identity used for
//! deduplication) and seed URL validation.

mod normalize;
mod validate;

// Re-export main functions
pub use normalize::{normalize_parsed, normalize_url, SUPPORTED_SCHEMES};
pub use validate::validate_seed_url;
