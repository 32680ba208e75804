/// Page status definitions for completed fetch attempts
///
/// Every URL taken from the frontier ends in exactly one of these statuses.
use std::fmt;

/// Outcome of processing one frontier entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageStatus {
    /// Page was fetched and its metadata extracted
    Success,

    /// Page could not be fetched (network failure, timeout, non-2xx status)
    FetchError,

    /// Page was fetched but its content could not be extracted
    ParseError,
}

impl PageStatus {
    /// Returns true if this represents a successful completion
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Returns true if this represents a failure of either kind
    pub fn is_failure(&self) -> bool {
        !self.is_success()
    }

    /// Converts the status to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::FetchError => "fetch_error",
            Self::ParseError => "parse_error",
        }
    }

    /// Parses a status from its database string representation
    ///
    /// Returns None if the string doesn't match any known status.
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "success" => Some(Self::Success),
            "fetch_error" => Some(Self::FetchError),
            "parse_error" => Some(Self::ParseError),
            _ => None,
        }
    }

    /// Returns all possible page statuses
    pub fn all_statuses() -> [Self; 3] {
        [Self::Success, Self::FetchError, Self::ParseError]
    }
}

impl fmt::Display for PageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
