//! Request identity (user agent) selection
//!
//! The fetcher asks an [`IdentityProvider`] for a user agent on every
//! request, so the choice is made per call rather than fixed on the client.

use rand::seq::SliceRandom;

/// Browser user agents used when no pool is configured
pub const DEFAULT_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/58.0.3029.110 Safari/537.3",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/14.0 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/44.0.2403.157 Safari/537.36",
    "Mozilla/5.0 (Windows NT 6.1; WOW64; rv:40.0) Gecko/20100101 Firefox/40.1",
    "Mozilla/5.0 (iPhone; CPU iPhone OS 10_3_1 like Mac OS X) AppleWebKit/603.1.30 (KHTML, like Gecko) Version/10.0 Mobile/14E304 Safari/602.1",
];

/// Supplies the user agent for a single request
pub trait IdentityProvider: Send + Sync {
    fn user_agent(&self) -> String;
}

/// Picks a user agent uniformly at random from a pool on every call
#[derive(Debug, Clone)]
pub struct RotatingUserAgents {
    pool: Vec<String>,
}

impl RotatingUserAgents {
    /// Creates a rotation over `pool`, falling back to the built-in pool when empty
    pub fn new(pool: Vec<String>) -> Self {
        if pool.is_empty() {
            return Self::default();
        }
        Self { pool }
    }
}

impl Default for RotatingUserAgents {
    fn default() -> Self {
        Self {
            pool: DEFAULT_USER_AGENTS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl IdentityProvider for RotatingUserAgents {
    fn user_agent(&self) -> String {
        // pool is never empty, see `new`
        self.pool
            .choose(&mut rand::thread_rng())
            .cloned()
            .unwrap_or_default()
    }
}

/// Always returns the same user agent
#[derive(Debug, Clone)]
pub struct FixedUserAgent(pub String);

impl IdentityProvider for FixedUserAgent {
    fn user_agent(&self) -> String {
        self.0.clone()
    }
}
