//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building an HTTP client with bounded request and connect timeouts
//! - Applying a per-request user agent from an [`IdentityProvider`]
//! - Reading bodies up to a size cap
//! - Classifying failures into typed [`FetchError`]s
//!
//! The fetcher never retries; retry policy belongs to the engine.

use crate::config::CrawlConfig;
use crate::crawler::identity::IdentityProvider;
use reqwest::{header, redirect::Policy, Client};
use std::sync::Arc;
use thiserror::Error;
use url::Url;

/// Maximum number of redirect hops followed for one request
const MAX_REDIRECTS: usize = 10;

/// A successfully fetched response
#[derive(Debug, Clone)]
pub struct RawPage {
    /// The URL that was requested
    pub url: Url,

    /// Final URL after redirects
    pub final_url: Url,

    /// HTTP status code (always 2xx)
    pub status_code: u16,

    /// Content-Type header value, if present
    pub content_type: Option<String>,

    /// Response body, possibly truncated to the configured cap
    pub body: Vec<u8>,

    /// True when bytes past `max_body_bytes` were discarded
    pub truncated: bool,
}

/// Why a fetch failed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchCause {
    #[error("HTTP status {0}")]
    HttpStatus(u16),

    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("redirect error: {0}")]
    Redirect(String),

    #[error("failed to read body: {0}")]
    Body(String),

    #[error("network error: {0}")]
    Network(String),
}

impl FetchCause {
    /// Returns true for failures that may succeed on a later attempt
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout | Self::Connect(_) => true,
            Self::HttpStatus(code) => (500..600).contains(code),
            _ => false,
        }
    }
}

/// A failed fetch, carrying the URL it was for
#[derive(Debug, Clone, Error)]
#[error("fetch failed for {url}: {cause}")]
pub struct FetchError {
    pub url: Url,
    pub cause: FetchCause,
}

impl FetchError {
    pub fn new(url: &Url, cause: FetchCause) -> Self {
        Self {
            url: url.clone(),
            cause,
        }
    }

    /// HTTP status of the failure, if the server answered
    pub fn status_code(&self) -> Option<u16> {
        match self.cause {
            FetchCause::HttpStatus(code) => Some(code),
            _ => None,
        }
    }
}

/// Builds an HTTP client with the run's timeouts
///
/// No user agent is set here; it is applied per request.
///
/// # Example
///
/// ```no_run
/// use meta_trawl::config::CrawlConfig;
/// use meta_trawl::crawler::build_http_client;
///
/// let config = CrawlConfig::new(vec![]);
/// let client = build_http_client(&config).unwrap();
/// ```
pub fn build_http_client(config: &CrawlConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(config.request_timeout)
        .connect_timeout(config.connect_timeout)
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Issues one GET per URL with a fresh identity
pub struct HttpFetcher {
    client: Client,
    identity: Arc<dyn IdentityProvider>,
    max_body_bytes: usize,
}

impl HttpFetcher {
    /// Creates a fetcher from the run configuration
    pub fn new(
        config: &CrawlConfig,
        identity: Arc<dyn IdentityProvider>,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(config)?,
            identity,
            max_body_bytes: config.max_body_bytes,
        })
    }

    /// Fetches a URL
    ///
    /// # Failure mapping
    ///
    /// | Condition | Cause |
    /// |-----------|-------|
    /// | Non-2xx status | `HttpStatus(code)` |
    /// | Request or body timeout | `Timeout` |
    /// | Connection refused, DNS, TLS | `Connect` |
    /// | Redirect loop or > 10 hops | `Redirect` |
    /// | Body stream error | `Body` |
    /// | Anything else (e.g. unsupported scheme) | `Network` |
    pub async fn fetch(&self, url: &Url) -> Result<RawPage, FetchError> {
        let user_agent = self.identity.user_agent();
        tracing::trace!("GET {} as '{}'", url, user_agent);

        let mut response = self
            .client
            .get(url.clone())
            .header(header::USER_AGENT, user_agent)
            .send()
            .await
            .map_err(|e| FetchError::new(url, classify_error(&e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::new(url, FetchCause::HttpStatus(status.as_u16())));
        }

        let final_url = response.url().clone();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let mut body = Vec::new();
        let mut truncated = false;
        loop {
            match response.chunk().await {
                Ok(Some(chunk)) => {
                    let remaining = self.max_body_bytes.saturating_sub(body.len());
                    if chunk.len() > remaining {
                        body.extend_from_slice(&chunk[..remaining]);
                        truncated = true;
                        tracing::debug!(
                            "Truncated body of {} at {} bytes",
                            url,
                            self.max_body_bytes
                        );
                        break;
                    }
                    body.extend_from_slice(&chunk);
                }
                Ok(None) => break,
                Err(e) if e.is_timeout() => {
                    return Err(FetchError::new(url, FetchCause::Timeout));
                }
                Err(e) => {
                    return Err(FetchError::new(url, FetchCause::Body(e.to_string())));
                }
            }
        }

        Ok(RawPage {
            url: url.clone(),
            final_url,
            status_code: status.as_u16(),
            content_type,
            body,
            truncated,
        })
    }
}

/// Maps a reqwest send error to a fetch cause
fn classify_error(e: &reqwest::Error) -> FetchCause {
    if e.is_timeout() {
        FetchCause::Timeout
    } else if e.is_connect() {
        FetchCause::Connect(e.to_string())
    } else if e.is_redirect() {
        FetchCause::Redirect(e.to_string())
    } else if e.is_body() || e.is_decode() {
        FetchCause::Body(e.to_string())
    } else {
        FetchCause::Network(e.to_string())
    }
}
