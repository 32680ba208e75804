//! Seed URL validation
//!
//! Seeds are checked before any crawling begins. A seed must be an absolute
//! URL with an http, https or ftp scheme whose host is a DNS name,
//! `localhost`, an IPv4 literal or an IPv6 literal. Port, path and query are
//! optional.

use crate::url::normalize::{normalize_parsed, SUPPORTED_SCHEMES};
use crate::UrlError;
use url::{Host, Url};

/// Validates a seed URL and returns its normalized form
///
/// # Examples
///
/// ```
/// use meta_trawl::url::validate_seed_url;
///
/// assert!(validate_seed_url("https://example.com/start").is_ok());
/// assert!(validate_seed_url("http://localhost:8080").is_ok());
/// assert!(validate_seed_url("example.com").is_err());
/// assert!(validate_seed_url("gopher://example.com").is_err());
/// ```
pub fn validate_seed_url(input: &str) -> Result<Url, UrlError> {
    let trimmed = input.trim();

    if trimmed.is_empty() || trimmed.chars().any(char::is_whitespace) {
        return Err(UrlError::Malformed(format!(
            "'{}' is empty or contains whitespace",
            input
        )));
    }

    let url = Url::parse(trimmed).map_err(|e| UrlError::Parse {
        url: input.to_string(),
        reason: e.to_string(),
    })?;

    if !SUPPORTED_SCHEMES.contains(&url.scheme()) {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    match url.host() {
        Some(Host::Domain(domain)) => validate_domain(domain)?,
        Some(Host::Ipv4(_)) | Some(Host::Ipv6(_)) => {}
        None => return Err(UrlError::MissingHost(input.to_string())),
    }

    normalize_parsed(url)
}

/// Validates a DNS host name
///
/// Accepts `localhost` or a dotted name whose labels are 1-63 characters of
/// ASCII alphanumerics and hyphens (not at either end) and whose final label
/// is at least two characters. A single trailing dot is allowed.
fn validate_domain(domain: &str) -> Result<(), UrlError> {
    if domain.eq_ignore_ascii_case("localhost") {
        return Ok(());
    }

    let domain = domain.strip_suffix('.').unwrap_or(domain);
    let labels: Vec<&str> = domain.split('.').collect();

    if labels.len() < 2 {
        return Err(UrlError::InvalidHost(format!(
            "'{}' must contain at least one dot",
            domain
        )));
    }

    for label in &labels {
        let valid = !label.is_empty()
            && label.len() <= 63
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
            && !label.starts_with('-')
            && !label.ends_with('-');

        if !valid {
            return Err(UrlError::InvalidHost(format!(
                "'{}' has an invalid label '{}'",
                domain, label
            )));
        }
    }

    let tld = labels[labels.len() - 1];
    if tld.len() < 2 {
        return Err(UrlError::InvalidHost(format!(
            "'{}' has a top-level label shorter than two characters",
            domain
        )));
    }

    Ok(())
}
