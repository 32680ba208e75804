//! HTML metadata and link extraction
//!
//! This module parses fetched HTML to extract:
//! - Page title (from the first <title> tag)
//! - The first `description` and `keywords` meta tags
//! - Outbound links from <a href> tags, resolved to absolute URLs
//!
//! Malformed HTML never fails extraction; html5ever recovers and missing
//! pieces come back as empty strings.

use crate::crawler::fetcher::RawPage;
use scraper::{Html, Selector};
use std::collections::HashSet;
use thiserror::Error;
use url::Url;

/// Number of leading bytes inspected when sniffing for binary content
const SNIFF_LEN: usize = 1024;

/// Why a fetched page could not be extracted
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("content type '{0}' is not HTML")]
    NotHtml(String),

    #[error("body looks like binary data")]
    Binary,
}

/// Extracted information from an HTML page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedPage {
    /// Trimmed <title> text, empty if absent
    pub title: String,

    /// Trimmed content of `<meta name="description">`, empty if absent
    pub description: String,

    /// Trimmed content of `<meta name="keywords">`, empty if absent
    pub keywords: String,

    /// Absolute http(s) links in document order, without duplicates
    pub links: Vec<Url>,
}

/// Extracts metadata and links from a fetched response
///
/// Rejects responses whose declared content type is not HTML before
/// parsing. Links are resolved against the final URL after redirects.
pub fn extract_page(raw: &RawPage) -> Result<ExtractedPage, ParseError> {
    if let Some(content_type) = raw.content_type.as_deref() {
        if !is_html_content_type(content_type) {
            return Err(ParseError::NotHtml(content_type.to_string()));
        }
    }

    extract(&raw.final_url, &raw.body)
}

/// Parses raw HTML bytes and extracts metadata and links
///
/// # Link Extraction Rules
///
/// **Include:**
/// - `<a href="...">` tags anywhere in the document
///
/// **Exclude:**
/// - `<a href="..." download>`
/// - `javascript:`, `mailto:`, `tel:` and `data:` links
/// - Fragment-only links (same page anchors)
/// - Non-HTTP(S) URLs after resolution
///
/// # Example
///
/// ```
/// use meta_trawl::crawler::extract;
/// use url::Url;
///
/// let html = br#"<html><head><title> Test </title>
///   <meta name="Description" content="A page"></head>
///   <body><a href="/page">Link</a></body></html>"#;
/// let base = Url::parse("https://example.com/dir/").unwrap();
/// let page = extract(&base, html).unwrap();
/// assert_eq!(page.title, "Test");
/// assert_eq!(page.description, "A page");
/// assert_eq!(page.links[0].as_str(), "https://example.com/page");
/// ```
pub fn extract(base_url: &Url, raw: &[u8]) -> Result<ExtractedPage, ParseError> {
    if looks_binary(raw) {
        return Err(ParseError::Binary);
    }

    let html = String::from_utf8_lossy(raw);
    let document = Html::parse_document(&html);

    Ok(ExtractedPage {
        title: extract_title(&document),
        description: extract_meta(&document, "description"),
        keywords: extract_meta(&document, "keywords"),
        links: extract_links(&document, base_url),
    })
}

/// Extracts the page title from the HTML document
fn extract_title(document: &Html) -> String {
    let Ok(title_selector) = Selector::parse("title") else {
        return String::new();
    };

    document
        .select(&title_selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .unwrap_or_default()
}

/// Returns the content of the first `<meta>` whose name matches case-insensitively
fn extract_meta(document: &Html, name: &str) -> String {
    let Ok(meta_selector) = Selector::parse("meta[name]") else {
        return String::new();
    };

    document
        .select(&meta_selector)
        .find(|element| {
            element
                .value()
                .attr("name")
                .is_some_and(|n| n.trim().eq_ignore_ascii_case(name))
        })
        .and_then(|element| element.value().attr("content"))
        .map(|content| content.trim().to_string())
        .unwrap_or_default()
}

/// Extracts all followable links from the HTML document
fn extract_links(document: &Html, base_url: &Url) -> Vec<Url> {
    let mut links = Vec::new();
    let mut seen = HashSet::new();

    let Ok(a_selector) = Selector::parse("a[href]") else {
        return links;
    };

    for element in document.select(&a_selector) {
        if element.value().attr("download").is_some() {
            continue;
        }

        if let Some(absolute_url) = element
            .value()
            .attr("href")
            .and_then(|href| resolve_link(href, base_url))
        {
            if seen.insert(absolute_url.as_str().to_string()) {
                links.push(absolute_url);
            }
        }
    }

    links
}

/// Resolves a link href to an absolute URL and validates it
///
/// Returns None if the link should be excluded.
fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lowered = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lowered.starts_with(scheme))
    {
        return None;
    }

    let absolute_url = base_url.join(href).ok()?;
    match absolute_url.scheme() {
        "http" | "https" => Some(absolute_url),
        _ => None,
    }
}

/// Returns true for HTML-ish content types
fn is_html_content_type(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();

    mime.is_empty()
        || mime == "text/html"
        || mime == "application/xhtml+xml"
        || mime == "text/plain"
}

/// Sniffs for NUL bytes, which do not occur in text documents
fn looks_binary(raw: &[u8]) -> bool {
    raw.iter().take(SNIFF_LEN).any(|&b| b == 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_url() -> Url {
        Url::parse("https://example.com/dir/page").unwrap()
    }

    fn parse(html: &str) -> ExtractedPage {
        extract(&base_url(), html.as_bytes()).unwrap()
    }

    fn raw_page(content_type: Option<&str>, body: &[u8]) -> RawPage {
        RawPage {
            url: base_url(),
            final_url: base_url(),
            status_code: 200,
            content_type: content_type.map(|s| s.to_string()),
            body: body.to_vec(),
            truncated: false,
        }
    }

    #[test]
    fn test_extract_title_with_whitespace() {
        let parsed = parse("<html><head><title>\n  Test Page  </title></head></html>");
        assert_eq!(parsed.title, "Test Page");
    }

    #[test]
    fn test_no_title_is_empty() {
        let parsed = parse("<html><head></head><body></body></html>");
        assert_eq!(parsed.title, "");
    }

    #[test]
    fn test_first_title_wins() {
        let parsed = parse("<title>One</title><title>Two</title>");
        assert_eq!(parsed.title, "One");
    }

    #[test]
    fn test_meta_name_case_insensitive() {
        let parsed = parse(
            r#"<head><meta name="DESCRIPTION" content=" About us ">
               <meta name="Keywords" content="a, b, c"></head>"#,
        );
        assert_eq!(parsed.description, "About us");
        assert_eq!(parsed.keywords, "a, b, c");
    }

    #[test]
    fn test_first_meta_wins() {
        let parsed = parse(
            r#"<meta name="description" content="first">
               <meta name="description" content="second">"#,
        );
        assert_eq!(parsed.description, "first");
    }

    #[test]
    fn test_meta_without_content_is_empty() {
        let parsed = parse(r#"<meta name="description"><meta property="og:description" content="x">"#);
        assert_eq!(parsed.description, "");
    }

    #[test]
    fn test_relative_links_resolve_against_page() {
        let parsed = parse(
            r#"<a href="other">Sibling</a><a href="/root">Root</a><a href="../up">Up</a>"#,
        );
        let links: Vec<&str> = parsed.links.iter().map(|u| u.as_str()).collect();
        assert_eq!(
            links,
            vec![
                "https://example.com/dir/other",
                "https://example.com/root",
                "https://example.com/up",
            ]
        );
    }

    #[test]
    fn test_absolute_and_protocol_relative_links() {
        let parsed = parse(
            r#"<a href="http://other.com/x">A</a><a href="//cdn.example.net/y">B</a>"#,
        );
        assert_eq!(parsed.links[0].as_str(), "http://other.com/x");
        assert_eq!(parsed.links[1].as_str(), "https://cdn.example.net/y");
    }

    #[test]
    fn test_skips_special_links() {
        let parsed = parse(
            r##"<a href="javascript:void(0)">J</a>
               <a href="MAILTO:test@example.com">M</a>
               <a href="tel:+1234567890">T</a>
               <a href="data:text/html,hi">D</a>
               <a href="#section">F</a>
               <a href="">E</a>
               <a href="ftp://files.example.com/a">FTP</a>
               <a href="/file.pdf" download>DL</a>"##,
        );
        assert!(parsed.links.is_empty(), "got {:?}", parsed.links);
    }

    #[test]
    fn test_duplicate_links_collapsed() {
        let parsed = parse(r#"<a href="/a">1</a><a href="/a">2</a><a href="/b">3</a>"#);
        assert_eq!(parsed.links.len(), 2);
    }

    #[test]
    fn test_malformed_html_degrades() {
        let parsed = parse("<html><head><title>Broken<body><a href='/x'>x<div></span></p>");
        assert!(parsed.title.starts_with("Broken"));
        assert_eq!(parsed.description, "");
        assert_eq!(parsed.keywords, "");
    }

    #[test]
    fn test_invalid_utf8_is_lossy() {
        let mut body = b"<title>Caf".to_vec();
        body.push(0xE9);
        body.extend_from_slice(b"</title>");
        let parsed = extract(&base_url(), &body).unwrap();
        assert!(parsed.title.starts_with("Caf"));
    }

    #[test]
    fn test_binary_body_rejected() {
        let body = [0x25, 0x50, 0x44, 0x46, 0x00, 0x01];
        assert_eq!(extract(&base_url(), &body), Err(ParseError::Binary));
    }

    #[test]
    fn test_extract_page_rejects_non_html() {
        let raw = raw_page(Some("application/pdf"), b"%PDF-1.4");
        assert_eq!(
            extract_page(&raw),
            Err(ParseError::NotHtml("application/pdf".to_string()))
        );
    }

    #[test]
    fn test_extract_page_accepts_html_variants() {
        for content_type in [
            Some("text/html"),
            Some("Text/HTML; charset=UTF-8"),
            Some("application/xhtml+xml"),
            None,
        ] {
            let raw = raw_page(content_type, b"<title>ok</title>");
            assert_eq!(extract_page(&raw).unwrap().title, "ok");
        }
    }
}
