//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and test
//! the full crawl cycle end-to-end.

use meta_trawl::config::{parse_config, CrawlConfig};
use meta_trawl::crawler::{crawl, Engine, FixedUserAgent};
use meta_trawl::output::{CsvSink, MemorySink, MultiSink, PageRecord, Sink, SqliteSink};
use meta_trawl::state::{PageStatus, RunState};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn html(body: impl Into<String>) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_string(body.into())
        .insert_header("content-type", "text/html; charset=utf-8")
}

/// Creates a test configuration rooted at the given seeds
fn create_test_config(seeds: &[String], max_depth: u32, workers: usize) -> CrawlConfig {
    let config = parse_config(&format!(
        r#"
        [crawler]
        max-depth = {}
        worker-count = {}
        request-timeout-ms = 2000
        pop-timeout-ms = 10
        "#,
        max_depth, workers
    ))
    .expect("test config should parse");

    CrawlConfig::from_config(&config, seeds).expect("seeds should be valid")
}

async fn run_crawl(config: CrawlConfig) -> (meta_trawl::CrawlSummary, Vec<PageRecord>) {
    let sink = Arc::new(MemorySink::new());
    let mut engine = Engine::with_identity(
        config,
        sink.clone(),
        Arc::new(FixedUserAgent("TestBot/1.0".to_string())),
    )
    .expect("engine should build");

    let summary = engine.run().await.expect("run should start");
    (summary, sink.records().unwrap())
}

#[tokio::test]
async fn test_seed_with_two_links_and_self_link() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(format!(
            r#"<html><head><title>Home</title>
               <meta name="description" content="The home page">
               <meta name="keywords" content="home, start"></head><body>
               <a href="{}/page1">Page 1</a>
               <a href="/page2">Page 2</a>
               <a href="/">Home again</a>
               </body></html>"#,
            base_url
        )))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/page1"))
        .respond_with(html(r#"<title>Page 1</title><a href="/deeper">Deeper</a>"#))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/page2"))
        .respond_with(html("<title>Page 2</title>"))
        .expect(1)
        .mount(&mock_server)
        .await;

    // Beyond max depth, must never be requested
    Mock::given(method("GET"))
        .and(path("/deeper"))
        .respond_with(html("<title>Too deep</title>"))
        .expect(0)
        .mount(&mock_server)
        .await;

    let config = create_test_config(&[format!("{}/", base_url)], 1, 4);
    let (summary, records) = run_crawl(config).await;

    assert_eq!(summary.status, RunState::Done);
    assert_eq!(summary.visited, 3);
    assert_eq!(summary.succeeded, 3);
    assert_eq!(summary.failed(), 0);
    assert_eq!(summary.duplicates, 1);
    assert_eq!(summary.depth_rejected, 1);
    assert_eq!(records.len(), 3);

    let home = records.iter().find(|r| r.url.path() == "/").unwrap();
    assert_eq!(home.title, "Home");
    assert_eq!(home.description, "The home page");
    assert_eq!(home.keywords, "home, start");
    assert_eq!(home.depth, 0);
    assert!(home.source.is_none());

    let page1 = records.iter().find(|r| r.url.path() == "/page1").unwrap();
    assert_eq!(page1.depth, 1);
    assert_eq!(page1.source.as_ref().unwrap().path(), "/");
}

#[tokio::test]
async fn test_failing_seed_produces_one_failure_record() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500).set_body_string(r#"<a href="/x">x</a>"#))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = create_test_config(&[format!("{}/", mock_server.uri())], 2, 2);
    let (summary, records) = run_crawl(config).await;

    assert_eq!(summary.status, RunState::Done);
    assert_eq!(summary.visited, 1);
    assert_eq!(summary.failed(), 1);
    assert_eq!(summary.fetch_failures, 1);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, PageStatus::FetchError);
    assert_eq!(records[0].http_status, Some(500));
    assert_eq!(records[0].title, "");
}

#[tokio::test]
async fn test_shared_link_fetched_once() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(html(r#"<title>A</title><a href="/shared">S</a>"#))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/b"))
        .respond_with(html(r#"<title>B</title><a href="/shared?utm_source=b">S</a>"#))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/shared"))
        .respond_with(html("<title>Shared</title>"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let seeds = vec![
        format!("{}/a", mock_server.uri()),
        format!("{}/b", mock_server.uri()),
    ];
    let (summary, records) = run_crawl(create_test_config(&seeds, 2, 4)).await;

    assert_eq!(summary.visited, 3);
    assert_eq!(summary.duplicates, 1);
    let shared: Vec<_> = records.iter().filter(|r| r.url.path() == "/shared").collect();
    assert_eq!(shared.len(), 1);
}

#[tokio::test]
async fn test_no_url_recorded_twice_in_dense_graph() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    // Every page links to every other page
    for i in 0..12 {
        let links: String = (0..12)
            .map(|j| format!(r#"<a href="{}/p{}">{}</a>"#, base_url, j, j))
            .collect();
        Mock::given(method("GET"))
            .and(path(format!("/p{}", i)))
            .respond_with(html(format!("<title>P{}</title>{}", i, links)))
            .expect(1)
            .mount(&mock_server)
            .await;
    }

    let config = create_test_config(&[format!("{}/p0", base_url)], 3, 8);
    let (summary, records) = run_crawl(config).await;

    assert_eq!(summary.status, RunState::Done);
    assert_eq!(records.len(), 12);
    let unique: HashSet<&str> = records.iter().map(|r| r.url.as_str()).collect();
    assert_eq!(unique.len(), 12);
    assert!(records.iter().all(|r| r.depth <= 3));
}

#[tokio::test]
async fn test_depth_bound_respected() {
    let mock_server = MockServer::start().await;

    // A chain /0 -> /1 -> /2 -> ...
    for i in 0..6 {
        Mock::given(method("GET"))
            .and(path(format!("/{}", i)))
            .respond_with(html(format!(r#"<a href="/{}">next</a>"#, i + 1)))
            .mount(&mock_server)
            .await;
    }

    let config = create_test_config(&[format!("{}/0", mock_server.uri())], 2, 2);
    let (summary, records) = run_crawl(config).await;

    assert_eq!(summary.visited, 3);
    assert_eq!(summary.depth_rejected, 1);
    let max_depth = records.iter().map(|r| r.depth).max().unwrap();
    assert_eq!(max_depth, 2);
}

#[tokio::test]
async fn test_unlimited_depth_terminates_on_finite_graph() {
    let mock_server = MockServer::start().await;

    for i in 0..5 {
        Mock::given(method("GET"))
            .and(path(format!("/{}", i)))
            .respond_with(html(format!(r#"<a href="/{}">n</a><a href="/0">back</a>"#, (i + 1) % 5)))
            .mount(&mock_server)
            .await;
    }

    let mut config = create_test_config(&[format!("{}/0", mock_server.uri())], 0, 3);
    config.depth_limit_enabled = false;
    let (summary, records) = run_crawl(config).await;

    assert_eq!(summary.status, RunState::Done);
    assert_eq!(records.len(), 5);
    assert_eq!(summary.depth_rejected, 0);
}

#[tokio::test]
async fn test_non_html_page_is_parse_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(r#"<a href="/report.pdf">Report</a>"#))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/report.pdf"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(b"%PDF-1.4\x00\x01".to_vec())
                .insert_header("content-type", "application/pdf"),
        )
        .mount(&mock_server)
        .await;

    let config = create_test_config(&[format!("{}/", mock_server.uri())], 2, 2);
    let (summary, records) = run_crawl(config).await;

    assert_eq!(summary.visited, 2);
    assert_eq!(summary.parse_failures, 1);
    let pdf = records.iter().find(|r| r.url.path() == "/report.pdf").unwrap();
    assert_eq!(pdf.status, PageStatus::ParseError);
    assert_eq!(pdf.http_status, Some(200));
}

#[tokio::test]
async fn test_links_resolve_against_redirect_target() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/start"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/docs/index"))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/docs/index"))
        .respond_with(html(r#"<title>Docs</title><a href="intro">Intro</a>"#))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/docs/intro"))
        .respond_with(html("<title>Intro</title>"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = create_test_config(&[format!("{}/start", mock_server.uri())], 1, 2);
    let (_, records) = run_crawl(config).await;

    let start = records.iter().find(|r| r.url.path() == "/start").unwrap();
    assert_eq!(start.title, "Docs");
    assert!(records.iter().any(|r| r.url.path() == "/docs/intro"));
}

#[tokio::test]
async fn test_cancellation_keeps_partial_results() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    let links: String = (0..20).map(|i| format!(r#"<a href="/slow{}">s</a>"#, i)).collect();
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(links))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .respond_with(html("<title>slow</title>").set_delay(Duration::from_millis(300)))
        .mount(&mock_server)
        .await;

    let config = create_test_config(&[format!("{}/", base_url)], 1, 2);
    let sink = Arc::new(MemorySink::new());
    let mut engine = Engine::new(config, sink.clone()).unwrap();
    let token = engine.cancel_token();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(150)).await;
        token.cancel();
    });

    let summary = tokio::time::timeout(Duration::from_secs(5), engine.run())
        .await
        .expect("cancelled run should stop promptly")
        .unwrap();

    assert_eq!(summary.status, RunState::Cancelled);
    assert_eq!(summary.status.exit_code(), 130);
    assert!(summary.skipped > 0);

    let records = sink.records().unwrap();
    assert_eq!(records.len() as u64, summary.visited);
    assert_eq!(summary.visited + summary.skipped, 21);
}

#[tokio::test]
async fn test_crawl_to_csv_and_sqlite() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(r#"<title>Root, "quoted"</title><a href="/gone">gone</a>"#))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let temp_dir = tempfile::TempDir::new().unwrap();
    let csv_path = temp_dir.path().join("crawled_data.csv");
    let db_path = temp_dir.path().join("crawl.db");

    let csv = CsvSink::create(&csv_path, false).unwrap();
    let db = Arc::new(SqliteSink::open(&db_path, "test-hash").unwrap());
    let sinks: Vec<Box<dyn Sink>> = vec![Box::new(csv), Box::new(Arc::clone(&db))];

    let config = create_test_config(&[format!("{}/", mock_server.uri())], 1, 2);
    let summary = crawl(config, Arc::new(MultiSink::new(sinks))).await.unwrap();

    assert_eq!(summary.visited, 2);
    assert_eq!(summary.fetch_failures, 1);

    // CSV holds the header and the successful page only
    let mut reader = csv::Reader::from_path(&csv_path).unwrap();
    let headers = reader.headers().unwrap().clone();
    assert_eq!(
        headers.iter().collect::<Vec<_>>(),
        vec!["Title", "Description", "Keywords", "URL"]
    );
    let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
    assert_eq!(rows.len(), 1);
    assert_eq!(&rows[0][0], r#"Root, "quoted""#);
    assert_eq!(Url::parse(&rows[0][3]).unwrap().path(), "/");

    // SQLite holds both
    assert_eq!(db.page_count().unwrap(), 2);
}
