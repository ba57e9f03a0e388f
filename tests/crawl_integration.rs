//! End-to-end orchestrator scenarios driven against a `mockito` server
//! standing in for the crawled site, exercising the same properties the
//! unit tests check in isolation but wired through the full `crawl()` loop.

use std::time::{Duration, Instant};

use civic_crawler::downloader::FileDownloader;
use civic_crawler::frontier::Checkpoint;
use civic_crawler::links::ExtractedLinks;
use civic_crawler::{crawl, CrawlConfig, CrawlOutcome};

/// Splits a saved page into its front-matter block and body, mirroring the
/// layout `PageStore::save` writes.
fn split_front_matter(contents: &str) -> (&str, &str) {
    let rest = contents.strip_prefix("---\n").expect("page should start with front matter");
    let end = rest.find("---\n\n").expect("front matter should be closed");
    (&rest[..end], &rest[end + "---\n\n".len()..])
}

fn md_files(dir: &std::path::Path) -> Vec<std::path::PathBuf> {
    let mut files: Vec<_> = std::fs::read_dir(dir)
        .unwrap()
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "md"))
        .collect();
    files.sort();
    files
}

#[tokio::test]
async fn scenario_1_seed_only() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/")
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body("<html><head><title>Hello</title></head><body><h1>Hello</h1></body></html>")
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = CrawlConfig::new(server.url())
        .with_output_dir(dir.path())
        .with_max_depth(0)
        .with_rate_limit(0.0)
        .with_respect_robots(false);

    let (stats, outcome) = crawl(config).await.unwrap();
    assert_eq!(outcome, CrawlOutcome::Completed);
    assert_eq!(stats.pages_crawled, 1);
    assert_eq!(stats.pages_saved, 1);
    assert_eq!(stats.total_words, 1);

    let pages = md_files(dir.path());
    assert_eq!(pages.len(), 1, "expected exactly one saved page");

    let contents = std::fs::read_to_string(&pages[0]).unwrap();
    let (front, body) = split_front_matter(&contents);
    assert!(front.contains("word_count: 1"));

    let stored_hash = front
        .lines()
        .find_map(|line| line.strip_prefix("content_hash:"))
        .map(str::trim)
        .expect("content_hash present in front matter");
    assert_eq!(stored_hash, civic_crawler::change_detector::hash(body));

    let links_raw = std::fs::read_to_string(dir.path().join("links.json")).unwrap();
    let links: Vec<ExtractedLinks> = serde_json::from_str(&links_raw).unwrap();
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].total_links(), 0);

    let checkpoint_raw = std::fs::read_to_string(dir.path().join("crawler_state.json")).unwrap();
    let checkpoint: Checkpoint = serde_json::from_str(&checkpoint_raw).unwrap();
    assert_eq!(checkpoint.visited.len(), 1);
    assert!(checkpoint.queue.is_empty());
}

#[tokio::test]
async fn scenario_2_depth_one_respects_rate_limit() {
    let mut server = mockito::Server::new_async().await;
    let root_body = r#"<html><body><a href="/a">A</a><a href="/b">B</a></body></html>"#;
    let _root = server.mock("GET", "/").with_status(200).with_header("content-type", "text/html").with_body(root_body).create_async().await;
    let _a = server.mock("GET", "/a").with_status(200).with_header("content-type", "text/html").with_body("<html><body><p>Page A</p></body></html>").create_async().await;
    let _b = server.mock("GET", "/b").with_status(200).with_header("content-type", "text/html").with_body("<html><body><p>Page B</p></body></html>").create_async().await;

    let dir = tempfile::tempdir().unwrap();
    // A shorter interval than a production default so the test completes
    // quickly; the politeness invariant being checked (gaps >= rate_limit)
    // doesn't depend on the absolute magnitude.
    let rate_limit = 0.2;
    let config = CrawlConfig::new(server.url())
        .with_output_dir(dir.path())
        .with_max_depth(1)
        .with_rate_limit(rate_limit)
        .with_respect_robots(false);

    let start = Instant::now();
    let (stats, _outcome) = crawl(config).await.unwrap();
    let elapsed = start.elapsed();

    assert_eq!(stats.pages_saved, 3);
    // Two same-host requests after the first must each wait >= rate_limit.
    assert!(
        elapsed >= Duration::from_secs_f64(rate_limit * 2.0 * 0.8),
        "expected at least two politeness waits, elapsed = {elapsed:?}"
    );
}

#[tokio::test]
async fn scenario_3_duplicate_content_hashes_match() {
    let mut server = mockito::Server::new_async().await;
    let root_body = r#"<html><body><a href="/x">X</a><a href="/y">Y</a></body></html>"#;
    let shared_body = "<html><body><p>Identical content on both pages.</p></body></html>";
    let _root = server.mock("GET", "/").with_status(200).with_header("content-type", "text/html").with_body(root_body).create_async().await;
    let _x = server.mock("GET", "/x").with_status(200).with_header("content-type", "text/html").with_body(shared_body).create_async().await;
    let _y = server.mock("GET", "/y").with_status(200).with_header("content-type", "text/html").with_body(shared_body).create_async().await;

    let dir = tempfile::tempdir().unwrap();
    let config = CrawlConfig::new(server.url())
        .with_output_dir(dir.path())
        .with_max_depth(1)
        .with_rate_limit(0.0)
        .with_respect_robots(false);

    let (stats, _outcome) = crawl(config).await.unwrap();
    assert_eq!(stats.pages_saved, 3);

    let pages = md_files(dir.path());
    assert_eq!(pages.len(), 3);

    let hash_of = |path: &std::path::Path| -> String {
        let contents = std::fs::read_to_string(path).unwrap();
        let (front, _body) = split_front_matter(&contents);
        front
            .lines()
            .find_map(|line| line.strip_prefix("content_hash:"))
            .map(str::trim)
            .unwrap()
            .to_string()
    };

    let x_path = pages.iter().find(|p| p.to_string_lossy().contains('x')).unwrap();
    let y_path = pages.iter().find(|p| p.to_string_lossy().contains('y')).unwrap();
    assert_ne!(x_path, y_path);
    assert_eq!(hash_of(x_path), hash_of(y_path));

    let links_raw = std::fs::read_to_string(dir.path().join("links.json")).unwrap();
    let links: Vec<ExtractedLinks> = serde_json::from_str(&links_raw).unwrap();
    assert_eq!(links.len(), 3);
}

#[tokio::test]
async fn scenario_4_recrawl_unchanged_site_is_a_noop() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/")
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body("<html><body><p>Stable content.</p></body></html>")
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let build_config = || {
        CrawlConfig::new(server.url())
            .with_output_dir(dir.path())
            .with_max_depth(0)
            .with_rate_limit(0.0)
            .with_respect_robots(false)
    };

    let (first, _) = crawl(build_config()).await.unwrap();
    assert_eq!(first.pages_saved, 1);
    assert_eq!(first.pages_skipped, 0);

    let (second, _) = crawl(build_config()).await.unwrap();
    assert_eq!(second.pages_saved, 0);
    assert_eq!(second.pages_skipped, 1);
    assert_eq!(md_files(dir.path()).len(), 1, "no extra file should appear");
}

#[tokio::test]
async fn scenario_5_robots_denial_skips_without_saving() {
    let mut server = mockito::Server::new_async().await;
    let _robots_mock = server
        .mock("GET", "/robots.txt")
        .with_status(200)
        .with_body("User-agent: *\nDisallow: /private/\n")
        .create_async()
        .await;
    let _root_mock = server
        .mock("GET", "/")
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body(r#"<html><body><a href="/private/secret">Secret</a></body></html>"#)
        .create_async()
        .await;
    let secret_mock = server
        .mock("GET", "/private/secret")
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body("<html><body><p>Should never be fetched.</p></body></html>")
        .expect(0)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = CrawlConfig::new(server.url())
        .with_output_dir(dir.path())
        .with_max_depth(1)
        .with_rate_limit(0.0)
        .with_respect_robots(true);

    let (stats, _outcome) = crawl(config).await.unwrap();
    secret_mock.assert_async().await;

    assert_eq!(stats.pages_saved, 1);
    assert_eq!(stats.pages_skipped, 1);
    let pages = md_files(dir.path());
    assert_eq!(pages.len(), 1);
    assert!(!pages[0].to_string_lossy().contains("private"));
}

#[tokio::test]
async fn scenario_6_retries_until_success() {
    let mut server = mockito::Server::new_async().await;
    let _fail1 = server.mock("GET", "/").with_status(503).expect(1).create_async().await;
    let _fail2 = server.mock("GET", "/").with_status(503).expect(1).create_async().await;
    let _fail3 = server.mock("GET", "/").with_status(503).expect(1).create_async().await;
    let _ok = server
        .mock("GET", "/")
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body("<html><body><p>Recovered.</p></body></html>")
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = CrawlConfig::new(server.url())
        .with_output_dir(dir.path())
        .with_max_depth(0)
        .with_rate_limit(0.0)
        .with_max_retries(3)
        .with_respect_robots(false);

    let (stats, _outcome) = crawl(config).await.unwrap();
    assert_eq!(stats.pages_saved, 1);
    assert_eq!(stats.pages_failed, 0);
}

#[tokio::test]
async fn scenario_6_gives_up_before_recovery() {
    let mut server = mockito::Server::new_async().await;
    let _fail1 = server.mock("GET", "/").with_status(503).expect(1).create_async().await;
    let _fail2 = server.mock("GET", "/").with_status(503).expect(1).create_async().await;
    let _fail3 = server.mock("GET", "/").with_status(503).expect(1).create_async().await;

    let dir = tempfile::tempdir().unwrap();
    let config = CrawlConfig::new(server.url())
        .with_output_dir(dir.path())
        .with_max_depth(0)
        .with_rate_limit(0.0)
        .with_max_retries(2)
        .with_respect_robots(false);

    let (stats, _outcome) = crawl(config).await.unwrap();
    assert_eq!(stats.pages_saved, 0);
    assert_eq!(stats.pages_failed, 1);
    assert_eq!(stats.total_errors(), 1);
}

#[tokio::test]
async fn scenario_7_linked_document_is_downloaded_not_saved_as_a_page() {
    let mut server = mockito::Server::new_async().await;
    let _root_mock = server
        .mock("GET", "/")
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body(r#"<html><body><a href="/files/report.pdf">Report</a></body></html>"#)
        .create_async()
        .await;
    let _pdf_mock = server
        .mock("GET", "/files/report.pdf")
        .with_status(200)
        .with_header("content-type", "application/pdf")
        .with_body(b"%PDF-1.4 fake document bytes".as_slice())
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = CrawlConfig::new(server.url())
        .with_output_dir(dir.path())
        .with_max_depth(0)
        .with_rate_limit(0.0)
        .with_download_files(true)
        .with_respect_robots(false);

    let (stats, _outcome) = crawl(config).await.unwrap();
    assert_eq!(stats.pages_saved, 1, "the HTML root page is still saved normally");
    assert_eq!(stats.files_downloaded, 1);

    let pages = md_files(dir.path());
    assert!(
        pages.iter().all(|p| !p.to_string_lossy().contains("report")),
        "the downloaded document must not also appear as a saved page"
    );

    let downloads_dir = dir.path().join("downloads");
    let downloaded: Vec<_> = std::fs::read_dir(&downloads_dir).unwrap().filter_map(|e| e.ok()).collect();
    assert_eq!(downloaded.len(), 1);
    assert_eq!(downloaded[0].file_name().to_str().unwrap(), "report.pdf");

    let mut downloader = FileDownloader::new(reqwest::Client::new(), dir.path(), Duration::from_secs(5)).unwrap();
    let removed = downloader.deduplicate_files().unwrap();
    assert_eq!(removed, 0, "a single file has nothing to deduplicate against");
    assert!(downloads_dir.join("report.pdf").exists());
}

#[tokio::test]
async fn crawler_run_deduplicates_leftover_link_inventory_at_start() {
    let mut server = mockito::Server::new_async().await;
    let _root_mock = server
        .mock("GET", "/")
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body("<html><body><p>No links here.</p></body></html>")
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let stale_entry = serde_json::json!([{
        "source_url": "http://stale.test/",
        "title": "Stale",
        "extracted_at": "2020-01-01T00:00:00+00:00",
        "internal_links": ["http://stale.test/a", "http://stale.test/a"],
        "external_links": [],
        "pdf_links": [],
        "document_links": [],
        "video_links": [],
        "email_links": [],
        "phone_links": [],
        "event_links": [],
        "image_links": [],
        "social_links": {}
    }]);
    std::fs::write(dir.path().join("links.json"), stale_entry.to_string()).unwrap();

    let config = CrawlConfig::new(server.url())
        .with_output_dir(dir.path())
        .with_max_depth(0)
        .with_rate_limit(0.0)
        .with_respect_robots(false);

    crawl(config).await.unwrap();

    let links_raw = std::fs::read_to_string(dir.path().join("links.json")).unwrap();
    let links: Vec<ExtractedLinks> = serde_json::from_str(&links_raw).unwrap();
    let stale = links.iter().find(|p| p.source_url == "http://stale.test/").unwrap();
    assert_eq!(stale.internal_links.len(), 1, "the duplicate internal link must be removed before the crawl runs");
}

#[tokio::test]
async fn crawler_new_deduplicates_leftover_downloads_at_start() {
    let mut server = mockito::Server::new_async().await;
    let _root_mock = server
        .mock("GET", "/")
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body("<html><body><p>No links here.</p></body></html>")
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let downloads_dir = dir.path().join("downloads");
    std::fs::create_dir_all(&downloads_dir).unwrap();
    std::fs::write(downloads_dir.join("report.pdf"), b"identical bytes").unwrap();
    std::fs::write(downloads_dir.join("report-copy.pdf"), b"identical bytes").unwrap();

    let config = CrawlConfig::new(server.url())
        .with_output_dir(dir.path())
        .with_max_depth(0)
        .with_rate_limit(0.0)
        .with_download_files(true)
        .with_respect_robots(false);

    crawl(config).await.unwrap();

    let remaining: Vec<_> = std::fs::read_dir(&downloads_dir).unwrap().filter_map(|e| e.ok()).collect();
    assert_eq!(remaining.len(), 1, "the pre-existing duplicate must be removed before the crawl runs");
}
