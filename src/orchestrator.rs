//! The crawl loop: dequeue → robots gate → rate limit → fetch → extract →
//! convert → store → harvest links → enqueue, with periodic checkpointing
//! and cooperative cancellation. Generalized from a concurrent multi-task
//! orchestrator loop shape down to a single-item-at-a-time model — the rate
//! limiter, not a semaphore, is the serializer here.

use std::time::Duration;

use chrono::Utc;
use url::Url;

use crate::config::{CrawlConfig, FetcherBackend};
use crate::converter;
use crate::downloader::FileDownloader;
use crate::error::{CrawlError, CrawlResult, FailureKind};
use crate::extractor;
use crate::fetch::browser::BrowserFetcher;
use crate::fetch::http::HttpFetcher;
use crate::fetch::{Fetcher, RenderResult};
use crate::frontier::{Checkpoint, Frontier};
use crate::links::LinkInventory;
use crate::rate_limiter::{extract_host, RateLimiter};
use crate::robots::RobotsGate;
use crate::store::{PageStore, SaveOutcome};
use crate::url_canon;

const MAX_RETAINED_ERRORS: usize = 50;

/// Aggregate counters and timing for one crawl run.
#[derive(Debug, Clone, Default)]
pub struct CrawlStats {
    pub pages_crawled: usize,
    pub pages_saved: usize,
    pub pages_skipped: usize,
    pub pages_failed: usize,
    pub total_words: usize,
    pub files_downloaded: usize,
    pub links_extracted: usize,
    pub start_time: Option<chrono::DateTime<Utc>>,
    pub end_time: Option<chrono::DateTime<Utc>>,
    pub errors: Vec<String>,
    total_errors: usize,
}

impl CrawlStats {
    #[must_use]
    pub fn duration(&self) -> Duration {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => (end - start).to_std().unwrap_or_default(),
            _ => Duration::ZERO,
        }
    }

    #[must_use]
    pub fn total_errors(&self) -> usize {
        self.total_errors
    }

    fn record_error(&mut self, message: String) {
        self.total_errors += 1;
        if self.errors.len() < MAX_RETAINED_ERRORS {
            self.errors.push(message);
        }
    }
}

/// How a crawl run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrawlOutcome {
    Completed,
    Interrupted,
}

/// Per-dequeue callback: `(pages_crawled, frontier_seen, current_url)`.
pub type ProgressCallback = Box<dyn Fn(usize, usize, &str) + Send + Sync>;

/// Owns every long-lived component and drives the main loop.
pub struct Crawler {
    config: CrawlConfig,
    frontier: Frontier,
    rate_limiter: RateLimiter,
    robots: RobotsGate,
    fetcher: Box<dyn Fetcher>,
    downloader: Option<FileDownloader>,
    progress: Option<ProgressCallback>,
    visited: Vec<String>,
}

impl Crawler {
    pub async fn new(config: CrawlConfig) -> anyhow::Result<Self> {
        config.validate()?;

        let http_fetcher = HttpFetcher::new(config.user_agent(), config.timeout(), config.max_retries())?;
        let client = http_fetcher.client();

        let fetcher: Box<dyn Fetcher> = match config.fetcher_backend() {
            FetcherBackend::Http => Box::new(http_fetcher),
            FetcherBackend::Browser => {
                Box::new(BrowserFetcher::launch(config.browser_headless(), config.browser_concurrency()).await?)
            }
        };

        let downloader = if config.download_files() {
            let mut downloader = FileDownloader::new(client.clone(), config.output_dir(), Duration::from_secs(60))?;
            let removed = downloader.deduplicate_files()?;
            if removed > 0 {
                log::info!("removed {removed} duplicate downloaded file(s) from a previous run");
            }
            Some(downloader)
        } else {
            None
        };

        // A non-empty `queue` means the previous run was interrupted mid-crawl:
        // resume from exactly where it left off. An empty queue means the
        // previous run ran to completion (or never started), so the stale
        // `visited` set is discarded and this is a fresh crawl — re-seeding the
        // base URL lets content-hash comparison detect whether the site changed
        // since the last full run.
        let frontier = match Frontier::load_checkpoint(&config.checkpoint_path())? {
            Some(checkpoint) if !checkpoint.queue.is_empty() => Frontier::from_checkpoint(&checkpoint),
            _ => Frontier::new(),
        };
        if frontier.is_empty() {
            frontier.add(config.base_url(), 0);
        }

        Ok(Self {
            robots: RobotsGate::new(client, config.user_agent().to_string(), config.respect_robots()),
            rate_limiter: RateLimiter::new(config.rate_limit()),
            fetcher,
            downloader,
            frontier,
            config,
            progress: None,
            visited: Vec::new(),
        })
    }

    #[must_use]
    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Runs the crawl to completion, to the configured page limit, or until
    /// interrupted by `Ctrl-C`.
    pub async fn run(&mut self) -> CrawlResult<(CrawlStats, CrawlOutcome)> {
        let mut stats = CrawlStats { start_time: Some(Utc::now()), ..Default::default() };
        let store = PageStore::new(self.config.output_dir());
        let mut links = LinkInventory::load(self.config.links_path())
            .map_err(CrawlError::Checkpoint)?;
        let deduped = links.deduplicate();
        if deduped > 0 {
            log::info!("removed {deduped} duplicate link entr{} from a previous run", if deduped == 1 { "y" } else { "ies" });
            links.flush().map_err(CrawlError::Checkpoint)?;
        }

        let outcome = loop {
            if stats.pages_crawled >= self.config.max_pages() {
                break CrawlOutcome::Completed;
            }

            let ctrl_c = tokio::signal::ctrl_c();
            tokio::pin!(ctrl_c);

            let item = tokio::select! {
                biased;
                _ = &mut ctrl_c => break CrawlOutcome::Interrupted,
                item = async { self.frontier.pop() } => item,
            };

            let Some(item) = item else { break CrawlOutcome::Completed };
            if item.depth > self.config.max_depth() {
                stats.pages_skipped += 1;
                continue;
            }

            if let Some(progress) = &self.progress {
                progress(stats.pages_crawled, self.frontier.seen_count(), &item.url);
            }

            self.frontier.mark_seen(&item.url);
            self.visited.push(item.url.clone());
            stats.pages_crawled += 1;

            let host = extract_host(&item.url);

            if !self.robots.can_fetch(&item.url).await {
                stats.pages_skipped += 1;
                continue;
            }
            if let Some(host) = &host {
                if let Some(delay) = self.robots.crawl_delay(&item.url).await {
                    self.rate_limiter.set_host_delay(host, delay);
                }
                self.rate_limiter.wait(host).await;
            }

            let result = self.fetcher.fetch(&item.url).await;

            let RenderResult::Ok { final_url, html, extracted_text, headings: fetched_headings, .. } = result
            else {
                let (status, detail) = match &result {
                    RenderResult::Err { status, detail, .. } => (*status, detail.clone()),
                    RenderResult::Ok { .. } => unreachable!(),
                };
                // A status code classifies the failure precisely; below the
                // HTTP layer (timeouts, DNS, connection resets) there is no
                // status, so fall back to classifying the error message.
                let kind = match status {
                    Some(status) => crate::fetch::http::classify_status(Some(status)),
                    None => FailureKind::classify(&anyhow::anyhow!(detail.clone())),
                };
                stats.pages_failed += 1;
                stats.record_error(format!("{}: {detail}", item.url));
                if kind.is_retryable() {
                    log::warn!("transient failure fetching {}: {detail}", item.url);
                } else {
                    log::warn!("permanent failure fetching {}: {detail}", item.url);
                }
                continue;
            };

            if html.trim().is_empty() {
                stats.pages_skipped += 1;
                continue;
            }

            if !self.config.follow_cross_host_redirects() && !url_canon::same_host(&item.url, &final_url) {
                stats.pages_skipped += 1;
                continue;
            }

            let extracted = extractor::extract(&html);
            let body = match extracted_text {
                Some(text) => text,
                None => converter::convert(&extracted.content_html),
            };
            let headings = if fetched_headings.is_empty() { extracted.headings } else { fetched_headings };

            let content_hash = crate::change_detector::hash(&body);
            let crawl_timestamp = Utc::now().to_rfc3339();

            match store.save(&final_url, &extracted.title, &body, &content_hash, extracted.word_count, &headings, &crawl_timestamp) {
                Ok(SaveOutcome::Saved(_)) => {
                    stats.pages_saved += 1;
                    stats.total_words += extracted.word_count;
                }
                Ok(SaveOutcome::Unchanged(_)) => {
                    stats.pages_skipped += 1;
                }
                Err(err) => {
                    stats.record_error(format!("{final_url}: storage error: {err:#}"));
                    return Err(CrawlError::Storage { path: self.config.output_dir().display().to_string(), source: err });
                }
            }

            let link_record = crate::links::extract(&html, &final_url, &extracted.title, &crawl_timestamp);
            stats.links_extracted += link_record.total_links();
            if let Err(err) = links.upsert(link_record.clone()) {
                log::warn!("failed to persist link inventory for {final_url}: {err:#}");
            }

            if self.config.download_files() {
                if let Some(downloader) = &mut self.downloader {
                    stats.files_downloaded += downloader.download_all(&html, &final_url).await.len();
                }
            }

            for candidate in link_record.internal_links {
                if is_crawlable(&candidate, &self.config) {
                    self.frontier.add(&candidate, item.depth + 1);
                }
            }

            if stats.pages_crawled % self.config.checkpoint_every() == 0 {
                self.write_checkpoint()?;
            }
        };

        self.write_checkpoint()?;
        stats.end_time = Some(Utc::now());
        Ok((stats, outcome))
    }

    fn write_checkpoint(&self) -> CrawlResult<()> {
        let checkpoint = Checkpoint {
            visited: self.visited.clone(),
            queue: self.frontier.queued_urls(),
            content_hashes: Vec::new(),
        };
        Frontier::write_checkpoint(&self.config.checkpoint_path(), &checkpoint)
            .map_err(CrawlError::Checkpoint)
    }
}

/// Whether a discovered link should be enqueued: same host, an allowed
/// extension, not matching an excluded pattern, and a syntactically valid
/// URL.
fn is_crawlable(url: &str, config: &CrawlConfig) -> bool {
    if !url_canon::valid(url) {
        return false;
    }
    if !url_canon::same_host(url, config.base_url()) {
        return false;
    }

    let Ok(parsed) = Url::parse(url) else { return false };
    let path = parsed.path().to_ascii_lowercase();

    if config.excluded_patterns().iter().any(|pattern| path.contains(pattern.as_str())) {
        return false;
    }

    let extension = url_canon::extension(url);
    let dotted = if extension.is_empty() { String::new() } else { format!(".{extension}") };
    config.allowed_extensions().iter().any(|allowed| allowed == &dotted)
}

/// Top-level convenience wrapper: build a [`Crawler`] from `config` and run
/// it to completion.
pub async fn crawl(config: CrawlConfig) -> CrawlResult<(CrawlStats, CrawlOutcome)> {
    let mut crawler = Crawler::new(config)
        .await
        .map_err(|err| CrawlError::Config(err.to_string()))?;
    crawler.run().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crawlable_rejects_excluded_pattern() {
        let config = CrawlConfig::new("https://example.com");
        assert!(!is_crawlable("https://example.com/admin/users", &config));
    }

    #[test]
    fn crawlable_rejects_cross_host() {
        let config = CrawlConfig::new("https://example.com");
        assert!(!is_crawlable("https://other.example.org/page", &config));
    }

    #[test]
    fn crawlable_accepts_allowed_extension() {
        let config = CrawlConfig::new("https://example.com");
        assert!(is_crawlable("https://example.com/docs/page.html", &config));
    }

    #[test]
    fn crawlable_rejects_disallowed_extension() {
        let config = CrawlConfig::new("https://example.com");
        assert!(!is_crawlable("https://example.com/archive.zip", &config));
    }
}

