//! Crawl configuration.
//!
//! `CrawlConfig` follows the builder convention used throughout this crate:
//! fields are private, constructed via [`CrawlConfig::new`] plus chained
//! `#[must_use]` `with_*` setters, and read back through paired getters.

use std::path::PathBuf;
use std::time::Duration;

/// Which fetch backend the orchestrator should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetcherBackend {
    Http,
    Browser,
}

/// All tunables for a single crawl run.
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    base_url: String,
    output_dir: PathBuf,
    max_depth: u32,
    max_pages: usize,
    rate_limit: Duration,
    timeout: Duration,
    max_retries: u32,
    respect_robots: bool,
    user_agent: String,
    allowed_extensions: Vec<String>,
    excluded_patterns: Vec<String>,
    fetcher_backend: FetcherBackend,
    browser_headless: bool,
    browser_concurrency: usize,
    download_files: bool,
    follow_cross_host_redirects: bool,
    checkpoint_every: usize,
}

const DEFAULT_USER_AGENT: &str = "civic-crawler/1.0 (+https://github.com/civic-crawler/civic-crawler)";

impl CrawlConfig {
    /// Construct a config with sensible defaults for everything but the
    /// seed URL.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            output_dir: PathBuf::from("output"),
            max_depth: 3,
            max_pages: 1_000,
            rate_limit: Duration::from_secs_f64(1.0),
            timeout: Duration::from_secs(30),
            max_retries: 3,
            respect_robots: true,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            allowed_extensions: vec![
                ".html".into(), ".htm".into(), ".php".into(), ".asp".into(), ".aspx".into(), String::new(),
            ],
            excluded_patterns: vec![
                "/login".into(), "/logout".into(), "/signin".into(), "/signout".into(),
                "/admin".into(), "/wp-admin".into(), "/cart".into(), "/checkout".into(),
            ],
            fetcher_backend: FetcherBackend::Http,
            browser_headless: true,
            browser_concurrency: 3,
            download_files: false,
            follow_cross_host_redirects: true,
            checkpoint_every: 10,
        }
    }

    #[must_use]
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    #[must_use]
    pub fn with_max_depth(mut self, depth: u32) -> Self {
        self.max_depth = depth;
        self
    }

    #[must_use]
    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages;
        self
    }

    #[must_use]
    pub fn with_rate_limit(mut self, seconds: f64) -> Self {
        self.rate_limit = Duration::from_secs_f64(seconds.max(0.0));
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout = Duration::from_secs(seconds);
        self
    }

    #[must_use]
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    #[must_use]
    pub fn with_respect_robots(mut self, respect: bool) -> Self {
        self.respect_robots = respect;
        self
    }

    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    #[must_use]
    pub fn with_allowed_extensions(mut self, extensions: Vec<String>) -> Self {
        self.allowed_extensions = extensions;
        self
    }

    #[must_use]
    pub fn with_excluded_patterns(mut self, patterns: Vec<String>) -> Self {
        self.excluded_patterns = patterns;
        self
    }

    #[must_use]
    pub fn with_fetcher_backend(mut self, backend: FetcherBackend) -> Self {
        self.fetcher_backend = backend;
        self
    }

    #[must_use]
    pub fn with_browser_headless(mut self, headless: bool) -> Self {
        self.browser_headless = headless;
        self
    }

    #[must_use]
    pub fn with_browser_concurrency(mut self, concurrency: usize) -> Self {
        self.browser_concurrency = concurrency.max(1);
        self
    }

    #[must_use]
    pub fn with_download_files(mut self, enabled: bool) -> Self {
        self.download_files = enabled;
        self
    }

    #[must_use]
    pub fn with_follow_cross_host_redirects(mut self, follow: bool) -> Self {
        self.follow_cross_host_redirects = follow;
        self
    }

    #[must_use]
    pub fn with_checkpoint_every(mut self, pages: usize) -> Self {
        self.checkpoint_every = pages.max(1);
        self
    }

    /// Validate fields that cannot be checked incrementally (mirrors the
    /// Python config's `__post_init__` guards).
    pub fn validate(&self) -> anyhow::Result<()> {
        if !crate::url_canon::valid(&self.base_url) {
            anyhow::bail!("base_url is not a valid http(s) URL: {}", self.base_url);
        }
        Ok(())
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn output_dir(&self) -> &PathBuf {
        &self.output_dir
    }

    #[must_use]
    pub const fn max_depth(&self) -> u32 {
        self.max_depth
    }

    #[must_use]
    pub const fn max_pages(&self) -> usize {
        self.max_pages
    }

    #[must_use]
    pub const fn rate_limit(&self) -> Duration {
        self.rate_limit
    }

    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    #[must_use]
    pub const fn max_retries(&self) -> u32 {
        self.max_retries
    }

    #[must_use]
    pub const fn respect_robots(&self) -> bool {
        self.respect_robots
    }

    #[must_use]
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    #[must_use]
    pub fn allowed_extensions(&self) -> &[String] {
        &self.allowed_extensions
    }

    #[must_use]
    pub fn excluded_patterns(&self) -> &[String] {
        &self.excluded_patterns
    }

    #[must_use]
    pub const fn fetcher_backend(&self) -> FetcherBackend {
        self.fetcher_backend
    }

    #[must_use]
    pub const fn browser_headless(&self) -> bool {
        self.browser_headless
    }

    #[must_use]
    pub const fn browser_concurrency(&self) -> usize {
        self.browser_concurrency
    }

    #[must_use]
    pub const fn download_files(&self) -> bool {
        self.download_files
    }

    #[must_use]
    pub const fn follow_cross_host_redirects(&self) -> bool {
        self.follow_cross_host_redirects
    }

    #[must_use]
    pub const fn checkpoint_every(&self) -> usize {
        self.checkpoint_every
    }

    #[must_use]
    pub fn checkpoint_path(&self) -> PathBuf {
        self.output_dir.join("crawler_state.json")
    }

    #[must_use]
    pub fn links_path(&self) -> PathBuf {
        self.output_dir.join("links.json")
    }

    #[must_use]
    pub fn downloads_dir(&self) -> PathBuf {
        self.output_dir.join("downloads")
    }
}
