//! Per-host politeness delay.
//!
//! `wait()` computes how long the caller still needs to sleep while holding
//! the per-host map, then drops the lock before actually sleeping, so other
//! hosts are never blocked by one host's wait.

use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;
use url::Url;

/// Per-host minimum inter-request delay enforcement.
pub struct RateLimiter {
    default_delay: Duration,
    last_request: DashMap<String, Instant>,
    overrides: DashMap<String, Duration>,
}

impl RateLimiter {
    #[must_use]
    pub fn new(default_delay: Duration) -> Self {
        Self {
            default_delay,
            last_request: DashMap::new(),
            overrides: DashMap::new(),
        }
    }

    /// Seed a per-host delay override, typically from a robots.txt
    /// `Crawl-delay` directive. A larger value than the default always wins;
    /// we never let a site request a *shorter* delay than the configured
    /// default.
    pub fn set_host_delay(&self, host: &str, delay: Duration) {
        if delay > self.default_delay {
            self.overrides.insert(host.to_ascii_lowercase(), delay);
        }
    }

    fn delay_for(&self, host: &str) -> Duration {
        self.overrides
            .get(&host.to_ascii_lowercase())
            .map_or(self.default_delay, |d| *d)
    }

    /// Block until at least the configured delay has elapsed since the last
    /// recorded request to `host`, then record "now" as the new last-request
    /// time. Never holds the map across the `await` point.
    pub async fn wait(&self, host: &str) {
        let host_key = host.to_ascii_lowercase();
        let delay = self.delay_for(&host_key);

        let sleep_for = {
            let now = Instant::now();
            match self.last_request.get(&host_key) {
                Some(last) => {
                    let elapsed = now.saturating_duration_since(*last);
                    delay.saturating_sub(elapsed)
                }
                None => Duration::ZERO,
            }
        };

        if !sleep_for.is_zero() {
            tokio::time::sleep(sleep_for).await;
        }

        self.last_request.insert(host_key, Instant::now());
    }
}

/// Extract a lowercased host from a URL string, for use as a rate-limiter
/// and robots-cache key. Returns `None` for unparsable URLs.
#[must_use]
pub fn extract_host(url: &str) -> Option<String> {
    Url::parse(url).ok().and_then(|u| u.host_str().map(str::to_ascii_lowercase))
}
