//! robots.txt fetching, caching, and consultation.
//!
//! Absence of a robots.txt file — or any error fetching one — is cached as
//! "allow all", matching the source crawler's behavior: robots.txt is a
//! courtesy, not a prerequisite.

use std::time::Duration;

use dashmap::DashMap;
use log::{debug, warn};
use robotstxt::DefaultMatcher;

/// A cached, parsed robots policy for one host. `None` means "no policy was
/// found or fetching failed" — i.e. allow everything.
struct CachedPolicy {
    body: Option<String>,
    crawl_delay: Option<Duration>,
}

/// Per-host robots.txt cache and consultation surface.
pub struct RobotsGate {
    client: reqwest::Client,
    user_agent: String,
    respect_robots: bool,
    cache: DashMap<String, CachedPolicy>,
}

impl RobotsGate {
    #[must_use]
    pub fn new(client: reqwest::Client, user_agent: String, respect_robots: bool) -> Self {
        Self {
            client,
            user_agent,
            respect_robots,
            cache: DashMap::new(),
        }
    }

    async fn load(&self, scheme: &str, host: &str) {
        if self.cache.contains_key(host) {
            return;
        }
        let robots_url = format!("{scheme}://{host}/robots.txt");
        let fetched = self
            .client
            .get(&robots_url)
            .header("User-Agent", &self.user_agent)
            .timeout(Duration::from_secs(10))
            .send()
            .await;

        let policy = match fetched {
            Ok(resp) if resp.status().is_success() => match resp.text().await {
                Ok(body) => {
                    debug!("loaded robots.txt for {host}");
                    let crawl_delay = parse_crawl_delay(&body, &self.user_agent);
                    CachedPolicy { body: Some(body), crawl_delay }
                }
                Err(err) => {
                    warn!("failed to read robots.txt body for {host}: {err}");
                    CachedPolicy { body: None, crawl_delay: None }
                }
            },
            Ok(resp) => {
                debug!("no robots.txt for {host} (status {})", resp.status());
                CachedPolicy { body: None, crawl_delay: None }
            }
            Err(err) => {
                warn!("error fetching robots.txt for {host}: {err}");
                CachedPolicy { body: None, crawl_delay: None }
            }
        };

        self.cache.entry(host.to_string()).or_insert(policy);
    }

    /// Whether `url` may be fetched under `host`'s cached policy. Fetches and
    /// caches the policy on first sight of a host. Always returns `true`
    /// when `respect_robots` is disabled.
    pub async fn can_fetch(&self, url: &str) -> bool {
        if !self.respect_robots {
            return true;
        }
        let Ok(parsed) = url::Url::parse(url) else {
            return false;
        };
        let Some(host) = parsed.host_str() else {
            return false;
        };
        self.load(parsed.scheme(), host).await;

        match self.cache.get(host) {
            Some(entry) => match &entry.body {
                Some(body) => DefaultMatcher::default().one_agent_allowed_by_robots(body, &self.user_agent, url),
                None => true,
            },
            None => true,
        }
    }

    /// The `Crawl-delay` directive applicable to our user agent, if present.
    pub async fn crawl_delay(&self, url: &str) -> Option<Duration> {
        let parsed = url::Url::parse(url).ok()?;
        let host = parsed.host_str()?;
        self.load(parsed.scheme(), host).await;
        self.cache.get(host).and_then(|entry| entry.crawl_delay)
    }
}

/// robots.txt's `Crawl-delay` extension is not part of the standard the
/// `robotstxt` crate implements, so it is parsed directly: the first
/// `Crawl-delay:` line inside a group applicable to `*` or our user agent.
fn parse_crawl_delay(body: &str, user_agent: &str) -> Option<Duration> {
    let agent_lower = user_agent.to_ascii_lowercase();
    let mut applies = false;
    let mut found: Option<f64> = None;

    for raw_line in body.lines() {
        let line = raw_line.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        let Some((key, value)) = line.split_once(':') else { continue };
        let key = key.trim().to_ascii_lowercase();
        let value = value.trim();

        match key.as_str() {
            "user-agent" => {
                let agent = value.to_ascii_lowercase();
                applies = agent == "*" || agent_lower.contains(&agent);
            }
            "crawl-delay" if applies => {
                if let Ok(seconds) = value.parse::<f64>() {
                    found = Some(seconds);
                }
            }
            _ => {}
        }
    }

    found.map(Duration::from_secs_f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_crawl_delay_for_matching_agent() {
        let body = "User-agent: *\nDisallow: /private/\nCrawl-delay: 5\n";
        assert_eq!(parse_crawl_delay(body, "anything"), Some(Duration::from_secs(5)));
    }

    #[test]
    fn no_crawl_delay_outside_matching_group() {
        let body = "User-agent: othercrawler\nCrawl-delay: 5\n";
        assert_eq!(parse_crawl_delay(body, "civic-crawler"), None);
    }
}
