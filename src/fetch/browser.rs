//! Headless-browser fetch backend, for pages that only render their content
//! via client-side JavaScript. Bounded by a semaphore so a crawl never opens
//! more tabs than `browser_concurrency` at once.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfigBuilder, HeadlessMode};
use chromiumoxide::page::Page;
use futures::StreamExt;
use tokio::sync::Semaphore;

use super::js_extract::EXTRACT_TEXT_SCRIPT;
use super::{Fetcher, RenderResult};

/// Selectors opportunistically waited on before extraction — common content
/// mount points for SPA / CMS frameworks that finish hydrating after
/// `domcontentloaded` fires.
const CMS_READY_SELECTORS: &[&str] = &["#root", "#app", "main", "article", "[data-reactroot]"];

async fn with_page_timeout<F, T>(operation: F, timeout: Duration, operation_name: &str) -> Result<T>
where
    F: std::future::Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, operation).await {
        Ok(result) => result,
        Err(_) => Err(anyhow::anyhow!("{operation_name} timed out after {timeout:?}")),
    }
}

pub struct BrowserFetcher {
    browser: Browser,
    _handler: tokio::task::JoinHandle<()>,
    semaphore: Arc<Semaphore>,
    nav_timeout: Duration,
}

impl BrowserFetcher {
    pub async fn launch(headless: bool, concurrency: usize) -> Result<Self> {
        let mut builder = BrowserConfigBuilder::default()
            .request_timeout(Duration::from_secs(30))
            .window_size(1920, 1080);
        builder = if headless {
            builder.headless_mode(HeadlessMode::default())
        } else {
            builder.with_head()
        };
        let config = builder
            .build()
            .map_err(|err| anyhow::anyhow!("failed to build browser config: {err}"))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("failed to launch headless browser")?;

        let _handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        Ok(Self {
            browser,
            _handler,
            semaphore: Arc::new(Semaphore::new(concurrency.max(1))),
            nav_timeout: Duration::from_secs(30),
        })
    }

    async fn render(&self, url: &str) -> Result<(String, String, String, Vec<String>)> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .context("failed to open a new tab")?;

        with_page_timeout(
            async { page.goto(url).await.map_err(|e| anyhow::anyhow!("{e}")) },
            self.nav_timeout,
            "navigation",
        )
        .await?;

        // Best-effort network-idle wait; pages that keep long-polling
        // connections open never go idle, so this is capped and non-fatal.
        let _ = with_page_timeout(
            async { page.wait_for_navigation().await.map_err(|e| anyhow::anyhow!("{e}")) },
            Duration::from_secs(10),
            "network idle",
        )
        .await;

        wait_for_stable_height(&page).await;

        for selector in CMS_READY_SELECTORS {
            if page.find_element(*selector).await.is_ok() {
                break;
            }
        }

        tokio::time::sleep(Duration::from_secs(3)).await;

        let title = page
            .evaluate("document.title")
            .await
            .ok()
            .and_then(|value| value.into_value::<String>().ok())
            .unwrap_or_default();

        let html = page.content().await.context("failed to read page content")?;
        let final_url = page.url().await.ok().flatten().unwrap_or_else(|| url.to_string());

        let extracted_text = page
            .evaluate(EXTRACT_TEXT_SCRIPT)
            .await
            .ok()
            .and_then(|value| value.into_value::<String>().ok())
            .unwrap_or_default();

        let headings = extracted_text
            .lines()
            .filter(|line| line.starts_with('#'))
            .map(|line| line.trim_matches('#').trim().to_string())
            .collect();

        let _ = page.close().await;

        Ok((final_url, html, extracted_text, headings))
    }
}

/// Scrolls to the bottom repeatedly until `document.body.scrollHeight`
/// stops growing, so lazy-loaded / infinite-scroll content has a chance to
/// mount before extraction. Bails out after a fixed number of rounds.
async fn wait_for_stable_height(page: &Page) {
    let mut last_height = -1.0;
    for _ in 0..10 {
        let height = page
            .evaluate("document.body.scrollHeight")
            .await
            .ok()
            .and_then(|value| value.into_value::<f64>().ok())
            .unwrap_or(-1.0);
        if (height - last_height).abs() < 1.0 {
            break;
        }
        last_height = height;
        let _ = page.evaluate("window.scrollTo(0, document.body.scrollHeight)").await;
        tokio::time::sleep(Duration::from_millis(400)).await;
    }
}

#[async_trait]
impl Fetcher for BrowserFetcher {
    async fn fetch(&self, url: &str) -> RenderResult {
        let Ok(_permit) = self.semaphore.acquire().await else {
            return RenderResult::Err {
                final_url: url.to_string(),
                status: None,
                detail: "browser concurrency semaphore closed".to_string(),
            };
        };

        match self.render(url).await {
            Ok((final_url, html, extracted_text, headings)) => RenderResult::Ok {
                final_url,
                html,
                status: 200,
                extracted_text: if extracted_text.is_empty() { None } else { Some(extracted_text) },
                title: None,
                headings,
            },
            Err(source) => RenderResult::Err {
                final_url: url.to_string(),
                status: None,
                detail: source.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cms_selectors_cover_common_spa_roots() {
        assert!(CMS_READY_SELECTORS.contains(&"#root"));
        assert!(CMS_READY_SELECTORS.contains(&"main"));
    }
}
