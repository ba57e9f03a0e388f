//! The default fetch backend: a plain `reqwest` GET with retry on
//! transient failures, grounded on the error classification in
//! [`crate::error::FailureKind`].

use std::time::Duration;

use async_trait::async_trait;

use super::{Fetcher, RenderResult};
use crate::error::FailureKind;

const RETRY_STATUSES: &[u16] = &[429, 500, 502, 503, 504];
const NON_RETRY_STATUSES: &[u16] = &[404, 403, 410];

/// HTML content types accepted for extraction; everything else is returned
/// as a successful fetch with an empty body so the orchestrator can skip it
/// without treating it as a failure (resolved Open Question: non-HTML pages
/// are not retried, just passed through inert).
const ACCEPTED_CONTENT_TYPES: &[&str] = &["text/html", "application/xhtml+xml"];

pub struct HttpFetcher {
    client: reqwest::Client,
    max_retries: u32,
}

impl HttpFetcher {
    /// Builds a client honoring `timeout` and identifying as `user_agent`.
    pub fn new(user_agent: &str, timeout: Duration, max_retries: u32) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()?;
        Ok(Self { client, max_retries })
    }

    /// Exposes the underlying client so [`crate::robots::RobotsGate`] can
    /// reuse the same connection pool and user agent.
    #[must_use]
    pub fn client(&self) -> reqwest::Client {
        self.client.clone()
    }

    async fn fetch_once(&self, url: &str) -> Result<RenderResult, (bool, Option<u16>, String)> {
        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(source) => {
                let transient = !source.is_builder() && !source.is_redirect();
                return Err((transient, source.status().map(|s| s.as_u16()), source.to_string()));
            }
        };

        let status = response.status();
        let final_url = response.url().to_string();

        if !status.is_success() {
            let retryable = RETRY_STATUSES.contains(&status.as_u16())
                && !NON_RETRY_STATUSES.contains(&status.as_u16());
            return Err((retryable, Some(status.as_u16()), format!("HTTP status {status}")));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("")
            .to_ascii_lowercase();
        let is_html = ACCEPTED_CONTENT_TYPES
            .iter()
            .any(|accepted| content_type.starts_with(accepted));

        if !is_html {
            return Ok(RenderResult::Ok {
                final_url,
                html: String::new(),
                status: status.as_u16(),
                extracted_text: None,
                title: None,
                headings: Vec::new(),
            });
        }

        match response.text().await {
            Ok(html) => Ok(RenderResult::Ok {
                final_url,
                html,
                status: status.as_u16(),
                extracted_text: None,
                title: None,
                headings: Vec::new(),
            }),
            Err(source) => Err((true, None, source.to_string())),
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> RenderResult {
        let mut last_status: Option<u16> = None;
        let mut last_detail = String::new();

        for attempt in 0..=self.max_retries {
            match self.fetch_once(url).await {
                Ok(result) => return result,
                Err((retryable, status, detail)) => {
                    last_status = status;
                    last_detail = detail;
                    if !retryable || attempt == self.max_retries {
                        break;
                    }
                    let backoff = Duration::from_secs(1 << attempt);
                    tokio::time::sleep(backoff).await;
                }
            }
        }

        RenderResult::Err {
            final_url: url.to_string(),
            status: last_status,
            detail: last_detail,
        }
    }
}

/// Convenience wrapper mirroring [`FailureKind::from_status`], kept here so
/// callers classifying a finished [`RenderResult::Err`] don't need to know
/// which module owns the mapping.
#[must_use]
pub fn classify_status(status: Option<u16>) -> FailureKind {
    status.map_or(FailureKind::Unknown, FailureKind::from_status)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepted_content_types_cover_html_and_xhtml() {
        assert!(ACCEPTED_CONTENT_TYPES.contains(&"text/html"));
        assert!(ACCEPTED_CONTENT_TYPES.contains(&"application/xhtml+xml"));
    }

    #[test]
    fn retry_statuses_exclude_permanent_failures() {
        for status in NON_RETRY_STATUSES {
            assert!(!RETRY_STATUSES.contains(status));
        }
    }

    #[tokio::test]
    async fn fetch_against_mock_server_returns_html() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body("<html><body>hi</body></html>")
            .create_async()
            .await;

        let fetcher = HttpFetcher::new("test-agent/1.0", Duration::from_secs(5), 2).unwrap();
        let result = fetcher.fetch(&server.url()).await;
        mock.assert_async().await;

        match result {
            RenderResult::Ok { html, status, .. } => {
                assert_eq!(status, 200);
                assert!(html.contains("hi"));
            }
            RenderResult::Err { detail, .. } => panic!("expected Ok, got Err: {detail}"),
        }
    }

    #[tokio::test]
    async fn non_retryable_status_fails_without_retry() {
        let mut server = mockito::Server::new_async().await;
        let mock = server.mock("GET", "/").with_status(404).expect(1).create_async().await;

        let fetcher = HttpFetcher::new("test-agent/1.0", Duration::from_secs(5), 3).unwrap();
        let result = fetcher.fetch(&server.url()).await;
        mock.assert_async().await;

        assert!(!result.success());
    }
}
