//! Error types for the crawler.
//!
//! Components compose fallible internal operations with `anyhow::Result`, using
//! `anyhow::Context` to attach messages as errors cross module boundaries. Library
//! entry points translate the final result into [`CrawlError`] so callers outside
//! this crate never see `anyhow::Error` directly.

use thiserror::Error;

/// Top-level error returned by public library entry points.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("transport error fetching {url}: {source:#}")]
    Transport {
        url: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("robots.txt error for host {host}: {source:#}")]
    Robots {
        host: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("content extraction failed for {url}: {source:#}")]
    Extraction {
        url: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("conversion failed for {url}: {source:#}")]
    Conversion {
        url: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("storage error writing {path}: {source:#}")]
    Storage {
        path: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("checkpoint error: {0:#}")]
    Checkpoint(anyhow::Error),

    #[error("crawl interrupted")]
    Interrupted,
}

/// Convenience alias for fallible crawl operations.
pub type CrawlResult<T> = Result<T, CrawlError>;

/// Categorizes a page-level failure for retry decisions, independent of the
/// concrete error type. Classifies by message substring rather than threading
/// a typed error through every transport call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Timeout, DNS failure, connection reset, 5xx, 429. Retried with backoff.
    Transient,
    /// 404 / 403 / 410. Recorded as failed, never retried.
    Permanent,
    /// Response content-type was not HTML-like.
    NonHtml,
    /// robots.txt forbade the fetch.
    RobotsDenied,
    /// Extraction or conversion raised on this page only.
    ContentError,
    /// Unclassified.
    Unknown,
}

impl FailureKind {
    /// Classify a transport failure from its HTTP status code, when known.
    #[must_use]
    pub fn from_status(status: u16) -> Self {
        match status {
            429 | 500 | 502 | 503 | 504 => Self::Transient,
            404 | 403 | 410 => Self::Permanent,
            _ => Self::Unknown,
        }
    }

    /// Classify a generic error by message content, used when no status code
    /// is available (transport-level failures below the HTTP layer).
    #[must_use]
    pub fn classify(error: &anyhow::Error) -> Self {
        let msg = error.to_string().to_lowercase();

        if msg.contains("timed out")
            || msg.contains("timeout")
            || msg.contains("connection reset")
            || msg.contains("connection refused")
            || msg.contains("dns")
        {
            return Self::Transient;
        }

        if msg.contains("content-type") || msg.contains("non-html") {
            return Self::NonHtml;
        }

        if msg.contains("robots") {
            return Self::RobotsDenied;
        }

        if msg.contains("extract") || msg.contains("convert") || msg.contains("selector") {
            return Self::ContentError;
        }

        Self::Unknown
    }

    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::Transient | Self::Unknown)
    }
}
