//! Two fetch backends behind one contract.
//!
//! The orchestrator only ever calls [`Fetcher::fetch`]; it never branches on
//! which backend produced the result.

pub mod browser;
pub mod http;
pub mod js_extract;

use async_trait::async_trait;

/// Outcome of fetching one URL. Modeled as a tagged sum rather than a struct
/// full of optionals, per the design note: `success` is derived, not stored.
#[derive(Debug, Clone)]
pub enum RenderResult {
    Ok {
        final_url: String,
        html: String,
        status: u16,
        /// Text already extracted by the backend (the browser backend's
        /// in-page script), when available — the orchestrator prefers this
        /// over re-running the HTML extractor.
        extracted_text: Option<String>,
        title: Option<String>,
        headings: Vec<String>,
    },
    Err {
        final_url: String,
        status: Option<u16>,
        detail: String,
    },
}

impl RenderResult {
    #[must_use]
    pub fn success(&self) -> bool {
        match self {
            Self::Ok { status, .. } => (200..400).contains(status),
            Self::Err { .. } => false,
        }
    }

    #[must_use]
    pub fn final_url(&self) -> &str {
        match self {
            Self::Ok { final_url, .. } | Self::Err { final_url, .. } => final_url,
        }
    }
}

/// Common capability implemented by both backends.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> RenderResult;
}
