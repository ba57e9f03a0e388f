//! Categorized link inventory: every `<a>`/`<img>`/`<iframe>` target found on
//! a crawled page, bucketed by kind and persisted as one JSON array keyed by
//! source page, grounded on
//! `examples/original_source/rag_crawler/rag_crawler/link_extractor.py`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use url::Url;

const VIDEO_DOMAINS: &[&str] = &[
    "youtube.com",
    "youtu.be",
    "vimeo.com",
    "dailymotion.com",
    "tiktok.com",
];

const SOCIAL_PLATFORMS: &[(&str, &str)] = &[
    ("facebook.com", "facebook"),
    ("twitter.com", "twitter"),
    ("x.com", "twitter"),
    ("linkedin.com", "linkedin"),
    ("instagram.com", "instagram"),
    ("tiktok.com", "tiktok"),
    ("youtube.com", "youtube"),
    ("github.com", "github"),
    ("pinterest.com", "pinterest"),
];

const DOC_EXTENSIONS: &[&str] = &[
    ".doc", ".docx", ".xls", ".xlsx", ".ppt", ".pptx", ".csv", ".txt", ".rtf",
];

const EVENT_KEYWORDS: &[&str] = &[
    "event", "calendar", "schedule", "workshop", "conference", "seminar", "webinar", "training",
];

/// Links harvested from one page, grouped by category.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractedLinks {
    pub source_url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub internal_links: Vec<String>,
    #[serde(default)]
    pub external_links: Vec<String>,
    #[serde(default)]
    pub pdf_links: Vec<String>,
    #[serde(default)]
    pub document_links: Vec<String>,
    #[serde(default)]
    pub video_links: Vec<String>,
    #[serde(default)]
    pub social_links: HashMap<String, String>,
    #[serde(default)]
    pub email_links: Vec<String>,
    #[serde(default)]
    pub phone_links: Vec<String>,
    #[serde(default)]
    pub event_links: Vec<String>,
    #[serde(default)]
    pub image_links: Vec<String>,
    pub extracted_at: String,
}

impl ExtractedLinks {
    #[must_use]
    pub fn total_links(&self) -> usize {
        self.internal_links.len()
            + self.external_links.len()
            + self.pdf_links.len()
            + self.video_links.len()
    }
}

/// Parses `html` for link-like elements and categorizes everything it finds
/// relative to `source_url`.
#[must_use]
pub fn extract(html: &str, source_url: &str, title: &str, extracted_at: &str) -> ExtractedLinks {
    let mut links = ExtractedLinks {
        source_url: source_url.to_string(),
        title: title.to_string(),
        extracted_at: extracted_at.to_string(),
        ..Default::default()
    };

    let base_domain = Url::parse(source_url)
        .map(|u| u.host_str().unwrap_or("").to_ascii_lowercase())
        .unwrap_or_default();

    let document = Html::parse_document(html);
    let mut seen = std::collections::HashSet::new();

    if let Ok(selector) = Selector::parse("a[href]") {
        for anchor in document.select(&selector) {
            let Some(href) = anchor.value().attr("href") else { continue };
            let href = href.trim();
            if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
                continue;
            }

            if let Some(email) = href.strip_prefix("mailto:") {
                let email = email.split('?').next().unwrap_or("").to_string();
                if !email.is_empty() && !links.email_links.contains(&email) {
                    links.email_links.push(email);
                }
                continue;
            }
            if let Some(phone) = href.strip_prefix("tel:") {
                let phone = phone.to_string();
                if !phone.is_empty() && !links.phone_links.contains(&phone) {
                    links.phone_links.push(phone);
                }
                continue;
            }

            let Ok(base) = Url::parse(source_url) else { continue };
            let Ok(absolute) = base.join(href) else { continue };
            let absolute_str = absolute.to_string();
            if !seen.insert(absolute_str.clone()) {
                continue;
            }

            categorize(&mut links, &absolute, &absolute_str, &base_domain);
        }
    }

    if let Ok(selector) = Selector::parse("iframe[src]") {
        for iframe in document.select(&selector) {
            if let Some(src) = iframe.value().attr("src") {
                if VIDEO_DOMAINS.iter().any(|domain| src.contains(domain))
                    && !links.video_links.contains(&src.to_string())
                {
                    links.video_links.push(src.to_string());
                }
            }
        }
    }

    if let Ok(selector) = Selector::parse("img[src]") {
        for img in document.select(&selector) {
            if let Some(src) = img.value().attr("src") {
                if src.starts_with("data:") {
                    continue;
                }
                if let Ok(base) = Url::parse(source_url) {
                    if let Ok(absolute) = base.join(src) {
                        let absolute_str = absolute.to_string();
                        if !links.image_links.contains(&absolute_str) {
                            links.image_links.push(absolute_str);
                        }
                    }
                }
            }
        }
    }

    links
}

fn categorize(links: &mut ExtractedLinks, url: &Url, url_str: &str, base_domain: &str) {
    let path_lower = url.path().to_ascii_lowercase();
    let domain_lower = url.host_str().unwrap_or("").to_ascii_lowercase();

    if path_lower.ends_with(".pdf") {
        if !links.pdf_links.contains(&url_str.to_string()) {
            links.pdf_links.push(url_str.to_string());
        }
        return;
    }
    if DOC_EXTENSIONS.iter().any(|ext| path_lower.ends_with(ext)) {
        if !links.document_links.contains(&url_str.to_string()) {
            links.document_links.push(url_str.to_string());
        }
        return;
    }

    if VIDEO_DOMAINS.iter().any(|domain| domain_lower.contains(domain)) {
        if !links.video_links.contains(&url_str.to_string()) {
            links.video_links.push(url_str.to_string());
        }
        return;
    }

    for (domain, platform) in SOCIAL_PLATFORMS {
        if domain_lower.contains(domain) {
            links.social_links.insert((*platform).to_string(), url_str.to_string());
            return;
        }
    }

    if EVENT_KEYWORDS.iter().any(|keyword| path_lower.contains(keyword))
        && !links.event_links.contains(&url_str.to_string())
    {
        links.event_links.push(url_str.to_string());
    }

    if !base_domain.is_empty() && (base_domain.contains(&domain_lower) || domain_lower.contains(base_domain)) {
        if !links.internal_links.contains(&url_str.to_string()) {
            links.internal_links.push(url_str.to_string());
        }
    } else if !links.external_links.contains(&url_str.to_string()) {
        links.external_links.push(url_str.to_string());
    }
}

/// Aggregate counts across every page recorded in a link inventory, the Rust
/// counterpart of `LinkExtractor.get_statistics`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LinkStatistics {
    pub pages_processed: usize,
    pub total_internal_links: usize,
    pub total_external_links: usize,
    pub total_pdf_links: usize,
    pub total_video_links: usize,
    pub total_social_platforms: usize,
    pub total_emails: usize,
    pub total_events: usize,
}

/// JSON-backed inventory of links across every page crawled in a run.
pub struct LinkInventory {
    path: PathBuf,
    pages: Vec<ExtractedLinks>,
}

impl LinkInventory {
    /// Loads `links.json` from `path` if present, starting empty otherwise.
    pub fn load(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path = path.into();
        let pages = if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            serde_json::from_str(&raw).unwrap_or_default()
        } else {
            Vec::new()
        };
        Ok(Self { path, pages })
    }

    /// Inserts or replaces the entry for `links.source_url`, then writes the
    /// whole inventory back out atomically.
    pub fn upsert(&mut self, links: ExtractedLinks) -> anyhow::Result<()> {
        if let Some(existing) = self.pages.iter_mut().find(|p| p.source_url == links.source_url) {
            *existing = links;
        } else {
            self.pages.push(links);
        }
        self.flush()
    }

    /// Removes duplicate entries within each category of every page; returns
    /// the number of duplicate link entries removed.
    pub fn deduplicate(&mut self) -> usize {
        let mut removed = 0;
        for page in &mut self.pages {
            for field in [
                &mut page.internal_links,
                &mut page.external_links,
                &mut page.pdf_links,
                &mut page.document_links,
                &mut page.video_links,
                &mut page.email_links,
                &mut page.phone_links,
                &mut page.event_links,
                &mut page.image_links,
            ] {
                let original_len = field.len();
                let mut seen = std::collections::HashSet::new();
                field.retain(|item| seen.insert(item.clone()));
                removed += original_len - field.len();
            }
        }
        removed
    }

    #[must_use]
    pub fn statistics(&self) -> LinkStatistics {
        let mut stats = LinkStatistics { pages_processed: self.pages.len(), ..Default::default() };
        let mut platforms = std::collections::HashSet::new();
        for page in &self.pages {
            stats.total_internal_links += page.internal_links.len();
            stats.total_external_links += page.external_links.len();
            stats.total_pdf_links += page.pdf_links.len();
            stats.total_video_links += page.video_links.len();
            stats.total_events += page.event_links.len();
            stats.total_emails += page.email_links.len();
            platforms.extend(page.social_links.keys().cloned());
        }
        stats.total_social_platforms = platforms.len();
        stats
    }

    pub(crate) fn flush(&self) -> anyhow::Result<()> {
        let parent = self.path.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(parent)?;
        let json = serde_json::to_string_pretty(&self.pages)?;
        let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
        use std::io::Write;
        tmp.write_all(json.as_bytes())?;
        tmp.persist(&self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categorizes_pdf_and_internal_and_external() {
        let html = r#"
            <a href="/about">About</a>
            <a href="https://other.example.com/page">External</a>
            <a href="/files/report.pdf">Report</a>
            <a href="mailto:hi@example.com">Email</a>
            <a href="tel:+15551234567">Call</a>
        "#;
        let links = extract(html, "https://example.com/home", "Home", "2026-01-01T00:00:00Z");
        assert_eq!(links.internal_links, vec!["https://example.com/about"]);
        assert_eq!(links.external_links, vec!["https://other.example.com/page"]);
        assert_eq!(links.pdf_links, vec!["https://example.com/files/report.pdf"]);
        assert_eq!(links.email_links, vec!["hi@example.com"]);
        assert_eq!(links.phone_links, vec!["+15551234567"]);
    }

    #[test]
    fn social_link_recorded_by_platform() {
        let html = r#"<a href="https://github.com/rustlang/rust">GitHub</a>"#;
        let links = extract(html, "https://example.com/", "", "2026-01-01T00:00:00Z");
        assert_eq!(links.social_links.get("github").unwrap(), "https://github.com/rustlang/rust");
    }

    #[test]
    fn event_keyword_in_path_is_captured() {
        let html = r#"<a href="/events/fall-workshop">Workshop</a>"#;
        let links = extract(html, "https://example.com/", "", "2026-01-01T00:00:00Z");
        assert_eq!(links.event_links, vec!["https://example.com/events/fall-workshop"]);
    }

    #[test]
    fn inventory_deduplicates_within_category() {
        let mut links = ExtractedLinks {
            source_url: "https://example.com/".to_string(),
            internal_links: vec!["a".to_string(), "a".to_string(), "b".to_string()],
            extracted_at: "2026-01-01T00:00:00Z".to_string(),
            ..Default::default()
        };
        let dir = tempfile::tempdir().unwrap();
        let mut inventory = LinkInventory::load(dir.path().join("links.json")).unwrap();
        inventory.upsert(std::mem::take(&mut links)).unwrap();
        let removed = inventory.deduplicate();
        assert_eq!(removed, 1);
    }
}
