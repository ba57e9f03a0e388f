//! Downloads linked PDFs and office documents into `downloads/`, skipping
//! anything already present from a previous run. Grounded on
//! `examples/original_source/rag_crawler/rag_crawler/file_downloader.py`.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use scraper::{Html, Selector};
use tokio::io::AsyncWriteExt;
use url::Url;

pub const DEFAULT_EXTENSIONS: &[&str] = &[
    ".pdf", ".doc", ".docx", ".xls", ".xlsx", ".ppt", ".pptx", ".csv", ".txt", ".rtf",
];

pub struct FileDownloader {
    client: reqwest::Client,
    downloads_dir: PathBuf,
    allowed_extensions: Vec<String>,
    timeout: std::time::Duration,
    downloaded_this_run: HashSet<String>,
    existing_filenames: HashSet<String>,
}

impl FileDownloader {
    pub fn new(client: reqwest::Client, output_dir: &Path, timeout: std::time::Duration) -> anyhow::Result<Self> {
        let downloads_dir = output_dir.join("downloads");
        std::fs::create_dir_all(&downloads_dir)?;

        let mut existing_filenames = HashSet::new();
        for entry in std::fs::read_dir(&downloads_dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                if let Some(name) = entry.file_name().to_str() {
                    existing_filenames.insert(name.to_ascii_lowercase());
                }
            }
        }

        Ok(Self {
            client,
            downloads_dir,
            allowed_extensions: DEFAULT_EXTENSIONS.iter().map(|s| (*s).to_string()).collect(),
            timeout,
            downloaded_this_run: HashSet::new(),
            existing_filenames,
        })
    }

    /// Resolves every `<a href>` in `html` ending in an allowed extension to
    /// an absolute URL not yet downloaded this run.
    #[must_use]
    pub fn extract_file_links(&self, html: &str, base_url: &str) -> Vec<String> {
        let Ok(base) = Url::parse(base_url) else { return Vec::new() };
        let Ok(selector) = Selector::parse("a[href]") else { return Vec::new() };
        let document = Html::parse_document(html);

        let mut links = Vec::new();
        for anchor in document.select(&selector) {
            let Some(href) = anchor.value().attr("href") else { continue };
            if href.is_empty() || href.starts_with("javascript:") || href.starts_with("mailto:") || href.starts_with('#') {
                continue;
            }
            let path_lower = href.split(['?', '#']).next().unwrap_or(href).to_ascii_lowercase();
            if !self.allowed_extensions.iter().any(|ext| path_lower.ends_with(ext.as_str())) {
                continue;
            }
            let Ok(absolute) = base.join(href) else { continue };
            let absolute_str = absolute.to_string();
            if !self.downloaded_this_run.contains(&absolute_str) {
                links.push(absolute_str);
            }
        }
        links
    }

    /// Downloads one URL, skipping it if a same-named file already exists
    /// (same-run or prior-run), streaming the body in 8 KiB chunks.
    pub async fn download_file(&mut self, url: &str) -> anyhow::Result<Option<PathBuf>> {
        if self.downloaded_this_run.contains(url) {
            return Ok(None);
        }

        let parsed = Url::parse(url)?;
        let raw_name = parsed
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .unwrap_or("")
            .to_string();
        let mut filename = sanitize_filename::sanitize(&raw_name);
        if filename.is_empty() {
            filename = format!("download_{}.pdf", self.downloaded_this_run.len());
        }

        if self.existing_filenames.contains(&filename.to_ascii_lowercase()) {
            self.downloaded_this_run.insert(url.to_string());
            return Ok(None);
        }

        let target = self.downloads_dir.join(&filename);
        if target.exists() {
            self.downloaded_this_run.insert(url.to_string());
            self.existing_filenames.insert(filename.to_ascii_lowercase());
            return Ok(None);
        }

        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await?
            .error_for_status()?;

        let mut stream = response.bytes_stream();
        let mut file = tokio::fs::File::create(&target).await?;
        use futures_util::StreamExt;
        while let Some(chunk) = stream.next().await {
            file.write_all(&chunk?).await?;
        }
        file.flush().await?;

        self.downloaded_this_run.insert(url.to_string());
        self.existing_filenames.insert(filename.to_ascii_lowercase());
        Ok(Some(target))
    }

    /// Extracts and downloads every eligible file linked from `html`.
    pub async fn download_all(&mut self, html: &str, base_url: &str) -> Vec<PathBuf> {
        let links = self.extract_file_links(html, base_url);
        let mut downloaded = Vec::new();
        for url in links {
            match self.download_file(&url).await {
                Ok(Some(path)) => downloaded.push(path),
                Ok(None) => {}
                Err(err) => log::warn!("failed to download {url}: {err:#}"),
            }
        }
        downloaded
    }

    #[must_use]
    pub fn download_count(&self) -> usize {
        self.downloaded_this_run.len()
    }

    /// Removes duplicate files by content hash, keeping the oldest (by
    /// creation time) copy of each.
    pub fn deduplicate_files(&mut self) -> anyhow::Result<usize> {
        let mut entries: Vec<(PathBuf, std::time::SystemTime)> = Vec::new();
        for entry in std::fs::read_dir(&self.downloads_dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                let created = entry.metadata()?.created().unwrap_or(std::time::SystemTime::UNIX_EPOCH);
                entries.push((entry.path(), created));
            }
        }
        entries.sort_by_key(|(_, created)| *created);

        let mut seen_hashes: std::collections::HashMap<String, PathBuf> = std::collections::HashMap::new();
        let mut removed = 0;
        for (path, _) in entries {
            let bytes = std::fs::read(&path)?;
            let digest = format!("{:x}", md5::compute(&bytes));
            if seen_hashes.contains_key(&digest) {
                std::fs::remove_file(&path)?;
                removed += 1;
            } else {
                seen_hashes.insert(digest, path);
            }
        }

        self.existing_filenames.clear();
        for entry in std::fs::read_dir(&self.downloads_dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                if let Some(name) = entry.file_name().to_str() {
                    self.existing_filenames.insert(name.to_ascii_lowercase());
                }
            }
        }

        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_downloader() -> (FileDownloader, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let client = reqwest::Client::new();
        let downloader = FileDownloader::new(client, dir.path(), std::time::Duration::from_secs(5)).unwrap();
        (downloader, dir)
    }

    #[test]
    fn extract_file_links_matches_allowed_extensions() {
        let (downloader, _dir) = test_downloader();
        let html = r#"
            <a href="/files/report.pdf">Report</a>
            <a href="/files/sheet.xlsx">Sheet</a>
            <a href="/about">About</a>
            <a href="mailto:x@example.com">Mail</a>
        "#;
        let links = downloader.extract_file_links(html, "https://example.com/");
        assert_eq!(links.len(), 2);
        assert!(links.iter().any(|l| l.ends_with("report.pdf")));
        assert!(links.iter().any(|l| l.ends_with("sheet.xlsx")));
    }

    #[test]
    fn extract_file_links_ignores_query_string_suffix() {
        let (downloader, _dir) = test_downloader();
        let html = r#"<a href="/files/report.pdf?v=2">Report</a>"#;
        let links = downloader.extract_file_links(html, "https://example.com/");
        assert_eq!(links.len(), 1);
    }

    #[tokio::test]
    async fn download_file_skips_existing_filename() {
        let (mut downloader, dir) = test_downloader();
        std::fs::write(dir.path().join("downloads").join("report.pdf"), b"existing").unwrap();
        downloader.existing_filenames.insert("report.pdf".to_string());

        let result = downloader.download_file("https://example.com/files/report.pdf").await.unwrap();
        assert!(result.is_none());
    }
}
