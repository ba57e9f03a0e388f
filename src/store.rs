//! Writes one Markdown file per crawled page, with a YAML front-matter
//! block carrying source metadata, atomically via a same-directory temp
//! file + rename — the pattern in `content_saver/compression.rs`'s
//! uncompressed branch.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::url_canon;

const MAX_FRONT_MATTER_HEADINGS: usize = 10;

#[derive(Debug, Serialize)]
struct FrontMatter {
    source_url: String,
    title: String,
    crawl_timestamp: String,
    content_hash: String,
    word_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    headings: Option<Vec<String>>,
}

pub struct PageStore {
    output_dir: PathBuf,
}

/// Outcome of a single page save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved(PathBuf),
    /// Content hash matched the file already on disk; nothing written.
    Unchanged(PathBuf),
}

impl PageStore {
    #[must_use]
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self { output_dir: output_dir.into() }
    }

    /// Writes `body` (already-converted annotated text) to a file derived
    /// from `url`, preceded by a YAML front-matter block. If a file at the
    /// computed path already carries `content_hash`, the write is skipped.
    pub fn save(
        &self,
        url: &str,
        title: &str,
        body: &str,
        content_hash: &str,
        word_count: usize,
        headings: &[String],
        crawl_timestamp: &str,
    ) -> anyhow::Result<SaveOutcome> {
        std::fs::create_dir_all(&self.output_dir)?;

        let path = self.path_for(url)?;

        if let Some(existing_hash) = read_front_matter_hash(&path) {
            if existing_hash == content_hash {
                return Ok(SaveOutcome::Unchanged(path));
            }
        }

        let front_matter = FrontMatter {
            source_url: url.to_string(),
            title: title.to_string(),
            crawl_timestamp: crawl_timestamp.to_string(),
            content_hash: content_hash.to_string(),
            word_count,
            headings: if headings.is_empty() || headings.len() > MAX_FRONT_MATTER_HEADINGS {
                None
            } else {
                Some(headings.to_vec())
            },
        };

        let yaml = serde_yaml::to_string(&front_matter)?;
        let mut contents = String::with_capacity(yaml.len() + body.len() + 16);
        contents.push_str("---\n");
        contents.push_str(&yaml);
        contents.push_str("---\n\n");
        contents.push_str(body);

        write_atomic(&path, contents.as_bytes())?;
        Ok(SaveOutcome::Saved(path))
    }

    /// Derives the output path for `url`, disambiguating collisions between
    /// distinct URLs that hash to the same filename by appending `-2`,
    /// `-3`, ... before the extension (resolved Open Question (c)).
    fn path_for(&self, url: &str) -> anyhow::Result<PathBuf> {
        let base_name = url_canon::to_filename(url, 200);
        let mut candidate = self.output_dir.join(format!("{base_name}.md"));
        let mut suffix = 2;
        while candidate.exists() {
            if path_source_url(&candidate).as_deref() == Some(url) {
                break;
            }
            candidate = self.output_dir.join(format!("{base_name}-{suffix}.md"));
            suffix += 1;
        }
        Ok(candidate)
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent)?;
    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(bytes)?;
    tmp.persist(path)?;
    Ok(())
}

/// Reads just enough of an existing page file to compare its stored
/// `content_hash`, without parsing the whole front matter.
fn read_front_matter_hash(path: &Path) -> Option<String> {
    let contents = std::fs::read_to_string(path).ok()?;
    let front_matter = contents.strip_prefix("---\n")?;
    let end = front_matter.find("---\n")?;
    let yaml = &front_matter[..end];
    for line in yaml.lines() {
        if let Some(value) = line.strip_prefix("content_hash:") {
            return Some(value.trim().to_string());
        }
    }
    None
}

fn path_source_url(path: &Path) -> Option<String> {
    let contents = std::fs::read_to_string(path).ok()?;
    let front_matter = contents.strip_prefix("---\n")?;
    let end = front_matter.find("---\n")?;
    let yaml = &front_matter[..end];
    for line in yaml.lines() {
        if let Some(value) = line.strip_prefix("source_url:") {
            return Some(value.trim().to_string());
        }
    }
    None
}
