//! Deduplicated, persistent FIFO of URLs awaiting crawl.
//!
//! [`Frontier`] is the single shared queue threaded through the orchestrator.
//! Every canonical URL is enqueued at most once for the lifetime of a run; a
//! periodic checkpoint lets a later process resume with the same seen-set.

use std::collections::{HashSet, VecDeque};
use std::path::Path;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::url_canon;

/// One unit of crawl work: a canonical URL and its distance from the seed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FrontierItem {
    pub url: String,
    pub depth: u32,
}

#[derive(Default)]
struct Inner {
    queue: VecDeque<FrontierItem>,
    seen: HashSet<String>,
}

/// Thread-safe deduplicating FIFO. All operations canonicalize their input
/// URL before touching the seen-set, so callers may pass raw discovered
/// hrefs directly.
pub struct Frontier {
    inner: Mutex<Inner>,
}

/// On-disk snapshot shape, matching the checkpoint file described in the
/// output layout (`crawler_state.json`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Checkpoint {
    pub visited: Vec<String>,
    pub queue: Vec<String>,
    pub content_hashes: Vec<String>,
}

impl Default for Frontier {
    fn default() -> Self {
        Self::new()
    }
}

impl Frontier {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Rebuild a frontier from a checkpoint: seen = visited ∪ queue, but only
    /// `queue` entries (not yet visited) are re-enqueued for another pass.
    #[must_use]
    pub fn from_checkpoint(checkpoint: &Checkpoint) -> Self {
        let frontier = Self::new();
        {
            let mut inner = frontier.inner.lock();
            for url in &checkpoint.visited {
                inner.seen.insert(url.clone());
            }
            for url in &checkpoint.queue {
                if inner.seen.insert(url.clone()) {
                    inner.queue.push_back(FrontierItem { url: url.clone(), depth: 0 });
                }
            }
        }
        frontier
    }

    /// Canonicalize `url`; if not already seen, enqueue at `depth` and return
    /// `true`. Returns `false` (without error) if the URL fails to
    /// canonicalize or was already seen.
    pub fn add(&self, url: &str, depth: u32) -> bool {
        let Ok(canonical) = url_canon::canonicalize(url) else {
            return false;
        };
        let mut inner = self.inner.lock();
        if inner.seen.insert(canonical.clone()) {
            inner.queue.push_back(FrontierItem { url: canonical, depth });
            true
        } else {
            false
        }
    }

    /// Record a URL as seen without enqueueing it (used for the seed URL and
    /// for URLs skipped before they would otherwise be re-discovered).
    pub fn mark_seen(&self, url: &str) {
        if let Ok(canonical) = url_canon::canonicalize(url) {
            self.inner.lock().seen.insert(canonical);
        }
    }

    /// Pop the oldest queued item, if any.
    pub fn pop(&self) -> Option<FrontierItem> {
        self.inner.lock().queue.pop_front()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().queue.is_empty()
    }

    #[must_use]
    pub fn seen_count(&self) -> usize {
        self.inner.lock().seen.len()
    }

    /// Snapshot the currently-queued URLs, for checkpointing.
    #[must_use]
    pub fn queued_urls(&self) -> Vec<String> {
        self.inner.lock().queue.iter().map(|i| i.url.clone()).collect()
    }

    /// Read a checkpoint from `path`. Returns `Ok(None)` if the file does not
    /// exist, so a missing checkpoint always means starting fresh.
    pub fn load_checkpoint(path: &Path) -> anyhow::Result<Option<Checkpoint>> {
        if !path.exists() {
            return Ok(None);
        }
        let data = std::fs::read_to_string(path)?;
        let checkpoint: Checkpoint = serde_json::from_str(&data)?;
        Ok(Some(checkpoint))
    }

    /// Write a checkpoint atomically: serialize to a tempfile in the same
    /// directory, then rename over the target.
    pub fn write_checkpoint(path: &Path, checkpoint: &Checkpoint) -> anyhow::Result<()> {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(parent)?;
        let json = serde_json::to_string_pretty(checkpoint)?;
        let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
        use std::io::Write;
        tmp.write_all(json.as_bytes())?;
        tmp.persist(path)?;
        Ok(())
    }
}
