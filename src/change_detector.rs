//! Content-identity hashing used to skip redundant writes.

use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 of `body`'s UTF-8 bytes.
#[must_use]
pub fn hash(body: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body.as_bytes());
    hex::encode(hasher.finalize())
}

/// Whether `new_body`'s hash differs from `stored_hash`. A missing stored
/// hash always counts as changed.
#[must_use]
pub fn has_changed(stored_hash: Option<&str>, new_body: &str) -> bool {
    match stored_hash {
        Some(existing) => existing != hash(new_body),
        None => true,
    }
}
