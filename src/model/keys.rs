// Package model provides cache key normalization.

use axum::http::Method;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use url::Url;
use xxhash_rust::xxh3::xxh3_64;

/// Normalized request descriptor used as a partition key: `METHOD url-without-fragment`.
///
/// Equality compares the raw form; hashing uses a precomputed xxh3 digest so
/// map lookups never rehash the URL.
#[derive(Debug, Clone, Eq)]
pub struct CacheKey {
    hash: u64,
    raw: Arc<str>,
}

impl CacheKey {
    /// Builds the key for a request.
    pub fn new(method: &Method, url: &Url) -> Self {
        let mut url = url.clone();
        url.set_fragment(None);
        Self::from_raw(format!("{} {}", method.as_str(), url.as_str()))
    }

    /// Rebuilds a key from its raw form (as stored in dumps).
    pub fn from_raw(raw: impl Into<String>) -> Self {
        let raw: String = raw.into();
        Self {
            hash: xxh3_64(raw.as_bytes()),
            raw: Arc::from(raw),
        }
    }

    /// Gets the raw key.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Gets the 64-bit digest of the raw key.
    pub fn digest(&self) -> u64 {
        self.hash
    }
}

impl PartialEq for CacheKey {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash && self.raw == other.raw
    }
}

impl Hash for CacheKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
