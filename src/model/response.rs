// Package model provides the buffered response representation shared by storage and strategies.

use bytes::Bytes;

/// Response headers scoped to one client; dropped from partition copies.
const PRIVATE_HEADERS: &[&str] = &["set-cookie", "set-cookie2"];

/// Fully buffered upstream or cached response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseSnapshot {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl ResponseSnapshot {
    pub fn new(status: u16, headers: Vec<(String, String)>, body: Bytes) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Synthesized answer used when the network failed and no offline page is cached.
    pub fn offline() -> Self {
        Self::new(
            503,
            vec![("content-type".to_string(), "text/plain".to_string())],
            Bytes::from_static(b"Offline"),
        )
    }

    /// Only plain 200 responses are written to partitions.
    pub fn is_cacheable(&self) -> bool {
        self.status == 200
    }

    /// Copy fit for a shared partition: per-client cookies are not stored.
    pub fn without_private_headers(&self) -> Self {
        let headers = self
            .headers
            .iter()
            .filter(|(name, _)| !PRIVATE_HEADERS.iter().any(|p| p.eq_ignore_ascii_case(name)))
            .cloned()
            .collect();
        Self::new(self.status, headers, self.body.clone())
    }

    /// Approximate footprint used for quota accounting.
    pub fn size(&self) -> usize {
        self.body.len()
            + self
                .headers
                .iter()
                .map(|(k, v)| k.len() + v.len())
                .sum::<usize>()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Where the bytes of a response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    Cache,
    Network,
    Offline,
    Synthesized,
    Passthrough,
}

impl ResponseSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseSource::Cache => "cache",
            ResponseSource::Network => "network",
            ResponseSource::Offline => "offline",
            ResponseSource::Synthesized => "synthesized",
            ResponseSource::Passthrough => "passthrough",
        }
    }
}

#[derive(Debug, Clone)]
pub struct StrategyResult {
    pub response: ResponseSnapshot,
    pub source: ResponseSource,
}

impl StrategyResult {
    pub fn new(response: ResponseSnapshot, source: ResponseSource) -> Self {
        Self { response, source }
    }
}
