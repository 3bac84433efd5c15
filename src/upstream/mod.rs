//! Network collaborator: the trait the strategies fetch through and its hyper implementation.

pub mod headers;
mod hyper_upstream;


use std::time::Duration;

use crate::model::{RequestDescriptor, ResponseSnapshot};

pub use hyper_upstream::HyperUpstream;

/// A rejected fetch. Any HTTP status, including 4xx/5xx, resolves instead.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("network deadline of {0:?} exceeded")]
    Timeout(Duration),
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("fetch aborted")]
    Aborted,
}

/// Performs network fetches on behalf of intercepted requests.
#[async_trait::async_trait]
pub trait Upstream: Send + Sync + 'static {
    async fn fetch(&self, req: &RequestDescriptor) -> Result<ResponseSnapshot, FetchError>;
}
