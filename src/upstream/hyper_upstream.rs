//! Hyper-based network fetches.

use http_body_util::{BodyExt, Empty, Full};
use hyper::{Request, Uri};
use std::time::Duration;
use tokio::time::timeout;
use url::Url;

use super::headers::{forwardable_request_headers, process_response_headers};
use super::{FetchError, Upstream};
use crate::config::{Config, ConfigTrait};
use crate::http::client::{create_client, HyperClient};
use crate::model::{RequestDescriptor, ResponseSnapshot};

/// Fetches same-origin requests from the app shell upstream and everything
/// else from its own host.
pub struct HyperUpstream {
    client: HyperClient,
    origin: Url,
    upstream: Url,
    max_timeout: Duration,
}

impl HyperUpstream {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        Ok(Self {
            client: create_client()?,
            origin: cfg.scope().origin.clone(),
            upstream: cfg.scope().upstream.clone(),
            max_timeout: cfg.network().max_timeout,
        })
    }

    /// Resolves the URL actually dialed for a request.
    pub fn target(&self, req: &RequestDescriptor) -> Url {
        if !req.is_same_origin(&self.origin) {
            return req.url.clone();
        }
        let mut target = self.upstream.clone();
        target.set_path(req.url.path());
        target.set_query(req.url.query());
        target
    }
}

#[async_trait::async_trait]
impl Upstream for HyperUpstream {
    async fn fetch(&self, req: &RequestDescriptor) -> Result<ResponseSnapshot, FetchError> {
        let target = self.target(req);
        let uri: Uri = target
            .as_str()
            .parse()
            .map_err(|e: hyper::http::uri::InvalidUri| FetchError::InvalidRequest(e.to_string()))?;

        let mut builder = Request::builder().method(req.method.clone()).uri(uri);
        for (name, value) in forwardable_request_headers(&req.headers) {
            builder = builder.header(name, value);
        }

        let body = match req.body.clone() {
            Some(bytes) => Full::new(bytes)
                .map_err(|never: std::convert::Infallible| match never {})
                .boxed(),
            None => Empty::new()
                .map_err(|never: std::convert::Infallible| match never {})
                .boxed(),
        };
        let request = builder
            .body(body)
            .map_err(|e| FetchError::InvalidRequest(e.to_string()))?;

        let exchange = async {
            let response = self
                .client
                .request(request)
                .await
                .map_err(|e| FetchError::Transport(e.to_string()))?;
            let status = response.status().as_u16();
            let headers = process_response_headers(response.headers());
            let body = response
                .into_body()
                .collect()
                .await
                .map_err(|e| FetchError::Transport(e.to_string()))?
                .to_bytes();
            Ok::<_, FetchError>(ResponseSnapshot::new(status, headers, body))
        };

        match timeout(self.max_timeout, exchange).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    component = "upstream",
                    url = %target,
                    timeout = ?self.max_timeout,
                    "request timed out"
                );
                Err(FetchError::Timeout(self.max_timeout))
            }
        }
    }
}
