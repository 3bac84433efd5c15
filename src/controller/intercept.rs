// Package api provides the catch-all handler that offers traffic to the worker.

use axum::{extract::Request, response::Response, Router};
use std::sync::Arc;
use url::Url;

use crate::dedlog;
use crate::http::render::{write_fetch_error, write_snapshot};
use crate::http::request::descriptor_from_request;
use crate::http::Controller;
use crate::metrics;
use crate::model::ResponseSource;
use crate::upstream::{FetchError, Upstream};
use crate::worker::{Interception, OfflineWorker, ServiceWorker};

/// Adapter between HTTP traffic and `ServiceWorker::on_intercept`.
///
/// Registered as the router fallback so every path outside the admin prefix
/// reaches it, whatever the method.
#[derive(Clone)]
pub struct InterceptController {
    worker: Arc<OfflineWorker>,
    upstream: Arc<dyn Upstream>,
    origin: Url,
}

impl InterceptController {
    pub fn new(worker: Arc<OfflineWorker>, origin: Url) -> Self {
        let upstream = Arc::clone(worker.upstream());
        Self {
            worker,
            upstream,
            origin,
        }
    }

    async fn handle(&self, req: Request) -> Response {
        let descriptor = match descriptor_from_request(req, &self.origin).await {
            Ok(d) => d,
            Err(e) => {
                return write_fetch_error(&FetchError::InvalidRequest(e.to_string()));
            }
        };

        let outcome = match self.worker.on_intercept(&descriptor).await {
            Ok(Interception::Respond(result)) => Ok((result.response, result.source)),
            Ok(Interception::Passthrough) => self
                .upstream
                .fetch(&descriptor)
                .await
                .map(|response| (response, ResponseSource::Passthrough)),
            Err(err) => Err(err),
        };

        match outcome {
            Ok((response, source)) => {
                metrics::inc_requests(source);
                write_snapshot(&response, source)
            }
            Err(err) => {
                dedlog::err(Some(&err), Some(descriptor.url.as_str()), "request failed without fallback");
                write_fetch_error(&err)
            }
        }
    }
}

impl Controller for InterceptController {
    fn add_route(&self, router: Router) -> Router {
        let controller = self.clone();
        router.fallback(move |req: Request| {
            let controller = controller.clone();
            async move { controller.handle(req).await }
        })
    }
}
