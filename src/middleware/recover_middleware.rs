//! Panic recovery middleware.

use axum::{
    body::Body,
    http::{Response, StatusCode},
};
use std::any::Any;
use tower_http::catch_panic::CatchPanicLayer;
use tracing::error;

use crate::metrics;

fn on_panic(err: Box<dyn Any + Send + 'static>) -> Response<Body> {
    metrics::inc_panics();

    let details = if let Some(s) = err.downcast_ref::<String>() {
        s.as_str()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s
    } else {
        "unknown panic payload"
    };
    error!(component = "server", event = "panic_recovered", details = details, "handler panicked");

    let mut response = Response::new(Body::from("internal server error"));
    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    response
}

/// PanicRecoverMiddleware turns handler panics into 500 responses.
#[derive(Default)]
pub struct PanicRecoverMiddleware;

impl PanicRecoverMiddleware {
    pub fn new() -> Self {
        Self
    }
}

impl crate::middleware::middleware::Middleware for PanicRecoverMiddleware {
    fn apply(&self, router: axum::Router) -> axum::Router {
        router.layer(CatchPanicLayer::custom(on_panic))
    }
}
