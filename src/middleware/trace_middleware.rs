//! Request tracing middleware.

use tower_http::trace::TraceLayer;

/// Emits a span per request with method and URI.
#[derive(Default)]
pub struct TraceMiddleware;

impl TraceMiddleware {
    pub fn new() -> Self {
        Self
    }
}

impl crate::middleware::middleware::Middleware for TraceMiddleware {
    fn apply(&self, router: axum::Router) -> axum::Router {
        router.layer(TraceLayer::new_for_http())
    }
}
