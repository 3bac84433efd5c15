// Package api provides liveness probe controller.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tokio_util::sync::CancellationToken;

use crate::http::Controller;

pub const PROBE_PATH: &str = "/shellcache/healthz";

const SUCCESS_RESPONSE: &str = r#"{
  "status": 200,
  "message": "alive"
}"#;

const FAILED_RESPONSE: &str = r#"{
  "status": 503,
  "message": "shutting down"
}"#;

/// Alive until shutdown has been requested.
#[derive(Clone)]
pub struct LivenessProbeController {
    shutdown_token: CancellationToken,
}

impl LivenessProbeController {
    pub fn new(shutdown_token: CancellationToken) -> Self {
        Self { shutdown_token }
    }

    fn probe(&self) -> Response {
        let status = if self.shutdown_token.is_cancelled() {
            (StatusCode::SERVICE_UNAVAILABLE, FAILED_RESPONSE)
        } else {
            (StatusCode::OK, SUCCESS_RESPONSE)
        };
        (status.0, [("content-type", "application/json")], status.1).into_response()
    }
}

impl Controller for LivenessProbeController {
    fn add_route(&self, router: Router) -> Router {
        let probe_controller = self.clone();
        router.route(
            PROBE_PATH,
            get(move || {
                let controller = probe_controller.clone();
                async move { controller.probe() }
            }),
        )
    }
}
