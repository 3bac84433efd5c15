// Package api provides the control channel and unregister endpoints.

use axum::{
    body::Bytes,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use std::sync::Arc;
use tracing::warn;

use crate::control::ControlCommand;
use crate::http::Controller;
use crate::worker::{OfflineWorker, ServiceWorker};

pub const MESSAGE_PATH: &str = "/shellcache/message";
pub const UNREGISTER_PATH: &str = "/shellcache/unregister";

/// Accepts `{"type": ...}` messages; the command is applied before answering 202.
#[derive(Clone)]
pub struct ControlMessageController {
    worker: Arc<OfflineWorker>,
}

impl ControlMessageController {
    pub fn new(worker: Arc<OfflineWorker>) -> Self {
        Self { worker }
    }

    async fn message(&self, body: Bytes) -> Response {
        match ControlCommand::parse(&body) {
            Ok(command) => {
                self.worker.on_control_message(command).await;
                StatusCode::ACCEPTED.into_response()
            }
            Err(e) => {
                warn!(component = "control", error = %e, "malformed control message");
                (StatusCode::BAD_REQUEST, format!("malformed control message: {}", e)).into_response()
            }
        }
    }
}

impl Controller for ControlMessageController {
    fn add_route(&self, router: Router) -> Router {
        let controller = self.clone();
        router.route(
            MESSAGE_PATH,
            post(move |body: Bytes| {
                let controller = controller.clone();
                async move { controller.message(body).await }
            }),
        )
    }
}

#[derive(Clone)]
pub struct UnregisterController {
    worker: Arc<OfflineWorker>,
}

impl UnregisterController {
    pub fn new(worker: Arc<OfflineWorker>) -> Self {
        Self { worker }
    }

    async fn unregister(&self) -> Response {
        match self.worker.unregister().await {
            Ok(()) => StatusCode::ACCEPTED.into_response(),
            Err(e) => (StatusCode::CONFLICT, e.to_string()).into_response(),
        }
    }
}

impl Controller for UnregisterController {
    fn add_route(&self, router: Router) -> Router {
        let controller = self.clone();
        router.route(
            UNREGISTER_PATH,
            post(move || {
                let controller = controller.clone();
                async move { controller.unregister().await }
            }),
        )
    }
}
