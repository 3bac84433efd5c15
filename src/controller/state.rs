// Package api provides worker state introspection.

use axum::{routing::get, Json, Router};
use std::sync::Arc;

use crate::http::Controller;
use crate::worker::{OfflineWorker, WorkerSnapshot};

pub const STATE_PATH: &str = "/shellcache/state";

/// Version, lifecycle state and per-partition sizes as JSON.
#[derive(Clone)]
pub struct StateController {
    worker: Arc<OfflineWorker>,
}

impl StateController {
    pub fn new(worker: Arc<OfflineWorker>) -> Self {
        Self { worker }
    }

    fn state(&self) -> Json<WorkerSnapshot> {
        Json(self.worker.snapshot())
    }
}

impl Controller for StateController {
    fn add_route(&self, router: Router) -> Router {
        let controller = self.clone();
        router.route(
            STATE_PATH,
            get(move || {
                let controller = controller.clone();
                async move { controller.state() }
            }),
        )
    }
}
