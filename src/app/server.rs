// HTTP server assembly for the proxy application.

use anyhow::Result;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::config::{Config, ConfigTrait};
use crate::controller;
use crate::http::{Controller, HttpServer, Middleware};
use crate::middleware::{PanicRecoverMiddleware, TraceMiddleware};
use crate::worker::OfflineWorker;

/// Composes the server from controllers and middlewares.
pub fn make_http_server(
    ctx: CancellationToken,
    cfg: &Config,
    worker: Arc<OfflineWorker>,
) -> Result<Arc<HttpServer>> {
    let proxy: Box<dyn Controller> = Box::new(controller::InterceptController::new(
        Arc::clone(&worker),
        cfg.scope().origin.clone(),
    ));
    HttpServer::new(
        ctx.clone(),
        cfg.clone(),
        admin_controllers(ctx, cfg, worker),
        proxy,
        middlewares(),
    )
}

/// Routes under `/shellcache`, served only to requests addressed to the proxy.
fn admin_controllers(ctx: CancellationToken, cfg: &Config, worker: Arc<OfflineWorker>) -> Vec<Box<dyn Controller>> {
    let mut list: Vec<Box<dyn Controller>> = vec![
        // Healthcheck probe endpoint
        Box::new(controller::LivenessProbeController::new(ctx)),
        // Page-to-worker messages (SKIP_WAITING, CLEAR_CACHE)
        Box::new(controller::ControlMessageController::new(worker.clone())),
        // Unregisters the worker, keeping partitions
        Box::new(controller::UnregisterController::new(worker.clone())),
        // Version, lifecycle state and partition sizes
        Box::new(controller::StateController::new(worker)),
    ];
    if cfg.is_metrics_enabled() {
        list.push(Box::new(controller::PrometheusMetricsController::new()));
    }
    list
}

/// Returns the request middlewares, executed in listed order.
fn middlewares() -> Vec<Box<dyn Middleware>> {
    vec![
        // Exec first - panic recovery
        Box::new(PanicRecoverMiddleware::new()),
        // Exec second - request spans
        Box::new(TraceMiddleware::new()),
    ]
}
