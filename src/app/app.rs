// Package app wires storage, upstream, worker and the HTTP server together.

use anyhow::Result;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::app::server::make_http_server;
use crate::config::{Config, ConfigTrait};
use crate::http::{HttpServer, Server};
use crate::storage::{CacheStorage, Dumper, MemoryStorage, PartitionDumper};
use crate::upstream::{HyperUpstream, Upstream};
use crate::worker::{OfflineWorker, ServiceWorker};

/// Main application.
#[derive(Clone)]
pub struct App {
    cfg: Config,
    shutdown_token: CancellationToken,
    worker: Arc<OfflineWorker>,
    dumper: Option<Arc<PartitionDumper>>,
    server: Arc<HttpServer>,
}

impl App {
    /// Creates the application with the hyper-backed upstream.
    pub fn new(shutdown_token: CancellationToken, cfg: Config) -> Result<Self> {
        let upstream: Arc<dyn Upstream> = Arc::new(HyperUpstream::new(&cfg)?);
        Self::with_upstream(shutdown_token, cfg, upstream)
    }

    pub fn with_upstream(
        shutdown_token: CancellationToken,
        cfg: Config,
        upstream: Arc<dyn Upstream>,
    ) -> Result<Self> {
        let storage: Arc<dyn CacheStorage> =
            Arc::new(MemoryStorage::new(cfg.cache().max_partition_bytes));

        let dumper = match cfg.persistence() {
            Some(p) if p.enabled => Some(PartitionDumper::new(p, Arc::clone(&storage))?),
            _ => None,
        };

        let worker = Arc::new(OfflineWorker::new(&cfg, storage, upstream)?);
        let server = make_http_server(shutdown_token.clone(), &cfg, Arc::clone(&worker))?;

        Ok(Self {
            cfg,
            shutdown_token,
            worker,
            dumper,
            server,
        })
    }

    pub fn worker(&self) -> &Arc<OfflineWorker> {
        &self.worker
    }

    /// Restores persisted partitions, then installs the worker.
    pub async fn start(&self) {
        if let Some(dumper) = &self.dumper {
            match dumper.load(self.shutdown_token.clone()).await {
                Ok(stats) => info!(
                    component = "app",
                    event = "dump_loaded",
                    partitions = stats.partitions,
                    entries = stats.entries,
                    skipped = stats.skipped,
                    "restored cache partitions"
                ),
                Err(e) => warn!(component = "app", event = "dump_load_failed", error = %e, "starting with empty cache"),
            }
        }
        self.start_worker().await;
    }

    async fn start_worker(&self) {
        if let Err(e) = self.worker.on_install().await {
            error!(
                component = "app",
                event = "install_failed",
                version = %self.cfg.cache().version,
                error = %e,
                "worker is redundant, all traffic passes through"
            );
            return;
        }
        if !self.worker.should_skip_waiting() {
            info!(component = "app", event = "waiting", "worker installed, waiting for SKIP_WAITING");
            return;
        }
        match self.worker.on_activate().await {
            Ok(deleted) => info!(
                component = "app",
                event = "activated",
                version = %self.cfg.cache().version,
                partitions_deleted = deleted,
                "worker activated"
            ),
            Err(e) => error!(component = "app", event = "activate_failed", error = %e, "worker activation failed"),
        }
    }

    /// Serves on the configured port until cancellation.
    pub async fn serve(&self) -> Result<()> {
        self.start().await;
        let result = self.server.listen_and_serve().await;
        self.close().await;
        result
    }

    /// Serves on an already bound listener until cancellation.
    pub async fn serve_on(&self, listener: TcpListener) -> Result<()> {
        self.start().await;
        let result = self.server.serve_on(listener).await;
        self.close().await;
        result
    }

    /// Dumps partitions if persistence is enabled.
    pub async fn close(&self) {
        self.shutdown_token.cancel();
        let Some(dumper) = &self.dumper else {
            return;
        };
        match dumper.dump(CancellationToken::new()).await {
            Ok(stats) => info!(
                component = "app",
                event = "dump_written",
                partitions = stats.partitions,
                entries = stats.entries,
                "cache partitions dumped"
            ),
            Err(e) => error!(component = "app", event = "dump_failed", error = %e, "failed to dump cache partitions"),
        }
    }
}
