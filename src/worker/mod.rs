//! The offline worker: lifecycle hooks, interception and control messages.

pub mod lifecycle;


use anyhow::Context;
use axum::http::Method;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::config::{Config, ConfigTrait};
use crate::control::ControlCommand;
use crate::metrics;
use crate::model::{CacheKey, RequestDescriptor, StrategyResult};
use crate::registry::{CacheRegistry, InstallError, PartitionRole};
use crate::router::RequestRouter;
use crate::storage::{CacheStorage, PartitionStat};
use crate::strategy::StrategyExecutor;
use crate::upstream::{FetchError, Upstream};

pub use lifecycle::{Lifecycle, LifecycleError, LifecycleSnapshot, WorkerState};

const COMPONENT: &str = "worker";

/// Outcome of offering a request to the worker.
#[derive(Debug)]
pub enum Interception {
    Respond(StrategyResult),
    /// Not handled; the caller goes to the network untouched.
    Passthrough,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum WorkerError {
    #[error("install failed: {0}")]
    Install(#[from] InstallError),
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

/// Event surface of a service worker, wired to HTTP by the adapter layer.
#[async_trait::async_trait]
pub trait ServiceWorker: Send + Sync {
    /// Pre-caches the shell. Failure leaves the worker redundant.
    async fn on_install(&self) -> Result<(), WorkerError>;

    /// Garbage-collects stale partitions, then claims clients. Returns the
    /// number of deleted partitions.
    async fn on_activate(&self) -> Result<usize, WorkerError>;

    async fn on_intercept(&self, req: &RequestDescriptor) -> Result<Interception, FetchError>;

    async fn on_control_message(&self, command: ControlCommand);
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkerSnapshot {
    pub version: String,
    pub state: WorkerState,
    pub controlling: bool,
    pub skip_waiting: bool,
    pub changed_at: DateTime<Utc>,
    pub partitions: Vec<PartitionStat>,
}

pub struct OfflineWorker {
    registry: CacheRegistry,
    router: RequestRouter,
    executor: StrategyExecutor,
    upstream: Arc<dyn Upstream>,
    lifecycle: Lifecycle,
    shell: Vec<RequestDescriptor>,
    skip_waiting_on_install: bool,
    transitions: Mutex<()>,
}

impl OfflineWorker {
    pub fn new(
        cfg: &Config,
        storage: Arc<dyn CacheStorage>,
        upstream: Arc<dyn Upstream>,
    ) -> anyhow::Result<Self> {
        let origin = &cfg.scope().origin;
        let cache = cfg.cache();

        let shell = cache
            .shell
            .iter()
            .map(|path| {
                origin
                    .join(path)
                    .map(RequestDescriptor::get)
                    .with_context(|| format!("resolve shell path {:?}", path))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        let offline_url = origin
            .join(&cache.offline_page)
            .with_context(|| format!("resolve offline page {:?}", cache.offline_page))?;

        let registry = CacheRegistry::new(cache.version.as_str(), storage);
        let executor = StrategyExecutor::new(
            Arc::clone(&upstream),
            registry.partition(PartitionRole::Static),
            CacheKey::new(&Method::GET, &offline_url),
            cfg.network().abort_on_timeout,
        );

        Ok(Self {
            registry,
            router: RequestRouter::from_config(cfg),
            executor,
            upstream,
            lifecycle: Lifecycle::new(),
            shell,
            skip_waiting_on_install: cache.skip_waiting_on_install,
            transitions: Mutex::new(()),
        })
    }

    pub fn registry(&self) -> &CacheRegistry {
        &self.registry
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    pub fn upstream(&self) -> &Arc<dyn Upstream> {
        &self.upstream
    }

    /// Whether the runtime should activate right after install.
    pub fn should_skip_waiting(&self) -> bool {
        self.lifecycle.skip_waiting_requested()
    }

    /// Stops intercepting for good. Partitions are kept.
    pub async fn unregister(&self) -> Result<(), WorkerError> {
        let _guard = self.transitions.lock().await;
        if self.lifecycle.state() == WorkerState::Redundant {
            return Ok(());
        }
        self.lifecycle.transition(WorkerState::Redundant)?;
        info!(component = COMPONENT, event = "unregistered", version = self.registry.version(), "worker unregistered");
        Ok(())
    }

    pub fn snapshot(&self) -> WorkerSnapshot {
        let lifecycle = self.lifecycle.snapshot();
        let partitions = self.registry.storage().stat();
        metrics::set_partition_stats(&partitions);
        WorkerSnapshot {
            version: self.registry.version().to_string(),
            state: lifecycle.state,
            controlling: lifecycle.controlling,
            skip_waiting: lifecycle.skip_waiting,
            changed_at: lifecycle.changed_at,
            partitions,
        }
    }

    /// Activation body; callers hold the transitions lock.
    fn activate_locked(&self) -> Result<usize, WorkerError> {
        self.lifecycle.transition(WorkerState::Activating)?;

        // Collection completes before clients are claimed.
        let deleted = self.registry.collect_garbage();
        metrics::add_partitions_deleted(deleted.len() as u64);

        self.lifecycle.transition(WorkerState::Activated)?;
        self.lifecycle.claim();

        info!(
            component = COMPONENT,
            event = "activated",
            version = self.registry.version(),
            deleted = deleted.len(),
            "worker activated and controlling clients"
        );
        Ok(deleted.len())
    }
}

#[async_trait::async_trait]
impl ServiceWorker for OfflineWorker {
    async fn on_install(&self) -> Result<(), WorkerError> {
        let _guard = self.transitions.lock().await;
        self.lifecycle.transition(WorkerState::Installing)?;

        match self.registry.install(self.upstream.as_ref(), &self.shell).await {
            Ok(n) => {
                self.lifecycle.transition(WorkerState::Installed)?;
                if self.skip_waiting_on_install {
                    self.lifecycle.request_skip_waiting();
                }
                info!(component = COMPONENT, event = "installed", version = self.registry.version(), assets = n, "worker installed");
                Ok(())
            }
            Err(err) => {
                error!(component = COMPONENT, event = "install_failed", version = self.registry.version(), error = %err, "worker install failed");
                self.lifecycle.transition(WorkerState::Redundant)?;
                Err(err.into())
            }
        }
    }

    async fn on_activate(&self) -> Result<usize, WorkerError> {
        let _guard = self.transitions.lock().await;
        self.activate_locked()
    }

    async fn on_intercept(&self, req: &RequestDescriptor) -> Result<Interception, FetchError> {
        if !self.lifecycle.is_intercepting() {
            return Ok(Interception::Passthrough);
        }
        let Some(route) = self.router.classify(req) else {
            return Ok(Interception::Passthrough);
        };

        let partition = self.registry.partition(route.role);
        self.executor
            .execute(req, route, partition)
            .await
            .map(Interception::Respond)
    }

    async fn on_control_message(&self, command: ControlCommand) {
        match command {
            ControlCommand::SkipWaiting => {
                let _guard = self.transitions.lock().await;
                self.lifecycle.request_skip_waiting();
                info!(component = COMPONENT, event = "skip_waiting", state = self.lifecycle.state().as_str(), "skip waiting requested");
                if self.lifecycle.state() == WorkerState::Installed {
                    if let Err(err) = self.activate_locked() {
                        error!(component = COMPONENT, error = %err, "activation after skip waiting failed");
                    }
                }
            }
            ControlCommand::ClearCache => {
                let deleted = self.registry.clear_all();
                metrics::add_partitions_deleted(deleted as u64);
                info!(component = COMPONENT, event = "clear_cache", deleted = deleted, "all partitions deleted");
            }
            ControlCommand::Unknown => {
                info!(component = COMPONENT, event = "unknown_message", "ignored unknown control message");
            }
        }
    }
}
