//! Cache-first and network-first execution against a partition.

#[cfg(test)]
mod strategy_test;

use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::dedlog;
use crate::metrics;
use crate::model::{CacheKey, RequestDescriptor, ResponseSnapshot, ResponseSource, StrategyResult};
use crate::router::{Route, Strategy};
use crate::storage::Partition;
use crate::upstream::{FetchError, Upstream};

/// Runs a routed request against its partition and the network.
///
/// Cache writes are spawned and never delay or alter the returned response.
#[derive(Clone)]
pub struct StrategyExecutor {
    upstream: Arc<dyn Upstream>,
    offline_partition: Partition,
    offline_key: CacheKey,
    abort_on_timeout: bool,
}

impl StrategyExecutor {
    /// `offline_partition` and `offline_key` locate the pre-cached offline page.
    pub fn new(
        upstream: Arc<dyn Upstream>,
        offline_partition: Partition,
        offline_key: CacheKey,
        abort_on_timeout: bool,
    ) -> Self {
        Self {
            upstream,
            offline_partition,
            offline_key,
            abort_on_timeout,
        }
    }

    pub async fn execute(
        &self,
        req: &RequestDescriptor,
        route: Route,
        partition: Partition,
    ) -> Result<StrategyResult, FetchError> {
        match route.strategy {
            Strategy::CacheFirst => self.cache_first(req, partition).await,
            Strategy::NetworkFirst { timeout } => self.network_first(req, partition, timeout).await,
        }
    }

    /// Serves a cached entry without any freshness check, else fetches and stores.
    pub async fn cache_first(
        &self,
        req: &RequestDescriptor,
        partition: Partition,
    ) -> Result<StrategyResult, FetchError> {
        let key = req.cache_key();
        if let Some(hit) = partition.lookup(&key) {
            metrics::inc_hits();
            return Ok(StrategyResult::new(hit, ResponseSource::Cache));
        }
        metrics::inc_misses();
        metrics::inc_network_fetches();

        match self.upstream.fetch(req).await {
            Ok(response) => {
                if response.is_cacheable() {
                    persist(partition, key, response.clone());
                }
                Ok(StrategyResult::new(response, ResponseSource::Network))
            }
            Err(err) => {
                metrics::inc_network_errors();
                dedlog::err(Some(&err), Some(partition.name()), "cache-first fetch rejected");
                if req.is_navigation() {
                    Ok(self.offline_fallback())
                } else {
                    Err(err)
                }
            }
        }
    }

    /// Races the network against `timeout` and falls back to the partition.
    ///
    /// The fetch runs as its own task. A fetch that loses the race keeps
    /// running and still stores a 200 response, unless `abort_on_timeout` is set.
    pub async fn network_first(
        &self,
        req: &RequestDescriptor,
        partition: Partition,
        timeout: Duration,
    ) -> Result<StrategyResult, FetchError> {
        let key = req.cache_key();
        metrics::inc_network_fetches();

        let mut fetch = {
            let upstream = Arc::clone(&self.upstream);
            let req = req.clone();
            let partition = partition.clone();
            let key = key.clone();
            tokio::spawn(async move {
                let result = upstream.fetch(&req).await;
                if let Ok(response) = &result {
                    if response.is_cacheable() {
                        persist(partition, key, response.clone());
                    }
                }
                result
            })
        };

        let err = tokio::select! {
            joined = &mut fetch => match joined {
                Ok(Ok(response)) => return Ok(StrategyResult::new(response, ResponseSource::Network)),
                Ok(Err(err)) => {
                    metrics::inc_network_errors();
                    dedlog::err(Some(&err), Some(partition.name()), "network-first fetch rejected");
                    err
                }
                Err(join_err) => {
                    metrics::inc_network_errors();
                    FetchError::Transport(format!("fetch task failed: {}", join_err))
                }
            },
            _ = tokio::time::sleep(timeout) => {
                metrics::inc_network_timeouts();
                if self.abort_on_timeout {
                    fetch.abort();
                }
                debug!(component = "strategy", url = %req.url, timeout = ?timeout, "network lost the race");
                FetchError::Timeout(timeout)
            }
        };

        if let Some(cached) = partition.lookup(&key) {
            metrics::inc_hits();
            return Ok(StrategyResult::new(cached, ResponseSource::Cache));
        }
        metrics::inc_misses();

        if req.is_navigation() {
            return Ok(self.offline_fallback());
        }
        Err(err)
    }

    /// The pre-cached offline page, or a synthesized 503 when it is missing.
    pub fn offline_fallback(&self) -> StrategyResult {
        metrics::inc_offline_fallbacks();
        match self.offline_partition.lookup(&self.offline_key) {
            Some(page) => StrategyResult::new(page, ResponseSource::Offline),
            None => StrategyResult::new(ResponseSnapshot::offline(), ResponseSource::Synthesized),
        }
    }
}

/// Fire-and-forget partition write. Failures are logged and counted only.
fn persist(partition: Partition, key: CacheKey, response: ResponseSnapshot) {
    tokio::spawn(async move {
        if let Err(err) = partition.put(key, response) {
            metrics::inc_cache_write_failures();
            dedlog::err(Some(&err), Some(partition.name()), "cache write failed");
        }
    });
}
