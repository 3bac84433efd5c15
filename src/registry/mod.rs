//! Versioned set of named cache partitions.

#[cfg(test)]
mod registry_test;

use futures::future::join_all;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

use crate::model::{RequestDescriptor, ResponseSnapshot};
use crate::storage::{CacheStorage, Partition, StoreError};
use crate::upstream::{FetchError, Upstream};

const COMPONENT: &str = "registry";

/// Role a partition plays inside a version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PartitionRole {
    Static,
    Dynamic,
    Image,
    Api,
}

impl PartitionRole {
    pub const ALL: [PartitionRole; 4] = [
        PartitionRole::Static,
        PartitionRole::Dynamic,
        PartitionRole::Image,
        PartitionRole::Api,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PartitionRole::Static => "static",
            PartitionRole::Dynamic => "dynamic",
            PartitionRole::Image => "image",
            PartitionRole::Api => "api",
        }
    }
}

impl fmt::Display for PartitionRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Install failed; nothing was written to the static partition.
#[derive(Debug, Clone, thiserror::Error)]
pub enum InstallError {
    #[error("fetch shell asset {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: FetchError,
    },
    #[error("shell asset {url} answered with status {status}")]
    BadStatus { url: String, status: u16 },
    #[error("store shell asset {url}: {source}")]
    Store {
        url: String,
        #[source]
        source: StoreError,
    },
}

/// Owns the partitions of one cache version.
///
/// Partition names are `{version}-{role}`; anything in the store not starting
/// with the version tag belongs to an older generation.
#[derive(Clone)]
pub struct CacheRegistry {
    version: Arc<str>,
    storage: Arc<dyn CacheStorage>,
}

impl CacheRegistry {
    pub fn new(version: impl Into<Arc<str>>, storage: Arc<dyn CacheStorage>) -> Self {
        Self {
            version: version.into(),
            storage,
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn storage(&self) -> &Arc<dyn CacheStorage> {
        &self.storage
    }

    pub fn partition_name(&self, role: PartitionRole) -> String {
        format!("{}-{}", self.version, role.as_str())
    }

    pub fn partition(&self, role: PartitionRole) -> Partition {
        Partition::new(self.partition_name(role), Arc::clone(&self.storage))
    }

    /// Pre-populates the static partition with the shell manifest.
    ///
    /// Every asset is fetched before anything is written; a rejected fetch or
    /// any status other than 200 aborts the install with the partition untouched.
    pub async fn install(
        &self,
        upstream: &dyn Upstream,
        shell: &[RequestDescriptor],
    ) -> Result<usize, InstallError> {
        let partition = self.partition(PartitionRole::Static);
        self.storage.open(partition.name());

        let fetched = join_all(shell.iter().map(|req| upstream.fetch(req))).await;

        let mut ready: Vec<(&RequestDescriptor, ResponseSnapshot)> = Vec::with_capacity(shell.len());
        for (req, result) in shell.iter().zip(fetched) {
            let response = result.map_err(|source| InstallError::Fetch {
                url: req.url.to_string(),
                source,
            })?;
            if !response.is_cacheable() {
                return Err(InstallError::BadStatus {
                    url: req.url.to_string(),
                    status: response.status,
                });
            }
            ready.push((req, response));
        }

        for (req, response) in ready {
            partition
                .put(req.cache_key(), response)
                .map_err(|source| InstallError::Store {
                    url: req.url.to_string(),
                    source,
                })?;
        }

        info!(
            component = COMPONENT,
            event = "installed",
            partition = partition.name(),
            assets = shell.len(),
            "shell pre-cached"
        );
        Ok(shell.len())
    }

    /// Deletes every partition not carrying the current version tag.
    pub fn collect_garbage(&self) -> Vec<String> {
        let stale: Vec<String> = self
            .storage
            .names()
            .into_iter()
            .filter(|name| !name.starts_with(self.version.as_ref()))
            .collect();

        let mut deleted = Vec::with_capacity(stale.len());
        for name in stale {
            if self.storage.delete(&name) {
                info!(component = COMPONENT, event = "partition_deleted", partition = %name, "stale partition deleted");
                deleted.push(name);
            } else {
                warn!(component = COMPONENT, partition = %name, "stale partition vanished before deletion");
            }
        }
        deleted
    }

    /// Deletes every partition regardless of version.
    pub fn clear_all(&self) -> usize {
        let names = self.storage.names();
        names.iter().filter(|name| self.storage.delete(name)).count()
    }
}

impl fmt::Debug for CacheRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheRegistry")
            .field("version", &self.version)
            .finish()
    }
}
