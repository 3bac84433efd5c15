// Named cache partitions: the store trait, its in-memory backend and disk persistence.

pub mod dumper;
pub mod memory;


use serde::Serialize;
use std::sync::Arc;

use crate::model::{CacheKey, ResponseSnapshot};

pub use dumper::{DumpStats, Dumper, PartitionDumper};
pub use memory::MemoryStorage;

/// Failure of a single partition write.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("partition {partition} quota exceeded: needs {needed} bytes, limit {limit}")]
    QuotaExceeded {
        partition: String,
        needed: usize,
        limit: usize,
    },
    #[error("partition {0} does not exist")]
    NoSuchPartition(String),
}

/// Size summary of one partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartitionStat {
    pub name: String,
    pub entries: usize,
    pub bytes: usize,
}

/// Keyed response store grouped into named partitions.
///
/// Partitions are append/overwrite-only; there is no cross-key transaction.
/// Implementations must be safe to share between request tasks.
pub trait CacheStorage: Send + Sync {
    /// Opens a partition, creating it when missing.
    fn open(&self, name: &str);

    fn has(&self, name: &str) -> bool;

    /// Partition names in lexical order.
    fn names(&self) -> Vec<String>;

    /// Deletes a partition with all its entries, reporting whether it existed.
    fn delete(&self, name: &str) -> bool;

    fn lookup(&self, name: &str, key: &CacheKey) -> Option<ResponseSnapshot>;

    /// Writes an entry, opening the partition if needed.
    fn put(&self, name: &str, key: CacheKey, response: ResponseSnapshot) -> Result<(), StoreError>;

    /// Entry count; zero for a missing partition.
    fn len(&self, name: &str) -> usize;

    /// Snapshot of a partition's entries.
    fn entries(&self, name: &str) -> Vec<(CacheKey, ResponseSnapshot)>;

    fn stat(&self) -> Vec<PartitionStat>;
}

/// Handle bound to one named partition.
#[derive(Clone)]
pub struct Partition {
    name: Arc<str>,
    storage: Arc<dyn CacheStorage>,
}

impl Partition {
    pub fn new(name: impl Into<Arc<str>>, storage: Arc<dyn CacheStorage>) -> Self {
        Self {
            name: name.into(),
            storage,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn lookup(&self, key: &CacheKey) -> Option<ResponseSnapshot> {
        self.storage.lookup(&self.name, key)
    }

    /// Stores the response without its per-client headers.
    pub fn put(&self, key: CacheKey, response: ResponseSnapshot) -> Result<(), StoreError> {
        self.storage.put(&self.name, key, response.without_private_headers())
    }

    pub fn len(&self) -> usize {
        self.storage.len(&self.name)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for Partition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Partition").field("name", &self.name).finish()
    }
}
