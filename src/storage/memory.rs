// In-memory partition store.

use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::{CacheStorage, PartitionStat, StoreError};
use crate::model::{CacheKey, ResponseSnapshot};

#[derive(Default)]
struct MemoryPartition {
    entries: DashMap<CacheKey, ResponseSnapshot>,
    bytes: AtomicUsize,
}

impl MemoryPartition {
    fn entry_size(key: &CacheKey, response: &ResponseSnapshot) -> usize {
        key.as_str().len() + response.size()
    }
}

/// DashMap-backed store. A `limit` of zero disables the per-partition quota.
pub struct MemoryStorage {
    partitions: DashMap<String, Arc<MemoryPartition>>,
    limit: usize,
}

impl MemoryStorage {
    pub fn new(limit: usize) -> Self {
        Self {
            partitions: DashMap::new(),
            limit,
        }
    }

    pub fn unbounded() -> Self {
        Self::new(0)
    }

    fn partition(&self, name: &str) -> Option<Arc<MemoryPartition>> {
        self.partitions.get(name).map(|p| Arc::clone(p.value()))
    }

    fn open_partition(&self, name: &str) -> Arc<MemoryPartition> {
        if let Some(p) = self.partition(name) {
            return p;
        }
        Arc::clone(
            self.partitions
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(MemoryPartition::default()))
                .value(),
        )
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl CacheStorage for MemoryStorage {
    fn open(&self, name: &str) {
        self.open_partition(name);
    }

    fn has(&self, name: &str) -> bool {
        self.partitions.contains_key(name)
    }

    fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.partitions.iter().map(|p| p.key().clone()).collect();
        names.sort();
        names
    }

    fn delete(&self, name: &str) -> bool {
        self.partitions.remove(name).is_some()
    }

    fn lookup(&self, name: &str, key: &CacheKey) -> Option<ResponseSnapshot> {
        let partition = self.partition(name)?;
        let found = partition.entries.get(key).map(|e| e.value().clone());
        found
    }

    fn put(&self, name: &str, key: CacheKey, response: ResponseSnapshot) -> Result<(), StoreError> {
        let partition = self.open_partition(name);
        let size = MemoryPartition::entry_size(&key, &response);
        let previous = partition
            .entries
            .get(&key)
            .map(|e| MemoryPartition::entry_size(e.key(), e.value()))
            .unwrap_or(0);

        if self.limit > 0 {
            let used = partition.bytes.load(Ordering::Relaxed).saturating_sub(previous);
            if used + size > self.limit {
                return Err(StoreError::QuotaExceeded {
                    partition: name.to_string(),
                    needed: size,
                    limit: self.limit,
                });
            }
        }

        // Last write wins on concurrent puts of the same key.
        let key_len = key.as_str().len();
        partition.bytes.fetch_add(size, Ordering::Relaxed);
        if let Some(old) = partition.entries.insert(key, response) {
            partition
                .bytes
                .fetch_sub(key_len + old.size(), Ordering::Relaxed);
        }
        Ok(())
    }

    fn len(&self, name: &str) -> usize {
        self.partitions.get(name).map(|p| p.entries.len()).unwrap_or(0)
    }

    fn entries(&self, name: &str) -> Vec<(CacheKey, ResponseSnapshot)> {
        match self.partition(name) {
            Some(p) => p
                .entries
                .iter()
                .map(|e| (e.key().clone(), e.value().clone()))
                .collect(),
            None => Vec::new(),
        }
    }

    fn stat(&self) -> Vec<PartitionStat> {
        self.names()
            .into_iter()
            .filter_map(|name| {
                let p = self.partition(&name)?;
                Some(PartitionStat {
                    name,
                    entries: p.entries.len(),
                    bytes: p.bytes.load(Ordering::Relaxed),
                })
            })
            .collect()
    }
}
