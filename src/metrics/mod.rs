//! Prometheus metric names and recording helpers.
//!
//! Everything goes through the `metrics` facade; the exporter installed in
//! `main` renders it on `/shellcache/metrics`.

use crate::model::ResponseSource;
use crate::storage::PartitionStat;

pub const REQUESTS_TOTAL: &str = "requests_total";
pub const HITS: &str = "cache_hits";
pub const MISSES: &str = "cache_misses";
pub const NETWORK_FETCHES: &str = "network_fetches";
pub const NETWORK_ERRORS: &str = "network_errors";
pub const NETWORK_TIMEOUTS: &str = "network_timeouts";
pub const OFFLINE_FALLBACKS: &str = "offline_fallbacks";
pub const CACHE_WRITE_FAILURES: &str = "cache_write_failures";
pub const PASSTHROUGH_TOTAL: &str = "passthrough_total";
pub const PARTITIONS_DELETED: &str = "partitions_deleted";
pub const PARTITION_ENTRIES: &str = "partition_entries";
pub const PARTITION_BYTES: &str = "partition_bytes";
pub const PANICKED: &str = "panics";

/// Counts a finished request by where its response came from.
pub fn inc_requests(source: ResponseSource) {
    ::metrics::counter!(REQUESTS_TOTAL, "source" => source.as_str()).increment(1);
    if source == ResponseSource::Passthrough {
        ::metrics::counter!(PASSTHROUGH_TOTAL).increment(1);
    }
}

pub fn inc_hits() {
    ::metrics::counter!(HITS).increment(1);
}

pub fn inc_misses() {
    ::metrics::counter!(MISSES).increment(1);
}

pub fn inc_network_fetches() {
    ::metrics::counter!(NETWORK_FETCHES).increment(1);
}

pub fn inc_network_errors() {
    ::metrics::counter!(NETWORK_ERRORS).increment(1);
}

pub fn inc_network_timeouts() {
    ::metrics::counter!(NETWORK_TIMEOUTS).increment(1);
}

pub fn inc_offline_fallbacks() {
    ::metrics::counter!(OFFLINE_FALLBACKS).increment(1);
}

pub fn inc_cache_write_failures() {
    ::metrics::counter!(CACHE_WRITE_FAILURES).increment(1);
}

pub fn add_partitions_deleted(value: u64) {
    ::metrics::counter!(PARTITIONS_DELETED).increment(value);
}

pub fn inc_panics() {
    ::metrics::counter!(PANICKED).increment(1);
}

/// Publishes per-partition size gauges.
pub fn set_partition_stats(stats: &[PartitionStat]) {
    for stat in stats {
        ::metrics::gauge!(PARTITION_ENTRIES, "partition" => stat.name.clone()).set(stat.entries as f64);
        ::metrics::gauge!(PARTITION_BYTES, "partition" => stat.name.clone()).set(stat.bytes as f64);
    }
}
