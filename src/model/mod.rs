// Package model provides request descriptors, response snapshots and cache keys.

pub mod keys;
pub mod request;
pub mod response;


// Re-export main types
pub use keys::CacheKey;
pub use request::{Destination, RequestDescriptor};
pub use response::{ResponseSnapshot, ResponseSource, StrategyResult};
