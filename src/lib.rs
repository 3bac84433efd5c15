#[path = "shared/dedlog/mod.rs"]
pub mod dedlog;
#[cfg(test)]
mod tests;

#[cfg(test)]
pub use tests::support;

pub mod app;
pub mod config;
pub mod control;
pub mod controller;
pub mod http;
pub mod metrics;
pub mod middleware;
pub mod model;
pub mod registry;
pub mod router;
pub mod shutdown;
pub mod storage;
pub mod strategy;
pub mod upstream;
pub mod worker;
