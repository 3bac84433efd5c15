//! Deduplicated logging functionality to prevent log spam.

pub mod log_entry;
pub mod sanitizer;

#[cfg(test)]
mod sanitizer_test;

pub use log_entry::{err, start_dedup_logger};

pub(crate) const COMPONENT: &str = "dedlog";
