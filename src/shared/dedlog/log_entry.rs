use once_cell::sync::OnceCell;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use super::sanitizer::{Sanitizer, WithCollapseSpaces};
use super::COMPONENT;

const WINDOW: Duration = Duration::from_secs(5);
const CHANNEL_CAPACITY: usize = 1024;

/// Log entry for deduplication
struct LogEntry {
    err: Option<String>,
    reason: String,
    extra: Option<String>,
    count: usize,
}

static ERR_CH: OnceCell<mpsc::Sender<LogEntry>> = OnceCell::new();

/// Hot path method for logging errors without blocking.
///
/// Entries are aggregated per 5s window by reason and sanitized error text.
/// Before the logger is started, or when its queue is full, the entry is
/// written straight through at debug level.
pub fn err(err: Option<&dyn std::error::Error>, extra: Option<&str>, msg: &str) {
    let entry = LogEntry {
        err: err.map(|e| e.to_string()),
        reason: msg.to_string(),
        extra: extra.map(str::to_string),
        count: 1,
    };

    let rejected = match ERR_CH.get() {
        Some(tx) => tx.try_send(entry).err().map(|e| match e {
            mpsc::error::TrySendError::Full(entry) | mpsc::error::TrySendError::Closed(entry) => entry,
        }),
        None => Some(entry),
    };

    if let Some(entry) = rejected {
        debug!(
            component = COMPONENT,
            err = entry.err.as_deref().unwrap_or(""),
            extra = entry.extra.as_deref().unwrap_or(""),
            "{}", entry.reason
        );
    }
}

/// Starts the deduplicated logger. Only the first call in a process owns the channel.
pub async fn start_dedup_logger(ctx: CancellationToken) {
    let (tx, mut rx) = mpsc::channel(CHANNEL_CAPACITY);
    if ERR_CH.set(tx).is_err() {
        return;
    }

    let sanitizer = Sanitizer::new(WithCollapseSpaces(true));
    let mut window: HashMap<String, LogEntry> = HashMap::new();
    let mut interval = tokio::time::interval(WINDOW);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ctx.cancelled() => {
                flush(&mut window);
                break;
            }
            entry = rx.recv() => {
                let Some(mut entry) = entry else { break };
                entry.err = entry.err.map(|e| sanitizer.sanitize(&e));
                let key = format!("{}|{}", entry.reason, entry.err.as_deref().unwrap_or(""));
                window
                    .entry(key)
                    .and_modify(|e| e.count += 1)
                    .or_insert(entry);
            }
            _ = interval.tick() => flush(&mut window),
        }
    }
}

fn flush(window: &mut HashMap<String, LogEntry>) {
    for (_, entry) in window.drain() {
        error!(
            component = COMPONENT,
            count = entry.count,
            err = entry.err.as_deref().unwrap_or(""),
            extra = entry.extra.as_deref().unwrap_or(""),
            "{}", entry.reason
        );
    }
}
