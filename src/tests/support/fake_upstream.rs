// In-memory network collaborator with scripted answers and call counters.

use bytes::Bytes;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::model::{RequestDescriptor, ResponseSnapshot};
use crate::upstream::{FetchError, Upstream};

#[derive(Clone)]
struct Script {
    answer: Result<ResponseSnapshot, FetchError>,
    delay: Duration,
}

/// Scripted `Upstream`. Unscripted URLs reject with a transport error.
#[derive(Default)]
pub struct FakeUpstream {
    scripts: Mutex<HashMap<String, Script>>,
    calls: DashMap<String, usize>,
    total: AtomicUsize,
    completed: AtomicUsize,
}

fn norm(url: &str) -> String {
    Url::parse(url)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| url.to_string())
}

pub fn snapshot(status: u16, body: &'static str) -> ResponseSnapshot {
    ResponseSnapshot::new(
        status,
        vec![("content-type".to_string(), "text/plain".to_string())],
        Bytes::from_static(body.as_bytes()),
    )
}

impl FakeUpstream {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond(&self, url: &str, status: u16, body: &'static str) -> &Self {
        self.respond_after(url, Duration::ZERO, status, body)
    }

    pub fn respond_after(&self, url: &str, delay: Duration, status: u16, body: &'static str) -> &Self {
        self.scripts.lock().insert(
            norm(url),
            Script {
                answer: Ok(snapshot(status, body)),
                delay,
            },
        );
        self
    }

    pub fn fail(&self, url: &str) -> &Self {
        self.scripts.lock().insert(
            norm(url),
            Script {
                answer: Err(FetchError::Transport("connection refused".to_string())),
                delay: Duration::ZERO,
            },
        );
        self
    }

    pub fn calls(&self, url: &str) -> usize {
        self.calls.get(&norm(url)).map(|c| *c).unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }

    /// Fetches that ran to completion (were not dropped mid-delay).
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Upstream for FakeUpstream {
    async fn fetch(&self, req: &RequestDescriptor) -> Result<ResponseSnapshot, FetchError> {
        let url = req.url.to_string();
        self.total.fetch_add(1, Ordering::SeqCst);
        *self.calls.entry(url.clone()).or_insert(0) += 1;

        let script = self.scripts.lock().get(&url).cloned();
        let Some(script) = script else {
            return Err(FetchError::Transport(format!("no route to {}", url)));
        };

        if !script.delay.is_zero() {
            tokio::time::sleep(script.delay).await;
        }
        self.completed.fetch_add(1, Ordering::SeqCst);
        script.answer
    }
}
