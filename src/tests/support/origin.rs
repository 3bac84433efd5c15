// Origin server for end-to-end cases.

use axum::{
    body::to_bytes,
    extract::{Request, State},
    http::{header::CONTENT_TYPE, Method, StatusCode},
    response::{Html, IntoResponse, Response},
    Json, Router,
};
use dashmap::DashMap;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

pub const HOME_BODY: &str = "<html>catalog home</html>";
pub const OFFLINE_BODY: &str = "<html>you are offline</html>";

/// Delay applied to every answer while the origin is slow.
pub const SLOW_DELAY: Duration = Duration::from_secs(1);

#[derive(Clone, Default)]
struct OriginState {
    hits: Arc<DashMap<String, usize>>,
    slow: Arc<AtomicBool>,
}

impl OriginState {
    fn hit(&self, path: &str) -> usize {
        let mut n = self.hits.entry(path.to_string()).or_insert(0);
        *n += 1;
        *n
    }
}

/// Answers `/`, `/offline.html` and `/manifest.json` with fixed bodies,
/// echoes POST bodies, returns 404 for paths ending in `/missing` and `"{path}#{hit}"` for
/// anything else so cached and fresh copies can be told apart.
pub struct OriginServer {
    addr: SocketAddr,
    state: OriginState,
    token: CancellationToken,
}

impl OriginServer {
    pub async fn start() -> Self {
        let state = OriginState::default();
        let router = Router::new().fallback(handle).with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind origin");
        let addr = listener.local_addr().expect("origin addr");
        let token = CancellationToken::new();
        let shutdown = token.clone();
        tokio::spawn(async move {
            let _ = axum::serve(listener, router)
                .with_graceful_shutdown(async move { shutdown.cancelled().await })
                .await;
        });

        Self { addr, state, token }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn hits(&self, path: &str) -> usize {
        self.state.hits.get(path).map(|n| *n).unwrap_or(0)
    }

    pub fn set_slow(&self, slow: bool) {
        self.state.slow.store(slow, Ordering::SeqCst);
    }
}

impl Drop for OriginServer {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

async fn handle(State(state): State<OriginState>, req: Request) -> Response {
    let path = req.uri().path().to_string();
    let n = state.hit(&path);
    if state.slow.load(Ordering::SeqCst) {
        tokio::time::sleep(SLOW_DELAY).await;
    }

    if req.method() == Method::POST {
        let body = to_bytes(req.into_body(), 1 << 20).await.unwrap_or_default();
        return ([(CONTENT_TYPE, "text/plain")], body).into_response();
    }

    match path.as_str() {
        "/" => Html(HOME_BODY).into_response(),
        "/offline.html" => Html(OFFLINE_BODY).into_response(),
        "/manifest.json" => Json(json!({ "name": "catalog", "start_url": "/" })).into_response(),
        p if p.ends_with("/missing") => (StatusCode::NOT_FOUND, "not found").into_response(),
        _ => ([(CONTENT_TYPE, "text/plain")], format!("{}#{}", path, n)).into_response(),
    }
}
