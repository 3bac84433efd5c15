// Proxy harness: one origin and one proxy per case.

use axum::http::Method;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use url::Url;

use super::common::eventually;
use super::origin::OriginServer;
use crate::app::App;
use crate::config::{new_test_config, Config, TEST_ORIGIN};
use crate::model::{CacheKey, ResponseSnapshot};
use crate::registry::PartitionRole;
use crate::worker::WorkerState;

/// Test config pointing the scope upstream at `origin`. Hosts containing
/// "localhost" count as API hosts.
pub fn e2e_config(origin: &OriginServer) -> Config {
    let mut cfg = new_test_config();
    cfg.shellcache.scope.upstream = Url::parse(&origin.url()).expect("origin url");
    cfg.shellcache.cache.api_host_fragment = "localhost".to_string();
    cfg
}

pub struct ProxyServer {
    addr: SocketAddr,
    app: App,
    token: CancellationToken,
    serving: Option<JoinHandle<()>>,
}

impl ProxyServer {
    pub async fn start(cfg: Config) -> Self {
        let token = CancellationToken::new();
        let app = App::new(token.clone(), cfg).expect("build app");
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind proxy");
        let addr = listener.local_addr().expect("proxy addr");

        let serving = app.clone();
        let serving = tokio::spawn(async move {
            let _ = serving.serve_on(listener).await;
        });

        Self {
            addr,
            app,
            token,
            serving: Some(serving),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn app(&self) -> &App {
        &self.app
    }

    pub fn state(&self) -> WorkerState {
        self.app.worker().lifecycle().state()
    }

    pub async fn wait_for(&self, state: WorkerState) {
        eventually(state.as_str(), || self.state() == state).await;
    }

    /// Partition entry for a same-origin path under the current version.
    pub fn cached(&self, role: PartitionRole, url: &str) -> Option<ResponseSnapshot> {
        let url = Url::parse(url).expect("valid url");
        self.app
            .worker()
            .registry()
            .partition(role)
            .lookup(&CacheKey::new(&Method::GET, &url))
    }

    pub fn cached_path(&self, role: PartitionRole, path: &str) -> Option<ResponseSnapshot> {
        self.cached(role, &format!("{}{}", TEST_ORIGIN, path))
    }

    /// Stops serving and waits for the shutdown dump.
    pub async fn stop(&mut self) {
        self.token.cancel();
        if let Some(serving) = self.serving.take() {
            let _ = serving.await;
        }
    }
}

impl Drop for ProxyServer {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Starts an origin and an activated proxy in front of it.
pub async fn start_pair() -> (OriginServer, ProxyServer) {
    let origin = OriginServer::start().await;
    let proxy = ProxyServer::start(e2e_config(&origin)).await;
    proxy.wait_for(WorkerState::Activated).await;
    (origin, proxy)
}

/// Client talking to the proxy directly, ignoring proxy env vars.
pub fn direct_client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().expect("client")
}

/// Client using the proxy as its forward HTTP proxy.
pub fn forward_client(proxy: &ProxyServer) -> reqwest::Client {
    let proxy = reqwest::Proxy::http(proxy.url("")).expect("proxy url");
    reqwest::Client::builder().proxy(proxy).build().expect("client")
}
