//! HTTP server implementation.

use anyhow::{Context, Result};
use axum::extract::Request;
use axum::response::Response;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;
use tower_http::timeout::TimeoutLayer;
use tracing::{error, info};

use crate::config::{Config, ConfigTrait};
use crate::controller::controller::Controller;
use crate::middleware::middleware::Middleware;

/// Extra time granted to a request on top of the network deadline.
const TIMEOUT_SLACK: Duration = Duration::from_secs(5);

/// Server trait for HTTP server operations.
#[async_trait::async_trait]
pub trait Server: Send + Sync {
    /// Binds the configured port and serves until shutdown.
    async fn listen_and_serve(&self) -> Result<()>;

    /// Serves on an already bound listener until shutdown.
    async fn serve_on(&self, listener: TcpListener) -> Result<()>;
}

/// HTTP server implementation.
pub struct HttpServer {
    shutdown_token: CancellationToken,
    config: Config,
    router: Router,
}

impl HttpServer {
    pub fn new(
        shutdown_token: CancellationToken,
        config: Config,
        controllers: Vec<Box<dyn Controller>>,
        proxy: Box<dyn Controller>,
        middlewares: Vec<Box<dyn Middleware>>,
    ) -> Result<Arc<Self>> {
        let router = Self::build_router(controllers, proxy);
        let router = Self::merge_middlewares(router, middlewares, config.network().max_timeout);

        Ok(Arc::new(Self {
            shutdown_token,
            config,
            router,
        }))
    }

    fn name(&self) -> &str {
        self.config
            .api()
            .and_then(|api| api.name.as_deref())
            .unwrap_or("shellcache")
    }

    /// Builds the router with all controllers.
    ///
    /// `controllers` answer origin-form requests addressed to the proxy
    /// itself. Absolute-form (forward proxy) requests only ever reach
    /// `proxy`, so a foreign URL sharing an admin path goes to the network.
    fn build_router(controllers: Vec<Box<dyn Controller>>, proxy: Box<dyn Controller>) -> Router {
        let forwarded = proxy.add_route(Router::new());
        let mut local = proxy.add_route(Router::new());
        for controller in controllers {
            local = controller.add_route(local);
        }

        Router::new().fallback(move |req: Request| {
            let target = if is_absolute_form(&req) {
                forwarded.clone()
            } else {
                local.clone()
            };
            async move { dispatch(target, req).await }
        })
    }

    /// Applies middlewares in reverse order so the first listed runs first.
    fn merge_middlewares(router: Router, middlewares: Vec<Box<dyn Middleware>>, max_timeout: Duration) -> Router {
        let mut result = router;
        for middleware in middlewares.iter().rev() {
            result = middleware.apply(result);
        }
        result.layer(TimeoutLayer::new(max_timeout + TIMEOUT_SLACK))
    }
}

fn is_absolute_form(req: &Request) -> bool {
    req.uri().authority().is_some()
}

async fn dispatch(router: Router, req: Request) -> Response {
    match router.oneshot(req).await {
        Ok(response) => response,
        Err(never) => match never {},
    }
}

#[async_trait::async_trait]
impl Server for HttpServer {
    async fn listen_and_serve(&self) -> Result<()> {
        let api_cfg = self.config.api().context("API configuration is required")?;
        let port = api_cfg.port.as_deref().unwrap_or("8020");
        let port = port.trim_start_matches(':');

        let addr: SocketAddr = format!("0.0.0.0:{}", port)
            .parse()
            .context("Failed to parse server address")?;

        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind TCP listener on {}", addr))?;

        self.serve_on(listener).await
    }

    async fn serve_on(&self, listener: TcpListener) -> Result<()> {
        let name = self.name().to_string();
        let addr = listener.local_addr().context("listener address")?;

        info!(component = "server", event = "started", name = %name, addr = %addr, "server started");

        let shutdown_token = self.shutdown_token.clone();
        let serve_future = axum::serve(listener, self.router.clone())
            .with_graceful_shutdown(async move { shutdown_token.cancelled().await });

        if let Err(e) = serve_future.await {
            error!(
                component = "server",
                event = "listen_and_serve_failed",
                name = %name,
                addr = %addr,
                error = %e,
                "server failed to listen and serve"
            );
            return Err(e.into());
        }

        info!(component = "server", event = "stopped", name = %name, addr = %addr, "server stopped");
        Ok(())
    }
}
