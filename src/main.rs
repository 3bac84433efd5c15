// Main entrypoint for the shellcache offline proxy.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use shellcache::app::App;
use shellcache::config::{Config, ConfigTrait};
use shellcache::controller::init_prometheus_exporter;
use shellcache::dedlog;
use shellcache::shutdown::GracefulShutdown;

const CONFIG_PATH: &str = "cfg/shellcache.cfg.yaml";
const CONFIG_PATH_LOCAL: &str = "cfg/shellcache.cfg.local.yaml";

/// Shellcache - offline-first caching proxy for a single web origin
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Custom config file path
    #[arg(short, long, value_name = "FILE")]
    cfg: Option<PathBuf>,
}

/// Loads the configuration, preferring the local override file.
fn load_cfg(path: Option<PathBuf>) -> Result<Config> {
    if let Some(custom_path) = path {
        let cfg = Config::load(&custom_path)
            .with_context(|| format!("failed to load custom config from {:?}", custom_path))?;
        info!(component = "config", event = "load_success", path = ?custom_path, "config loaded");
        return Ok(cfg);
    }

    match Config::load(CONFIG_PATH_LOCAL) {
        Ok(cfg) => {
            info!(component = "config", event = "load_success", path = CONFIG_PATH_LOCAL, "config loaded");
            Ok(cfg)
        }
        Err(_) => {
            let cfg = Config::load(CONFIG_PATH)
                .with_context(|| format!("failed to load config from {}", CONFIG_PATH))?;
            info!(component = "config", event = "load_success", path = CONFIG_PATH, "config loaded");
            Ok(cfg)
        }
    }
}

fn configure_logger(cfg: &Config) {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let log_level = cfg
        .logs()
        .and_then(|logs| logs.level.as_deref())
        .unwrap_or("info");

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    if cfg.is_prod() {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().pretty())
            .init();
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    // The recorder must be installed outside of the runtime.
    if let Err(e) = init_prometheus_exporter() {
        eprintln!("Warning: failed to initialize Prometheus metrics exporter: {}", e);
    }

    tokio::runtime::Runtime::new()
        .context("Failed to create tokio runtime")?
        .block_on(async_main(args))
}

async fn async_main(args: Args) -> Result<()> {
    let shutdown_token = CancellationToken::new();

    let cfg = load_cfg(args.cfg)?;
    configure_logger(&cfg);

    let dedup_logger_token = shutdown_token.clone();
    tokio::spawn(async move {
        dedlog::start_dedup_logger(dedup_logger_token).await;
    });

    let graceful_shutdown =
        GracefulShutdown::new(shutdown_token.clone()).with_timeout(Duration::from_secs(60));

    let app = App::new(shutdown_token.clone(), cfg)?;

    let failed_token = shutdown_token.clone();
    graceful_shutdown.spawn(async move {
        if let Err(e) = app.serve().await {
            error!(component = "main", scope = "app", event = "serve_failed", error = %e, "failed to serve app");
            failed_token.cancel();
        }
    });

    if let Err(e) = graceful_shutdown.await_shutdown().await {
        error!(
            component = "main",
            scope = "service",
            event = "graceful_shutdown_failed",
            error = %e,
            "failed to gracefully shut down service"
        );
        return Err(e);
    }

    Ok(())
}
