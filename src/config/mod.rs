// Configuration loading and management.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;

pub const PROD: &str = "prod";
#[allow(dead_code)]
pub const DEV: &str = "dev";
pub const TEST: &str = "test";

pub const DEFAULT_VERSION: &str = "cinematech-v2.0";
pub const DEFAULT_STATIC_PREFIX: &str = "/assets/";
pub const DEFAULT_OFFLINE_PAGE: &str = "/offline.html";
pub const DEFAULT_API_HOST_FRAGMENT: &str = "supabase";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Shellcache {
    #[serde(rename = "shellcache")]
    pub shellcache: ShellcacheBox,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ShellcacheBox {
    pub env: String,
    pub logs: Option<Logs>,
    pub api: Option<Api>,
    pub scope: Scope,
    #[serde(default)]
    pub cache: Cache,
    #[serde(default)]
    pub network: Network,
    pub persistence: Option<Persistence>,
    pub metrics: Option<Metrics>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Logs {
    pub level: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Api {
    pub name: Option<String>,
    pub port: Option<String>,
}

/// Public origin the proxy answers for and the app shell upstream behind it.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Scope {
    pub origin: Url,
    pub upstream: Url,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Cache {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(rename = "static_prefix", default = "default_static_prefix")]
    pub static_prefix: String,
    #[serde(rename = "offline_page", default = "default_offline_page")]
    pub offline_page: String,
    #[serde(default = "default_shell")]
    pub shell: Vec<String>,
    #[serde(rename = "api_host_fragment", default = "default_api_host_fragment")]
    pub api_host_fragment: String,
    #[serde(rename = "skip_waiting_on_install", default = "default_true")]
    pub skip_waiting_on_install: bool,
    /// Zero means unbounded.
    #[serde(rename = "max_partition_bytes", default)]
    pub max_partition_bytes: usize,
}

impl Default for Cache {
    fn default() -> Self {
        Self {
            version: default_version(),
            static_prefix: default_static_prefix(),
            offline_page: default_offline_page(),
            shell: default_shell(),
            api_host_fragment: default_api_host_fragment(),
            skip_waiting_on_install: true,
            max_partition_bytes: 0,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Network {
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
    #[serde(rename = "api_timeout", default = "default_api_timeout", with = "humantime_serde")]
    pub api_timeout: Duration,
    #[serde(rename = "max_timeout", default = "default_max_timeout", with = "humantime_serde")]
    pub max_timeout: Duration,
    #[serde(rename = "abort_on_timeout", default)]
    pub abort_on_timeout: bool,
}

impl Default for Network {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            api_timeout: default_api_timeout(),
            max_timeout: default_max_timeout(),
            abort_on_timeout: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Persistence {
    pub enabled: bool,
    pub dir: Option<String>,
    #[serde(default)]
    pub gzip: bool,
    #[serde(rename = "crc32_control_sum", default = "default_true")]
    pub crc32_control: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Metrics {
    pub enabled: bool,
}

fn default_version() -> String {
    DEFAULT_VERSION.to_string()
}

fn default_static_prefix() -> String {
    DEFAULT_STATIC_PREFIX.to_string()
}

fn default_offline_page() -> String {
    DEFAULT_OFFLINE_PAGE.to_string()
}

fn default_shell() -> Vec<String> {
    vec![
        "/".to_string(),
        "/manifest.json".to_string(),
        DEFAULT_OFFLINE_PAGE.to_string(),
    ]
}

fn default_api_host_fragment() -> String {
    DEFAULT_API_HOST_FRAGMENT.to_string()
}

fn default_true() -> bool {
    true
}

fn default_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_api_timeout() -> Duration {
    Duration::from_secs(3)
}

fn default_max_timeout() -> Duration {
    Duration::from_secs(60)
}

// Config trait
pub trait ConfigTrait {
    fn logs(&self) -> Option<&Logs>;
    fn is_prod(&self) -> bool;
    #[allow(dead_code)]
    fn is_test(&self) -> bool;
    fn api(&self) -> Option<&Api>;
    fn scope(&self) -> &Scope;
    fn cache(&self) -> &Cache;
    fn network(&self) -> &Network;
    fn persistence(&self) -> Option<&Persistence>;
    fn is_metrics_enabled(&self) -> bool;
}

// Config type alias for convenience
pub type Config = Shellcache;

impl ConfigTrait for Config {
    fn logs(&self) -> Option<&Logs> {
        self.shellcache.logs.as_ref()
    }

    fn is_prod(&self) -> bool {
        self.shellcache.env == PROD
    }

    fn is_test(&self) -> bool {
        self.shellcache.env == TEST
    }

    fn api(&self) -> Option<&Api> {
        self.shellcache.api.as_ref()
    }

    fn scope(&self) -> &Scope {
        &self.shellcache.scope
    }

    fn cache(&self) -> &Cache {
        &self.shellcache.cache
    }

    fn network(&self) -> &Network {
        &self.shellcache.network
    }

    fn persistence(&self) -> Option<&Persistence> {
        self.shellcache.persistence.as_ref().filter(|p| p.enabled)
    }

    fn is_metrics_enabled(&self) -> bool {
        self.shellcache.metrics.as_ref().map(|m| m.enabled).unwrap_or(true)
    }
}

impl Config {
    /// Loads configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let abs_path = path
            .canonicalize()
            .with_context(|| format!("failed to resolve absolute config filepath: {:?}", path))?;

        let data = std::fs::read_to_string(&abs_path)
            .with_context(|| format!("read config yaml file {:?}", abs_path))?;

        Self::from_yaml(&data).with_context(|| format!("load config from {:?}", abs_path))
    }

    /// Parses and validates configuration from YAML text.
    pub fn from_yaml(data: &str) -> Result<Self> {
        let mut cfg: Config = serde_yaml::from_str(data).context("unmarshal yaml")?;

        // Shell paths and the offline page are matched as absolute paths.
        let cache = &mut cfg.shellcache.cache;
        for path in cache.shell.iter_mut() {
            if !path.starts_with('/') {
                path.insert(0, '/');
            }
        }
        if !cache.offline_page.starts_with('/') {
            cache.offline_page.insert(0, '/');
        }

        cfg.validate()?;
        Ok(cfg)
    }

    /// Checks cross-field invariants.
    pub fn validate(&self) -> Result<()> {
        let cache = self.cache();
        if cache.version.trim().is_empty() {
            anyhow::bail!("cache.version must not be empty");
        }
        if !cache.static_prefix.starts_with('/') {
            anyhow::bail!(
                "cache.static_prefix must start with '/', got {:?}",
                cache.static_prefix
            );
        }
        if !cache.shell.iter().any(|p| p == &cache.offline_page) {
            anyhow::bail!(
                "cache.offline_page {:?} must be listed in cache.shell",
                cache.offline_page
            );
        }
        if cache.api_host_fragment.is_empty() {
            anyhow::bail!("cache.api_host_fragment must not be empty");
        }

        let scope = self.scope();
        if scope.origin.host_str().is_none() {
            anyhow::bail!("scope.origin must have a host, got {}", scope.origin);
        }
        if scope.upstream.host_str().is_none() {
            anyhow::bail!("scope.upstream must have a host, got {}", scope.upstream);
        }

        let network = self.network();
        if network.timeout.is_zero() || network.api_timeout.is_zero() {
            anyhow::bail!("network timeouts must be greater than zero");
        }
        if network.max_timeout < network.timeout || network.max_timeout < network.api_timeout {
            anyhow::bail!("network.max_timeout must not be shorter than the race timeouts");
        }

        if let Some(persistence) = self.persistence().filter(|p| p.enabled) {
            if persistence.dir.as_deref().map(str::is_empty).unwrap_or(true) {
                anyhow::bail!("persistence.dir is required when persistence is enabled");
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod test_config;
#[cfg(test)]
pub use test_config::{new_test_config, TEST_ORIGIN};
