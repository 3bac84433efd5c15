use super::{Api, Cache, Config, Logs, Network, Scope, ShellcacheBox};
use std::time::Duration;
use url::Url;

pub const TEST_ORIGIN: &str = "http://catalog.test";

/// Creates a new test configuration.
///
/// The upstream points at a placeholder address; harnesses overwrite
/// `scope.upstream` with the address of the origin server they start.
pub fn new_test_config() -> Config {
    Config {
        shellcache: ShellcacheBox {
            env: super::TEST.to_string(),
            logs: Some(Logs {
                level: Some("debug".to_string()),
            }),
            api: Some(Api {
                name: Some("shellcache:8021".to_string()),
                port: Some("8021".to_string()),
            }),
            scope: Scope {
                origin: Url::parse(TEST_ORIGIN).expect("valid test origin"),
                upstream: Url::parse("http://127.0.0.1:8090").expect("valid test upstream"),
            },
            cache: Cache {
                version: "test-v1".to_string(),
                ..Cache::default()
            },
            network: Network {
                timeout: Duration::from_millis(300),
                api_timeout: Duration::from_millis(200),
                max_timeout: Duration::from_secs(5),
                abort_on_timeout: false,
            },
            persistence: None,
            metrics: None,
        },
    }
}
