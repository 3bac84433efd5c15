use std::sync::Arc;
use url::Url;

use super::*;
use crate::model::CacheKey;
use crate::storage::MemoryStorage;
use crate::support::{snapshot, FakeUpstream};

const ORIGIN: &str = "http://catalog.test";

fn shell() -> Vec<RequestDescriptor> {
    ["/", "/manifest.json", "/offline.html"]
        .iter()
        .map(|p| RequestDescriptor::get(Url::parse(ORIGIN).unwrap().join(p).unwrap()))
        .collect()
}

fn scripted_shell() -> Arc<FakeUpstream> {
    let up = FakeUpstream::new();
    up.respond("http://catalog.test/", 200, "<html>shell</html>")
        .respond("http://catalog.test/manifest.json", 200, "{}")
        .respond("http://catalog.test/offline.html", 200, "<html>offline</html>");
    up
}

fn registry(version: &str) -> (CacheRegistry, Arc<MemoryStorage>) {
    let storage = Arc::new(MemoryStorage::unbounded());
    (CacheRegistry::new(version, storage.clone()), storage)
}

#[test]
fn test_partition_names_carry_version() {
    let (registry, _) = registry("cinematech-v2.0");

    let names: Vec<String> = PartitionRole::ALL
        .iter()
        .map(|role| registry.partition_name(*role))
        .collect();

    assert_eq!(
        names,
        vec![
            "cinematech-v2.0-static",
            "cinematech-v2.0-dynamic",
            "cinematech-v2.0-image",
            "cinematech-v2.0-api",
        ]
    );
}

#[tokio::test]
async fn test_install_populates_static_partition() {
    let (registry, storage) = registry("v2");
    let up = scripted_shell();

    let n = registry.install(up.as_ref(), &shell()).await.unwrap();

    assert_eq!(n, 3);
    assert_eq!(storage.names(), vec!["v2-static"]);
    let offline = storage
        .lookup("v2-static", &CacheKey::from_raw("GET http://catalog.test/offline.html"))
        .unwrap();
    assert_eq!(offline, snapshot(200, "<html>offline</html>"));
}

#[tokio::test]
async fn test_install_is_idempotent() {
    let (registry, storage) = registry("v2");
    let up = scripted_shell();

    registry.install(up.as_ref(), &shell()).await.unwrap();
    let mut first = storage.entries("v2-static");
    registry.install(up.as_ref(), &shell()).await.unwrap();
    let mut second = storage.entries("v2-static");

    first.sort_by(|a, b| a.0.as_str().cmp(b.0.as_str()));
    second.sort_by(|a, b| a.0.as_str().cmp(b.0.as_str()));
    assert_eq!(first, second);
    assert_eq!(storage.stat()[0].entries, 3);
}

#[tokio::test]
async fn test_install_fails_without_writes_on_rejection() {
    let (registry, storage) = registry("v2");
    let up = scripted_shell();
    up.fail("http://catalog.test/manifest.json");

    let err = registry.install(up.as_ref(), &shell()).await.unwrap_err();

    assert!(matches!(err, InstallError::Fetch { .. }), "{}", err);
    assert!(storage.entries("v2-static").is_empty());
}

#[tokio::test]
async fn test_install_fails_on_non_ok_status() {
    let (registry, storage) = registry("v2");
    let up = scripted_shell();
    up.respond("http://catalog.test/offline.html", 404, "missing");

    let err = registry.install(up.as_ref(), &shell()).await.unwrap_err();

    assert!(matches!(err, InstallError::BadStatus { status: 404, .. }), "{}", err);
    assert!(storage.entries("v2-static").is_empty());
}

#[tokio::test]
async fn test_install_rejects_success_statuses_other_than_200() {
    let (registry, storage) = registry("v2");
    let up = scripted_shell();
    up.respond("http://catalog.test/manifest.json", 203, "{}");

    let err = registry.install(up.as_ref(), &shell()).await.unwrap_err();

    assert!(matches!(err, InstallError::BadStatus { status: 203, .. }), "{}", err);
    assert!(storage.entries("v2-static").is_empty());
}

#[test]
fn test_collect_garbage_keeps_only_current_version() {
    let (registry, storage) = registry("cinematech-v2.0");
    for name in [
        "cinematech-v1.0-static",
        "cinematech-v1.0-image",
        "legacy-api",
        "cinematech-v2.0-static",
        "cinematech-v2.0-dynamic",
    ] {
        storage.open(name);
    }

    let deleted = registry.collect_garbage();

    assert_eq!(deleted.len(), 3);
    assert_eq!(
        storage.names(),
        vec!["cinematech-v2.0-dynamic", "cinematech-v2.0-static"]
    );
    assert!(registry.collect_garbage().is_empty());
}

#[test]
fn test_clear_all_ignores_version() {
    let (registry, storage) = registry("v2");
    storage.open("v1-static");
    storage.open("v2-api");
    storage.open("other");

    assert_eq!(registry.clear_all(), 3);
    assert!(storage.names().is_empty());
}
