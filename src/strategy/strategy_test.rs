use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use super::*;
use crate::model::Destination;
use crate::registry::{CacheRegistry, PartitionRole};
use crate::storage::{CacheStorage, MemoryStorage};
use crate::support::{eventually, snapshot, FakeUpstream};

const OFFLINE_URL: &str = "http://catalog.test/offline.html";

struct Fixture {
    registry: CacheRegistry,
    up: Arc<FakeUpstream>,
    executor: StrategyExecutor,
}

fn fixture_with(storage: Arc<dyn CacheStorage>, abort_on_timeout: bool) -> Fixture {
    let registry = CacheRegistry::new("v1", storage);
    let up = FakeUpstream::new();
    let executor = StrategyExecutor::new(
        up.clone(),
        registry.partition(PartitionRole::Static),
        CacheKey::from_raw(format!("GET {}", OFFLINE_URL)),
        abort_on_timeout,
    );
    Fixture { registry, up, executor }
}

fn fixture() -> Fixture {
    fixture_with(Arc::new(MemoryStorage::unbounded()), false)
}

fn get(url: &str) -> RequestDescriptor {
    RequestDescriptor::get(Url::parse(url).unwrap())
}

fn navigation(url: &str) -> RequestDescriptor {
    get(url).with_navigate(true).with_destination(Destination::Document)
}

fn seed(partition: &Partition, url: &str, body: &'static str) {
    partition.put(get(url).cache_key(), snapshot(200, body)).unwrap();
}

fn body(result: &StrategyResult) -> &[u8] {
    &result.response.body
}

#[tokio::test]
async fn test_cache_first_hit_skips_network() {
    let f = fixture();
    let partition = f.registry.partition(PartitionRole::Static);
    seed(&partition, "http://catalog.test/assets/app.js", "cached js");

    let result = f
        .executor
        .cache_first(&get("http://catalog.test/assets/app.js"), partition)
        .await
        .unwrap();

    assert_eq!(result.source, ResponseSource::Cache);
    assert_eq!(body(&result), b"cached js");
    assert_eq!(f.up.total_calls(), 0);
}

#[tokio::test]
async fn test_cache_first_second_request_is_served_from_cache() {
    let f = fixture();
    let url = "http://catalog.test/assets/app.js";
    f.up.respond(url, 200, "fresh js");
    let partition = f.registry.partition(PartitionRole::Static);

    let first = f.executor.cache_first(&get(url), partition.clone()).await.unwrap();
    assert_eq!(first.source, ResponseSource::Network);
    eventually("static entry written", || !partition.is_empty()).await;

    let second = f.executor.cache_first(&get(url), partition).await.unwrap();

    assert_eq!(second.source, ResponseSource::Cache);
    assert_eq!(body(&second), b"fresh js");
    assert_eq!(f.up.calls(url), 1);
}

#[tokio::test]
async fn test_non_200_responses_are_never_stored() {
    let f = fixture();
    f.up.respond("http://catalog.test/assets/missing.js", 404, "nope")
        .respond("http://catalog.test/movie/1", 500, "boom")
        .respond("http://catalog.test/assets/moved.js", 301, "");
    let static_p = f.registry.partition(PartitionRole::Static);
    let dynamic_p = f.registry.partition(PartitionRole::Dynamic);

    let a = f
        .executor
        .cache_first(&get("http://catalog.test/assets/missing.js"), static_p.clone())
        .await
        .unwrap();
    let b = f
        .executor
        .network_first(&get("http://catalog.test/movie/1"), dynamic_p.clone(), Duration::from_secs(1))
        .await
        .unwrap();
    let c = f
        .executor
        .cache_first(&get("http://catalog.test/assets/moved.js"), static_p.clone())
        .await
        .unwrap();

    assert_eq!((a.response.status, a.source), (404, ResponseSource::Network));
    assert_eq!((b.response.status, b.source), (500, ResponseSource::Network));
    assert_eq!(c.response.status, 301);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(static_p.is_empty());
    assert!(dynamic_p.is_empty());
}

#[tokio::test]
async fn test_cache_first_failure_propagates_for_subresources() {
    let f = fixture();
    f.up.fail("http://img.cdn.test/poster.jpg");

    let err = f
        .executor
        .cache_first(
            &get("http://img.cdn.test/poster.jpg").with_destination(Destination::Image),
            f.registry.partition(PartitionRole::Image),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::Transport(_)));
}

#[tokio::test]
async fn test_cache_first_failure_on_navigation_serves_offline_page() {
    let f = fixture();
    let static_p = f.registry.partition(PartitionRole::Static);
    seed(&static_p, OFFLINE_URL, "<h1>You are offline</h1>");
    f.up.fail("http://catalog.test/assets/page.html");

    let result = f
        .executor
        .cache_first(&navigation("http://catalog.test/assets/page.html"), static_p)
        .await
        .unwrap();

    assert_eq!(result.source, ResponseSource::Offline);
    assert_eq!(body(&result), b"<h1>You are offline</h1>");
}

#[tokio::test]
async fn test_missing_offline_page_is_synthesized() {
    let f = fixture();
    f.up.fail("http://catalog.test/series/7");

    let result = f
        .executor
        .network_first(
            &navigation("http://catalog.test/series/7"),
            f.registry.partition(PartitionRole::Dynamic),
            Duration::from_secs(1),
        )
        .await
        .unwrap();

    assert_eq!(result.source, ResponseSource::Synthesized);
    assert_eq!(result.response.status, 503);
    assert_eq!(body(&result), b"Offline");
    assert_eq!(result.response.header("content-type"), Some("text/plain"));
}

#[tokio::test]
async fn test_network_first_success_is_stored() {
    let f = fixture();
    let url = "http://catalog.test/anime";
    f.up.respond(url, 200, "anime list");
    let dynamic_p = f.registry.partition(PartitionRole::Dynamic);

    let result = f
        .executor
        .network_first(&get(url), dynamic_p.clone(), Duration::from_secs(1))
        .await
        .unwrap();

    assert_eq!(result.source, ResponseSource::Network);
    eventually("dynamic entry written", || {
        dynamic_p.lookup(&get(url).cache_key()) == Some(snapshot(200, "anime list"))
    })
    .await;
}

#[tokio::test]
async fn test_network_first_timeout_serves_cache_then_warms() {
    let f = fixture();
    let url = "http://catalog.test/movies";
    let dynamic_p = f.registry.partition(PartitionRole::Dynamic);
    seed(&dynamic_p, url, "stale movies");
    f.up.respond_after(url, Duration::from_millis(200), 200, "fresh movies");

    let result = f
        .executor
        .network_first(&get(url), dynamic_p.clone(), Duration::from_millis(30))
        .await
        .unwrap();

    assert_eq!(result.source, ResponseSource::Cache);
    assert_eq!(body(&result), b"stale movies");

    // The losing fetch keeps running and refreshes the entry.
    eventually("late response warms the cache", || {
        dynamic_p.lookup(&get(url).cache_key()) == Some(snapshot(200, "fresh movies"))
    })
    .await;
}

#[tokio::test]
async fn test_network_first_abort_on_timeout_cancels_fetch() {
    let f = fixture_with(Arc::new(MemoryStorage::unbounded()), true);
    let url = "http://catalog.test/movies";
    let dynamic_p = f.registry.partition(PartitionRole::Dynamic);
    seed(&dynamic_p, url, "stale movies");
    f.up.respond_after(url, Duration::from_millis(100), 200, "fresh movies");

    let result = f
        .executor
        .network_first(&get(url), dynamic_p.clone(), Duration::from_millis(20))
        .await
        .unwrap();
    assert_eq!(body(&result), b"stale movies");

    tokio::time::sleep(Duration::from_millis(250)).await;
    assert_eq!(f.up.calls(url), 1);
    assert_eq!(f.up.completed(), 0);
    assert_eq!(
        dynamic_p.lookup(&get(url).cache_key()),
        Some(snapshot(200, "stale movies"))
    );
}

#[tokio::test]
async fn test_network_first_navigation_failure_serves_offline_page() {
    let f = fixture();
    seed(&f.registry.partition(PartitionRole::Static), OFFLINE_URL, "offline page");
    f.up.fail("http://catalog.test/watch/99");

    let result = f
        .executor
        .network_first(
            &navigation("http://catalog.test/watch/99"),
            f.registry.partition(PartitionRole::Dynamic),
            Duration::from_secs(1),
        )
        .await
        .unwrap();

    assert_eq!(result.source, ResponseSource::Offline);
    assert_eq!(body(&result), b"offline page");
}

#[tokio::test]
async fn test_network_first_timeout_without_cache_propagates() {
    let f = fixture();
    let url = "https://x.supabase.co/rest/v1/series";
    f.up.respond_after(url, Duration::from_millis(200), 200, "[]");

    let err = f
        .executor
        .network_first(
            &get(url),
            f.registry.partition(PartitionRole::Api),
            Duration::from_millis(20),
        )
        .await
        .unwrap_err();

    assert_eq!(err, FetchError::Timeout(Duration::from_millis(20)));
}

#[tokio::test]
async fn test_failed_cache_write_keeps_response() {
    // Quota too small for any entry.
    let f = fixture_with(Arc::new(MemoryStorage::new(8)), false);
    let url = "http://catalog.test/assets/big.css";
    f.up.respond(url, 200, "body { color: red }");
    let static_p = f.registry.partition(PartitionRole::Static);

    let result = f.executor.cache_first(&get(url), static_p.clone()).await.unwrap();

    assert_eq!(result.source, ResponseSource::Network);
    assert_eq!(result.response.body, Bytes::from_static(b"body { color: red }"));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(static_p.is_empty());
}
