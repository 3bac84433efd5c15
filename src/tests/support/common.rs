// Small helpers shared by unit and end-to-end cases.

use std::time::Duration;

/// Polls `cond` until it holds, failing the test after ~2s.
///
/// Cache writes are spawned, so assertions on partition contents wait here.
pub async fn eventually<F: Fn() -> bool>(what: &str, cond: F) {
    for _ in 0..200 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met in time: {}", what);
}

/// Sends the request and returns status, `x-shellcache-source` and body.
pub async fn send(req: reqwest::RequestBuilder) -> (u16, String, String) {
    let resp = req.send().await.expect("request failed");
    let status = resp.status().as_u16();
    let source = resp
        .headers()
        .get(crate::http::SOURCE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let body = resp.text().await.expect("read body");
    (status, source, body)
}
