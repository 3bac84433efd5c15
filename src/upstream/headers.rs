//! Header filtering between the client, the proxy and the network.

/// Hop-by-hop header names (lowercase) for fast comparison.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "proxy-connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Checks if a header name is hop-by-hop without allocating.
#[inline]
pub fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP.iter().any(|h| h.eq_ignore_ascii_case(name))
}

/// Headers forwarded on a network fetch: end-to-end only, and never `host`,
/// which the client derives from the target URL.
pub fn forwardable_request_headers(headers: &[(String, String)]) -> Vec<(&str, &str)> {
    headers
        .iter()
        .filter(|(name, _)| !is_hop_by_hop(name) && !name.eq_ignore_ascii_case("host"))
        .map(|(name, value)| (name.as_str(), value.as_str()))
        .collect()
}

/// Response headers worth keeping in a snapshot. `content-length` is dropped
/// because the body is buffered and re-framed on the way out.
pub fn process_response_headers(headers: &hyper::HeaderMap) -> Vec<(String, String)> {
    let mut result = Vec::with_capacity(headers.len().min(32));
    for (name, value) in headers.iter() {
        let name = name.as_str();
        if is_hop_by_hop(name) || name.eq_ignore_ascii_case("content-length") {
            continue;
        }
        if let Ok(value) = value.to_str() {
            result.push((name.to_string(), value.to_string()));
        }
    }
    result
}
