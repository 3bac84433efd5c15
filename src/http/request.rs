//! Builds request descriptors from incoming HTTP requests.

use axum::body::to_bytes;
use axum::extract::Request;
use axum::http::request::Parts;
use url::Url;

use crate::model::{Destination, RequestDescriptor};

/// Upper bound for forwarded pass-through bodies.
pub const MAX_BODY_BYTES: usize = 16 << 20;

#[derive(Debug, thiserror::Error)]
pub enum DescriptorError {
    #[error("invalid request target {0:?}")]
    InvalidTarget(String),
    #[error("read request body: {0}")]
    Body(String),
}

/// Resolves the request target: absolute-form is taken as is, origin-form is
/// resolved against the scope origin.
pub fn resolve_url(parts: &Parts, origin: &Url) -> Result<Url, DescriptorError> {
    let uri = &parts.uri;
    if uri.scheme().is_some() && uri.authority().is_some() {
        return Url::parse(&uri.to_string()).map_err(|_| DescriptorError::InvalidTarget(uri.to_string()));
    }

    let mut url = origin.clone();
    url.set_path(uri.path());
    url.set_query(uri.query());
    Ok(url)
}

pub fn descriptor_from_parts(parts: &Parts, origin: &Url) -> Result<RequestDescriptor, DescriptorError> {
    let url = resolve_url(parts, origin)?;
    let header = |name: &str| parts.headers.get(name).and_then(|v| v.to_str().ok());

    let destination = Destination::from_fetch_dest(header("sec-fetch-dest"));
    let navigate = header("sec-fetch-mode")
        .map(|mode| mode.eq_ignore_ascii_case("navigate"))
        .unwrap_or(false);

    let headers = parts
        .headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|value| (name.as_str().to_string(), value.to_string()))
        })
        .collect();

    Ok(RequestDescriptor::new(parts.method.clone(), url)
        .with_destination(destination)
        .with_navigate(navigate)
        .with_headers(headers))
}

/// Full descriptor including the body, which is only read for non-GET requests.
pub async fn descriptor_from_request(req: Request, origin: &Url) -> Result<RequestDescriptor, DescriptorError> {
    let (parts, body) = req.into_parts();
    let descriptor = descriptor_from_parts(&parts, origin)?;
    if descriptor.is_get() {
        return Ok(descriptor);
    }

    let bytes = to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|e| DescriptorError::Body(e.to_string()))?;
    Ok(descriptor.with_body(bytes))
}
