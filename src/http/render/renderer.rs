use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, StatusCode},
    response::Response,
};

use crate::http::SOURCE_HEADER;
use crate::model::{ResponseSnapshot, ResponseSource};
use crate::upstream::FetchError;

/// Writes a buffered snapshot, tagging it with its source.
pub fn write_snapshot(snapshot: &ResponseSnapshot, source: ResponseSource) -> Response {
    let mut response = Response::new(Body::from(snapshot.body.clone()));
    *response.status_mut() = StatusCode::from_u16(snapshot.status).unwrap_or(StatusCode::BAD_GATEWAY);

    let headers = response.headers_mut();
    for (k, v) in &snapshot.headers {
        if let (Ok(name), Ok(value)) = (HeaderName::try_from(k.as_str()), HeaderValue::from_str(v)) {
            headers.append(name, value);
        }
    }
    headers.insert(
        HeaderName::from_static(SOURCE_HEADER),
        HeaderValue::from_static(source.as_str()),
    );

    response
}

/// A rejected fetch becomes a gateway error; deadlines map to 504.
pub fn write_fetch_error(err: &FetchError) -> Response {
    let status = match err {
        FetchError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        FetchError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        FetchError::Transport(_) | FetchError::Aborted => StatusCode::BAD_GATEWAY,
    };
    let snapshot = ResponseSnapshot::new(
        status.as_u16(),
        vec![("content-type".to_string(), "text/plain".to_string())],
        bytes::Bytes::from(err.to_string()),
    );
    write_snapshot(&snapshot, ResponseSource::Network)
}
