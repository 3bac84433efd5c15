// Package model provides the request descriptor seen by the router and strategies.

use axum::http::Method;
use bytes::Bytes;
use url::Url;

use super::keys::CacheKey;

/// Kind of resource a request is fetching, as reported by `Sec-Fetch-Dest`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    Document,
    Image,
    Script,
    Style,
    Font,
    Manifest,
    Other,
    /// Header absent or empty.
    Empty,
}

impl Destination {
    pub fn from_fetch_dest(value: Option<&str>) -> Self {
        match value.map(str::trim).map(str::to_ascii_lowercase).as_deref() {
            None | Some("") | Some("empty") => Destination::Empty,
            Some("document") | Some("iframe") | Some("frame") => Destination::Document,
            Some("image") => Destination::Image,
            Some("script") | Some("worker") | Some("sharedworker") => Destination::Script,
            Some("style") => Destination::Style,
            Some("font") => Destination::Font,
            Some("manifest") => Destination::Manifest,
            Some(_) => Destination::Other,
        }
    }
}

/// Descriptor of an intercepted request.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    pub method: Method,
    pub url: Url,
    pub destination: Destination,
    pub navigate: bool,
    pub headers: Vec<(String, String)>,
    pub body: Option<Bytes>,
}

impl RequestDescriptor {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            destination: Destination::Empty,
            navigate: false,
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn with_destination(mut self, destination: Destination) -> Self {
        self.destination = destination;
        self
    }

    /// Marks the request as a top-level navigation.
    pub fn with_navigate(mut self, navigate: bool) -> Self {
        self.navigate = navigate;
        self
    }

    pub fn with_headers(mut self, headers: Vec<(String, String)>) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_body(mut self, body: Bytes) -> Self {
        self.body = if body.is_empty() { None } else { Some(body) };
        self
    }

    pub fn is_get(&self) -> bool {
        self.method == Method::GET
    }

    /// A navigation either carries the navigate mode or targets a document.
    pub fn is_navigation(&self) -> bool {
        self.navigate || self.destination == Destination::Document
    }

    pub fn is_same_origin(&self, scope: &Url) -> bool {
        self.url.origin() == scope.origin()
    }

    pub fn hostname(&self) -> &str {
        self.url.host_str().unwrap_or_default()
    }

    pub fn path(&self) -> &str {
        self.url.path()
    }

    pub fn cache_key(&self) -> CacheKey {
        CacheKey::new(&self.method, &self.url)
    }
}
