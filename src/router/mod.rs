//! Request classification into {partition, strategy} pairs.


use std::time::Duration;
use url::Url;

use crate::config::{Config, ConfigTrait};
use crate::model::{Destination, RequestDescriptor};
use crate::registry::PartitionRole;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    CacheFirst,
    NetworkFirst { timeout: Duration },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub role: PartitionRole,
    pub strategy: Strategy,
}

impl Route {
    fn new(role: PartitionRole, strategy: Strategy) -> Self {
        Self { role, strategy }
    }
}

/// Pure classifier; first matching rule wins.
#[derive(Debug, Clone)]
pub struct RequestRouter {
    origin: Url,
    static_prefix: String,
    api_host_fragment: String,
    timeout: Duration,
    api_timeout: Duration,
}

impl RequestRouter {
    pub fn new(
        origin: Url,
        static_prefix: impl Into<String>,
        api_host_fragment: impl Into<String>,
        timeout: Duration,
        api_timeout: Duration,
    ) -> Self {
        Self {
            origin,
            static_prefix: static_prefix.into(),
            api_host_fragment: api_host_fragment.into(),
            timeout,
            api_timeout,
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self::new(
            cfg.scope().origin.clone(),
            cfg.cache().static_prefix.clone(),
            cfg.cache().api_host_fragment.clone(),
            cfg.network().timeout,
            cfg.network().api_timeout,
        )
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    /// Returns `None` when the request must not be intercepted.
    pub fn classify(&self, req: &RequestDescriptor) -> Option<Route> {
        if !req.is_get() {
            return None;
        }

        let image = req.destination == Destination::Image;

        if req.is_same_origin(&self.origin) {
            let route = if image {
                Route::new(PartitionRole::Image, Strategy::CacheFirst)
            } else if req.path().starts_with(&self.static_prefix) {
                Route::new(PartitionRole::Static, Strategy::CacheFirst)
            } else {
                Route::new(
                    PartitionRole::Dynamic,
                    Strategy::NetworkFirst {
                        timeout: self.timeout,
                    },
                )
            };
            return Some(route);
        }

        if req.hostname().contains(self.api_host_fragment.as_str()) {
            return Some(Route::new(
                PartitionRole::Api,
                Strategy::NetworkFirst {
                    timeout: self.api_timeout,
                },
            ));
        }

        if image {
            return Some(Route::new(PartitionRole::Image, Strategy::CacheFirst));
        }

        None
    }
}
