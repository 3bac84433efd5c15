// Route registration seam between the proxy and axum.

use axum::Router;

/// A group of routes mounted on the proxy router.
///
/// Admin controllers mount fixed paths under `/shellcache`; the intercept
/// controller installs itself as the fallback and sees everything else.
pub trait Controller: Send + Sync {
    fn add_route(&self, router: Router) -> Router;
}
