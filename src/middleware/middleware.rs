use axum::Router;

/// Wraps the whole proxy router, admin and intercepted routes alike.
pub trait Middleware: Send + Sync {
    fn apply(&self, router: Router) -> Router;
}
