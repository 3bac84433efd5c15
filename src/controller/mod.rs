// HTTP controllers: interception, control channel, introspection and probes.

pub mod controller;
pub mod intercept;
pub mod message;
pub mod metrics;
pub mod probe;
pub mod state;

pub use controller::Controller;
pub use intercept::InterceptController;
pub use message::{ControlMessageController, UnregisterController};
pub use metrics::{init_prometheus_exporter, PrometheusMetricsController};
pub use probe::LivenessProbeController;
pub use state::StateController;

/// Prefix reserved for the proxy's own endpoints.
pub const ADMIN_PREFIX: &str = "/shellcache";
