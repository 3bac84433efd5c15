// HTTP module: server, client, request adaptation and rendering.

pub mod client;
pub mod render;
pub mod request;
pub mod server;


pub use crate::controller::controller::Controller;
pub use crate::middleware::middleware::Middleware;
pub use server::{HttpServer, Server};

/// Header naming where a response came from.
pub const SOURCE_HEADER: &str = "x-shellcache-source";
