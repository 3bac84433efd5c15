// Shared test support code for unit and end-to-end cases.

pub mod common;
pub mod fake_upstream;
pub mod harness;
pub mod origin;

pub use common::*;
pub use fake_upstream::{snapshot, FakeUpstream};
pub use harness::{direct_client, e2e_config, forward_client, start_pair, ProxyServer};
pub use origin::{OriginServer, HOME_BODY, OFFLINE_BODY};
