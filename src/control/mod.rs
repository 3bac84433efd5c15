//! Out-of-band commands posted by the hosting page.

use serde::Deserialize;

/// `{"type": "SKIP_WAITING"}` or `{"type": "CLEAR_CACHE"}`; any other type is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlCommand {
    SkipWaiting,
    ClearCache,
    #[serde(other)]
    Unknown,
}

impl ControlCommand {
    pub fn parse(raw: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(raw)
    }
}
