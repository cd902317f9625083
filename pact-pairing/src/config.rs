#![forbid(unsafe_code)]

//! Pairing configuration. Parses a TOML fragment into a strongly-typed
//! structure; every field has a default so partial configs are fine.

use serde::Deserialize;
use std::time::Duration;

use crate::Result;

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct PairingConfig {
    /// Application name, first content-topic segment.
    pub application_name: String,
    /// Application version, second content-topic segment.
    pub application_version: String,
    /// Shard the pairing meets on, third content-topic segment.
    pub shard_id: String,
    /// Wall-clock budget for the whole pairing exchange.
    pub timeout_ms: u64,
}

impl Default for PairingConfig {
    fn default() -> Self {
        Self {
            application_name: "pact".into(),
            application_version: "1".into(),
            shard_id: "0".into(),
            timeout_ms: 60_000,
        }
    }
}

impl PairingConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}
