//! Server configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::PeerShareError;

/// Environment variable for [`ServerConfig::bind_addr`].
pub const BIND_ADDR_VAR: &str = "PEERSHARE_BIND_ADDR";
/// Environment variable for [`ServerConfig::idle_timeout`], in seconds.
pub const IDLE_TIMEOUT_VAR: &str = "PEERSHARE_IDLE_TIMEOUT_SECS";

/// Settings for the signaling server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the WebSocket listener binds to.
    pub bind_addr: String,

    /// How long a connection may stay silent before it is closed and its
    /// session torn down.
    pub idle_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            idle_timeout: Duration::from_secs(10 * 60),
        }
    }
}

impl ServerConfig {
    /// Reads overrides from `PEERSHARE_BIND_ADDR` and
    /// `PEERSHARE_IDLE_TIMEOUT_SECS`; unset variables keep their defaults.
    ///
    /// # Errors
    /// [`PeerShareError::Config`] if the timeout is not a positive integer.
    pub fn from_env() -> Result<Self, PeerShareError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env), reading variables through `lookup`.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, PeerShareError> {
        let mut config = Self::default();
        if let Some(addr) = lookup(BIND_ADDR_VAR) {
            config.bind_addr = addr;
        }
        if let Some(raw) = lookup(IDLE_TIMEOUT_VAR) {
            let secs: u64 = raw.trim().parse().map_err(|_| {
                PeerShareError::Config(format!("{IDLE_TIMEOUT_VAR}={raw:?} is not a number"))
            })?;
            if secs == 0 {
                return Err(PeerShareError::Config(format!(
                    "{IDLE_TIMEOUT_VAR} must be positive"
                )));
            }
            config.idle_timeout = Duration::from_secs(secs);
        }
        Ok(config)
    }
}
