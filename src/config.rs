//! Client configuration.
//!
//! Defaults can be overridden from the environment:
//!
//! | Variable                  | Meaning                          | Default |
//! |---------------------------|----------------------------------|---------|
//! | `SEAL_TIMEOUT_SECS`       | Per-request timeout in seconds   | `10`    |
//! | `SEAL_VERIFY_KEY_SERVERS` | Probe servers before first use   | `true`  |

use std::env;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::key_server::KeyServerConfig;

/// Default per-request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Tunables shared by every request a client makes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Bound on each liveness probe and key fetch
    pub timeout: Duration,
    /// Whether servers must pass the liveness probe before use
    pub verify_key_servers: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            verify_key_servers: true,
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(raw) = lookup("SEAL_TIMEOUT_SECS") {
            match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => config.timeout = Duration::from_secs(secs),
                _ => tracing::warn!("Ignoring invalid SEAL_TIMEOUT_SECS={:?}", raw),
            }
        }

        if let Some(raw) = lookup("SEAL_VERIFY_KEY_SERVERS") {
            match raw.trim().to_lowercase().as_str() {
                "1" | "true" | "yes" => config.verify_key_servers = true,
                "0" | "false" | "no" => config.verify_key_servers = false,
                _ => tracing::warn!("Ignoring invalid SEAL_VERIFY_KEY_SERVERS={:?}", raw),
            }
        }

        config
    }
}

/// Everything needed to build a client
#[derive(Debug, Clone, Default)]
pub struct ClientOptions {
    /// Key servers the client may use
    pub server_configs: Vec<KeyServerConfig>,
    /// Request tunables
    pub config: ClientConfig,
}

impl ClientOptions {
    /// Options with the default config
    pub fn new(server_configs: Vec<KeyServerConfig>) -> Self {
        Self {
            server_configs,
            config: ClientConfig::default(),
        }
    }
}

/// Parse a JSON array of key server configs
pub fn key_server_configs_from_json(json: &str) -> Result<Vec<KeyServerConfig>> {
    serde_json::from_str(json)
        .map_err(|e| Error::InvalidClientOptions(format!("invalid key server configs: {}", e)))
}
