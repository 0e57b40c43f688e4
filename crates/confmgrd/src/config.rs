//! Daemon configuration.
//!
//! Loaded from a TOML file; every field has a default so a missing file or
//! a partial one is fine.
//!
//! ```toml
//! client_file = "/etc/confmgr/clients.json"
//! object_files = ["/etc/confmgr/objects.json", "/etc/confmgr/objects-local.json"]
//! status_socket = "/run/confmgr/status.sock"
//! known_clients = ["bgpd", "vland"]
//!
//! [retry]
//! initial_delay_ms = 1000
//! max_delay_ms = 30000
//! multiplier = 2.0
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::registry::RetryPolicy;

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "CONFMGR_CONFIG";

/// Configuration file used when none is given.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/confmgr/confmgrd.toml";

/// Default status feed socket.
pub const DEFAULT_STATUS_SOCKET: &str = "/tmp/confmgr-status.sock";

/// Subsystem daemons with a client implementation out of the box.
pub const DEFAULT_KNOWN_CLIENTS: &[&str] = &[
    "arpd", "asicd", "bfdd", "bgpd", "dhcprelayd", "lacpd", "lldpd", "ospfd", "ribd", "stpd",
    "sysd", "vland", "vxland",
];

/// Errors loading the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Top-level daemon configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DaemonConfig {
    /// JSON list of `{Name, Port}` client descriptors.
    pub client_file: PathBuf,

    /// JSON object descriptor files, applied in order.
    pub object_files: Vec<PathBuf>,

    /// Unix socket receiving daemon status lines.
    pub status_socket: PathBuf,

    /// Daemon names the TCP client implementation is offered for.
    pub known_clients: Vec<String>,

    pub retry: RetryConfig,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            client_file: PathBuf::from("/etc/confmgr/clients.json"),
            object_files: vec![PathBuf::from("/etc/confmgr/objects.json")],
            status_socket: PathBuf::from(DEFAULT_STATUS_SOCKET),
            known_clients: DEFAULT_KNOWN_CLIENTS.iter().map(|s| s.to_string()).collect(),
            retry: RetryConfig::default(),
        }
    }
}

/// `[retry]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryConfig {
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
    pub bulk_progress_every: u32,
    pub reconnect_progress_every: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            initial_delay_ms: policy.initial_delay.as_millis() as u64,
            max_delay_ms: policy.max_delay.as_millis() as u64,
            multiplier: policy.multiplier,
            bulk_progress_every: policy.bulk_progress_every,
            reconnect_progress_every: policy.reconnect_progress_every,
        }
    }
}

impl RetryConfig {
    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy {
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            multiplier: self.multiplier,
            bulk_progress_every: self.bulk_progress_every,
            reconnect_progress_every: self.reconnect_progress_every,
        }
    }
}

impl DaemonConfig {
    /// Reads and validates a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Reads `path` if it exists, otherwise returns the defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let retry = &self.retry;
        if retry.initial_delay_ms == 0 {
            return Err(ConfigError::Invalid(
                "retry.initial_delay_ms must be positive".to_string(),
            ));
        }
        if retry.max_delay_ms < retry.initial_delay_ms {
            return Err(ConfigError::Invalid(format!(
                "retry.max_delay_ms ({}) is below retry.initial_delay_ms ({})",
                retry.max_delay_ms, retry.initial_delay_ms
            )));
        }
        if !retry.multiplier.is_finite() || retry.multiplier < 1.0 {
            return Err(ConfigError::Invalid(format!(
                "retry.multiplier must be at least 1.0, got {}",
                retry.multiplier
            )));
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry.to_policy()
    }
}
