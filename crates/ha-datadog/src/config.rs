//! Integration configuration parsed from a config entry

use std::net::{SocketAddr, ToSocketAddrs};

use ha_config_entries::ConfigEntry;
use thiserror::Error;

/// Configuration key for the agent host (entry data)
pub const CONF_HOST: &str = "host";
/// Configuration key for the agent port (entry data)
pub const CONF_PORT: &str = "port";
/// Configuration key for the metric name prefix (entry options)
pub const CONF_PREFIX: &str = "prefix";
/// Configuration key for the client-side sample rate (entry options)
pub const CONF_RATE: &str = "rate";

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 8125;
pub const DEFAULT_PREFIX: &str = "hass";
pub const DEFAULT_RATE: f32 = 1.0;

/// Result type for integration operations
pub type DatadogResult<T> = Result<T, DatadogError>;

/// Errors raised while setting up or tearing down the integration
#[derive(Debug, Error)]
pub enum DatadogError {
    /// A config entry field has the wrong type or an out-of-range value
    #[error("invalid configuration value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },

    /// The agent endpoint did not resolve to a socket address
    #[error("cannot resolve statsd endpoint {endpoint}: {source}")]
    Resolve {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },

    /// Binding the local UDP socket failed
    #[error("failed to bind statsd socket: {0}")]
    Socket(#[from] std::io::Error),
}

/// Settings for one Datadog agent connection
///
/// Host and port come from the entry's immutable data; prefix and sample
/// rate from its mutable options. Missing fields take the defaults, fields
/// of the wrong shape fail parsing.
#[derive(Debug, Clone)]
pub struct DatadogConfig {
    /// Agent host name or address
    pub host: String,
    /// Agent DogStatsD port
    pub port: u16,
    /// Metric name prefix, may be empty to disable prefixing
    pub prefix: String,
    /// Client-side sample rate in (0, 1]
    pub sample_rate: f32,
}

impl DatadogConfig {
    /// Parse the configuration out of a config entry
    pub fn from_entry(entry: &ConfigEntry) -> DatadogResult<Self> {
        let host = match entry.data.get(CONF_HOST) {
            None => DEFAULT_HOST.to_string(),
            Some(value) => value
                .as_str()
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .ok_or_else(|| invalid(CONF_HOST, "expected a non-empty string"))?,
        };

        let port = match entry.data.get(CONF_PORT) {
            None => DEFAULT_PORT,
            Some(value) => value
                .as_u64()
                .and_then(|p| u16::try_from(p).ok())
                .filter(|p| *p != 0)
                .ok_or_else(|| invalid(CONF_PORT, "expected a port number"))?,
        };

        let prefix = match entry.options.get(CONF_PREFIX) {
            None => DEFAULT_PREFIX.to_string(),
            Some(value) => value
                .as_str()
                .map(str::to_string)
                .ok_or_else(|| invalid(CONF_PREFIX, "expected a string"))?,
        };

        let sample_rate = match entry.options.get(CONF_RATE) {
            None => DEFAULT_RATE,
            Some(value) => value
                .as_f64()
                .filter(|r| *r > 0.0 && *r <= 1.0)
                .map(|r| r as f32)
                .ok_or_else(|| invalid(CONF_RATE, "expected a sample rate in (0, 1]"))?,
        };

        Ok(Self {
            host,
            port,
            prefix,
            sample_rate,
        })
    }

    /// Resolve the configured endpoint to a socket address
    pub fn resolve(&self) -> DatadogResult<SocketAddr> {
        let endpoint = format!("{}:{}", self.host, self.port);
        let mut addrs =
            (self.host.as_str(), self.port)
                .to_socket_addrs()
                .map_err(|source| DatadogError::Resolve {
                    endpoint: endpoint.clone(),
                    source,
                })?;
        addrs.next().ok_or_else(|| DatadogError::Resolve {
            endpoint,
            source: std::io::Error::new(
                std::io::ErrorKind::AddrNotAvailable,
                "no addresses returned",
            ),
        })
    }
}

fn invalid(key: &str, reason: &str) -> DatadogError {
    DatadogError::InvalidValue {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}
