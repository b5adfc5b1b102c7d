//! Resolved server and connection configuration
//!
//! The toolkit never reads the environment itself. Callers resolve flags,
//! files or environment variables into a [`ServerConfig`] and hand it in.

use crate::error::{NzbError, Result};
use std::time::Duration;

/// Default number of simultaneous connections (and in-flight transforms)
pub const DEFAULT_CONNECTIONS: usize = 3;

/// Server configuration used by the mirror pipeline
///
/// Only `connections` drives the pipeline directly: it is the bound on
/// concurrently running transforms. The remaining fields are carried for
/// transforms that talk to a server.
///
/// # Example
///
/// ```
/// use nzb_toolkit::ServerConfig;
///
/// let config = ServerConfig::tls("news.example.com", "user", "pass").connections(8);
/// assert_eq!(config.port, 563);
/// assert!(config.validate().is_ok());
/// ```
#[must_use]
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ServerConfig {
    /// Server hostname (e.g., "news.example.com")
    pub host: String,

    /// Server port (typically 119 for plain, 563 for TLS)
    pub port: u16,

    /// Use TLS/SSL encryption
    #[cfg_attr(feature = "serde", serde(default))]
    pub tls: bool,

    /// Username for authentication
    #[cfg_attr(feature = "serde", serde(default))]
    pub username: String,

    /// Password for authentication
    #[cfg_attr(feature = "serde", serde(default))]
    pub password: String,

    /// Maximum number of simultaneous connections
    #[cfg_attr(feature = "serde", serde(default = "default_connections"))]
    pub connections: usize,

    /// Attempts made to establish a connection
    #[cfg_attr(feature = "serde", serde(default = "default_retries"))]
    pub connect_retries: u32,

    /// Delay between reconnect attempts
    #[cfg_attr(feature = "serde", serde(default = "default_delay"))]
    pub reconnect_delay: Duration,

    /// Attempts made for a single request
    #[cfg_attr(feature = "serde", serde(default = "default_retries"))]
    pub request_retries: u32,

    /// Delay before re-posting a rejected article
    #[cfg_attr(feature = "serde", serde(default = "default_delay"))]
    pub post_retry_delay: Duration,
}

#[cfg(feature = "serde")]
fn default_connections() -> usize {
    DEFAULT_CONNECTIONS
}

#[cfg(feature = "serde")]
fn default_retries() -> u32 {
    3
}

#[cfg(feature = "serde")]
fn default_delay() -> Duration {
    Duration::from_secs(1)
}

impl ServerConfig {
    /// Create a new server configuration with default connection settings
    pub fn new(
        host: impl Into<String>,
        port: u16,
        tls: bool,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            tls,
            username: username.into(),
            password: password.into(),
            connections: DEFAULT_CONNECTIONS,
            connect_retries: 3,
            reconnect_delay: Duration::from_secs(1),
            request_retries: 3,
            post_retry_delay: Duration::from_secs(1),
        }
    }

    /// Create a configuration for a TLS connection on the standard secure port (563)
    pub fn tls(
        host: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self::new(host, 563, true, username, password)
    }

    /// Create a configuration for a plain connection on the standard port (119)
    pub fn plain(
        host: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self::new(host, 119, false, username, password)
    }

    /// Set the number of simultaneous connections
    pub fn connections(mut self, connections: usize) -> Self {
        self.connections = connections;
        self
    }

    /// Set connect/request retry counts
    pub fn retries(mut self, connect_retries: u32, request_retries: u32) -> Self {
        self.connect_retries = connect_retries;
        self.request_retries = request_retries;
        self
    }

    /// Check that the configuration is usable
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(NzbError::InvalidConfig("hostname is required".to_string()));
        }
        if self.port == 0 {
            return Err(NzbError::InvalidConfig("port is required".to_string()));
        }
        if self.connections == 0 {
            return Err(NzbError::InvalidConfig(
                "connections must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
