//! Client and server configuration.
//!
//! Both ends are configured with plain value types built from `const`
//! defaults and `with_*` builder methods.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use domsync::ClientConfig;
//!
//! let config = ClientConfig::new()
//!     .with_reconnect_delay(Duration::from_millis(250))
//!     .with_marker_attribute("data-sync-id");
//!
//! let url = config.endpoint(9000)?;
//! // ws://127.0.0.1:9000/UiHandler
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use url::Url;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Fixed sub-path both ends use for the WebSocket endpoint.
pub const DEFAULT_PATH: &str = "/UiHandler";

/// Host the client dials by default.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Reserved DOM attribute carrying the element identifier.
pub const DEFAULT_MARKER_ATTRIBUTE: &str = "uielement";

/// Constant reconnect backoff.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Limit on one connect attempt, handshake included.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Interval of the subscription-repair poll.
pub const DEFAULT_REPAIR_INTERVAL: Duration = Duration::from_secs(3);

/// Ancestor levels searched for the marker on character-data mutations.
pub const DEFAULT_MAX_ANCESTOR_DEPTH: usize = 15;

/// Default bind address for the server (localhost).
pub const DEFAULT_BIND_IP: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

// ============================================================================
// ClientConfig
// ============================================================================

/// Browser-side session configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Host to dial.
    pub host: String,

    /// WebSocket sub-path.
    pub path: String,

    /// Attribute carrying the element identifier.
    pub marker_attribute: String,

    /// Delay before each reconnect attempt.
    pub reconnect_delay: Duration,

    /// Limit on one connect attempt, handshake included.
    pub connect_timeout: Duration,

    /// Interval of the subscription-repair poll.
    pub repair_interval: Duration,

    /// Ancestor depth bound for character-data mutations.
    pub max_ancestor_depth: usize,

    /// Drop duplicate notifications within one mutation batch.
    pub coalesce_mutations: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientConfig {
    /// Creates a configuration with default settings.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            path: DEFAULT_PATH.to_string(),
            marker_attribute: DEFAULT_MARKER_ATTRIBUTE.to_string(),
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            repair_interval: DEFAULT_REPAIR_INTERVAL,
            max_ancestor_depth: DEFAULT_MAX_ANCESTOR_DEPTH,
            coalesce_mutations: false,
        }
    }

    /// Sets the host to dial.
    #[inline]
    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Sets the WebSocket sub-path.
    #[inline]
    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Sets the marker attribute name.
    #[inline]
    #[must_use]
    pub fn with_marker_attribute(mut self, name: impl Into<String>) -> Self {
        self.marker_attribute = name.into();
        self
    }

    /// Sets the reconnect backoff.
    #[inline]
    #[must_use]
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Sets the limit on one connect attempt.
    #[inline]
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the subscription-repair interval.
    #[inline]
    #[must_use]
    pub fn with_repair_interval(mut self, interval: Duration) -> Self {
        self.repair_interval = interval;
        self
    }

    /// Sets the ancestor depth bound.
    #[inline]
    #[must_use]
    pub fn with_max_ancestor_depth(mut self, depth: usize) -> Self {
        self.max_ancestor_depth = depth;
        self
    }

    /// Enables coalescing of duplicate notifications per batch.
    #[inline]
    #[must_use]
    pub fn with_coalesced_mutations(mut self) -> Self {
        self.coalesce_mutations = true;
        self
    }

    /// Builds the endpoint URL for a port.
    ///
    /// Format: `ws://{host}:{port}{path}`
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the path does not start with `/` or the marker
    ///   attribute is empty
    /// - [`Error::Url`] if the host does not form a valid URL
    pub fn endpoint(&self, port: u16) -> Result<Url> {
        self.validate()?;
        let url = Url::parse(&format!("ws://{}:{}{}", self.host, port, self.path))?;
        Ok(url)
    }

    /// Checks the configuration for values that can never work.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first invalid field.
    pub fn validate(&self) -> Result<()> {
        if !self.path.starts_with('/') {
            return Err(Error::config(format!(
                "path must start with '/', got '{}'",
                self.path
            )));
        }
        if self.marker_attribute.is_empty() {
            return Err(Error::config("marker attribute must not be empty"));
        }
        if self.repair_interval.is_zero() {
            return Err(Error::config("repair interval must be non-zero"));
        }
        if self.connect_timeout.is_zero() {
            return Err(Error::config("connect timeout must be non-zero"));
        }
        Ok(())
    }
}

// ============================================================================
// ServerConfig
// ============================================================================

/// Server-side peer configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address to bind.
    pub ip: IpAddr,

    /// Port to bind (0 for random).
    pub port: u16,

    /// WebSocket sub-path accepted during the upgrade.
    pub path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerConfig {
    /// Creates a configuration bound to a random localhost port.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            ip: DEFAULT_BIND_IP,
            port: 0,
            path: DEFAULT_PATH.to_string(),
        }
    }

    /// Sets the bind address.
    #[inline]
    #[must_use]
    pub fn with_ip(mut self, ip: IpAddr) -> Self {
        self.ip = ip;
        self
    }

    /// Sets the bind port.
    #[inline]
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the accepted sub-path.
    #[inline]
    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Checks the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the path does not start with `/`.
    pub fn validate(&self) -> Result<()> {
        if !self.path.starts_with('/') {
            return Err(Error::config(format!(
                "path must start with '/', got '{}'",
                self.path
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
