//! Error types for domsync.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use domsync::{Result, Error};
//!
//! fn example(element: &RemoteElement) -> Result<()> {
//!     element.set("disabled", true)?;
//!     element.invoke("focus", vec![])?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`], [`Error::InvalidSchema`] |
//! | Connection | [`Error::Connection`], [`Error::ConnectionTimeout`], [`Error::ConnectionClosed`] |
//! | Protocol | [`Error::Protocol`] |
//! | Element | [`Error::UnknownElement`], [`Error::DuplicateElement`], [`Error::UnknownElementType`] |
//! | Descriptor | [`Error::UnknownProperty`], [`Error::ReadOnlyProperty`], [`Error::UnknownMethod`], [`Error::UnknownEvent`], [`Error::UnknownVariable`] |
//! | Host | [`Error::PropertyAccess`] |
//! | External | [`Error::Io`], [`Error::Json`], [`Error::WebSocket`], [`Error::Url`] |
//!
//! Nothing on the protocol path is fatal. The transport absorbs connection
//! errors and retries; the router logs and skips element-level failures.

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

use crate::identifiers::ElementId;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// Element schema declaration is invalid.
    ///
    /// Returned when a schema declares the same wire name twice or a type
    /// name is registered twice.
    #[error("Invalid schema '{type_name}': {message}")]
    InvalidSchema {
        /// Element type the schema describes.
        type_name: String,
        /// Description of the problem.
        message: String,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// WebSocket connection failed.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// Timed out waiting for the peer to connect.
    #[error("Connection timeout after {timeout_ms}ms")]
    ConnectionTimeout {
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// WebSocket connection closed.
    #[error("Connection closed")]
    ConnectionClosed,

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// Malformed or unexpected message.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    // ========================================================================
    // Element Errors
    // ========================================================================
    /// Operation referenced an identifier that is not registered.
    #[error("Unknown element: {element_id}")]
    UnknownElement {
        /// The unregistered identifier.
        element_id: ElementId,
    },

    /// An element with this identifier already exists in the session.
    #[error("Duplicate element: {element_id}")]
    DuplicateElement {
        /// The identifier already in use.
        element_id: ElementId,
    },

    /// No schema registered for the element type.
    #[error("Unknown element type: {type_name}")]
    UnknownElementType {
        /// The unregistered type name.
        type_name: String,
    },

    // ========================================================================
    // Descriptor Errors
    // ========================================================================
    /// Property not declared by the element type.
    #[error("Unknown property '{property}' on {type_name}")]
    UnknownProperty {
        /// Element type name.
        type_name: String,
        /// Property wire name.
        property: String,
    },

    /// Property is declared read-only.
    #[error("Property '{property}' on {type_name} is read-only")]
    ReadOnlyProperty {
        /// Element type name.
        type_name: String,
        /// Property wire name.
        property: String,
    },

    /// Method not declared by the element type.
    #[error("Unknown method '{method}' on {type_name}")]
    UnknownMethod {
        /// Element type name.
        type_name: String,
        /// Method wire name.
        method: String,
    },

    /// Event not declared by the element type.
    #[error("Unknown event '{event}' on {type_name}")]
    UnknownEvent {
        /// Element type name.
        type_name: String,
        /// Event wire name.
        event: String,
    },

    /// Variable not declared by the element type.
    #[error("Unknown variable '{variable}' on {type_name}")]
    UnknownVariable {
        /// Element type name.
        type_name: String,
        /// Variable name.
        variable: String,
    },

    // ========================================================================
    // Host Errors
    // ========================================================================
    /// The host node lacks the named property or rejected the access.
    #[error("Property access failed for '{property}': {message}")]
    PropertyAccess {
        /// Property or attribute name.
        property: String,
        /// Description from the host.
        message: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] Box<WsError>),

    /// Endpoint URL error.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}

impl From<WsError> for Error {
    #[inline]
    fn from(err: WsError) -> Self {
        Self::WebSocket(Box::new(err))
    }
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates an invalid schema error.
    #[inline]
    pub fn invalid_schema(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidSchema {
            type_name: type_name.into(),
            message: message.into(),
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a connection timeout error.
    #[inline]
    pub fn connection_timeout(timeout_ms: u64) -> Self {
        Self::ConnectionTimeout { timeout_ms }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates an unknown element error.
    #[inline]
    pub fn unknown_element(element_id: ElementId) -> Self {
        Self::UnknownElement { element_id }
    }

    /// Creates a duplicate element error.
    #[inline]
    pub fn duplicate_element(element_id: ElementId) -> Self {
        Self::DuplicateElement { element_id }
    }

    /// Creates an unknown element type error.
    #[inline]
    pub fn unknown_element_type(type_name: impl Into<String>) -> Self {
        Self::UnknownElementType {
            type_name: type_name.into(),
        }
    }

    /// Creates an unknown property error.
    #[inline]
    pub fn unknown_property(type_name: impl Into<String>, property: impl Into<String>) -> Self {
        Self::UnknownProperty {
            type_name: type_name.into(),
            property: property.into(),
        }
    }

    /// Creates a read-only property error.
    #[inline]
    pub fn read_only_property(type_name: impl Into<String>, property: impl Into<String>) -> Self {
        Self::ReadOnlyProperty {
            type_name: type_name.into(),
            property: property.into(),
        }
    }

    /// Creates an unknown method error.
    #[inline]
    pub fn unknown_method(type_name: impl Into<String>, method: impl Into<String>) -> Self {
        Self::UnknownMethod {
            type_name: type_name.into(),
            method: method.into(),
        }
    }

    /// Creates an unknown event error.
    #[inline]
    pub fn unknown_event(type_name: impl Into<String>, event: impl Into<String>) -> Self {
        Self::UnknownEvent {
            type_name: type_name.into(),
            event: event.into(),
        }
    }

    /// Creates an unknown variable error.
    #[inline]
    pub fn unknown_variable(type_name: impl Into<String>, variable: impl Into<String>) -> Self {
        Self::UnknownVariable {
            type_name: type_name.into(),
            variable: variable.into(),
        }
    }

    /// Creates a property access error.
    #[inline]
    pub fn property_access(property: impl Into<String>, message: impl Into<String>) -> Self {
        Self::PropertyAccess {
            property: property.into(),
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is an element lookup error.
    #[inline]
    #[must_use]
    pub fn is_element_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownElement { .. }
                | Self::DuplicateElement { .. }
                | Self::UnknownElementType { .. }
        )
    }

    /// Returns `true` if this is a descriptor violation.
    #[inline]
    #[must_use]
    pub fn is_descriptor_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownProperty { .. }
                | Self::ReadOnlyProperty { .. }
                | Self::UnknownMethod { .. }
                | Self::UnknownEvent { .. }
                | Self::UnknownVariable { .. }
        )
    }

    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. }
                | Self::ConnectionTimeout { .. }
                | Self::ConnectionClosed
                | Self::WebSocket(_)
        )
    }

    /// Returns `true` if this error is recoverable.
    ///
    /// Connection loss is repaired by automatic reconnection; property
    /// access failures leave the element stale until the next update.
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        self.is_connection_error() || matches!(self, Self::PropertyAccess { .. })
    }
}

// ============================================================================
// Tests
// ============================================================================
