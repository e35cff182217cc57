//! DOM state synchronization over WebSocket.
//!
//! This library keeps a server-side element model and live browser DOM
//! nodes consistent over one persistent WebSocket connection.
//!
//! # Architecture
//!
//! The protocol has two ends:
//!
//! - **Client (browser side)**: tracks marked nodes, detects mutations,
//!   answers property requests, relays subscribed events
//! - **Server**: declares element types, caches property values, drives
//!   writes, method calls and variable updates
//!
//! Key design principles:
//!
//! - Every frame is `{requestType, uiElementId, data}` JSON; no request tokens
//! - Replies are matched by element id and property name, last-write-wins
//! - Sends while disconnected are dropped, never buffered
//! - Lost state is repaired by the client's periodic event re-request
//!
//! # Quick Start
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use domsync::client::{ClientSession, DomNode, MemoryNode};
//! use domsync::server::{ElementSchema, PropertyDescriptor, SchemaRegistry, ServerPeer};
//! use domsync::{ClientConfig, Result, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let mut schemas = SchemaRegistry::new();
//!     schemas.register(
//!         ElementSchema::builder("Button")
//!             .event("click")
//!             .property(PropertyDescriptor::attribute("disabled"))
//!             .build()?,
//!     )?;
//!
//!     let peer = ServerPeer::bind(ServerConfig::new(), schemas).await?;
//!     let button = peer.create_element("Button", "btn1")?;
//!
//!     let session = ClientSession::new(ClientConfig::new())?;
//!     let node = MemoryNode::element("button");
//!     node.set_attribute("uielement", "btn1")?;
//!     session.add_element("btn1", node.as_node());
//!     session.start(peer.port())?;
//!
//!     peer.wait_connected(Duration::from_secs(5)).await?;
//!     button.set("disabled", true)?;
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`client`] | Browser-side session, change detection, registry |
//! | [`server`] | Descriptor model, element handles, server peer |
//! | [`config`] | Client and server configuration |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | WebSocket message types |
//! | [`transport`] | WebSocket transport layer |

// ============================================================================
// Modules
// ============================================================================

/// Browser-side end of the protocol.
///
/// - [`ClientSession`](client::ClientSession) - connection lifecycle and timers
/// - [`ChangeDetector`](client::ChangeDetector) - mutation classification
/// - [`DomNode`](client::DomNode) - host node capability trait
pub mod client;

/// Client and server configuration.
pub mod config;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers for elements and connections.
pub mod identifiers;

/// WebSocket protocol message types.
pub mod protocol;

/// Server-side end of the protocol.
///
/// Use [`ElementSchema::builder()`](server::ElementSchema::builder) to
/// declare element types.
pub mod server;

/// WebSocket transport layer.
///
/// Connection event loop, liveness state machine and listener.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Client types
pub use client::{ClientSession, DomEvent, DomNode, MemoryNode, MutationRecord};

// Server types
pub use server::{ElementSchema, PropertyDescriptor, RemoteElement, SchemaRegistry, ServerPeer};

// Configuration types
pub use config::{ClientConfig, ServerConfig};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{ConnectionId, ElementId};

// Protocol types
pub use protocol::{Message, RequestKind};
