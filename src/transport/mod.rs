//! WebSocket transport layer.
//!
//! This module carries protocol messages between the browser-side session
//! and the server-side peer.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐                              ┌─────────────────┐
//! │  ClientSession  │                              │   ServerPeer    │
//! │                 │         WebSocket            │                 │
//! │  Link           │◄────────────────────────────►│  Listener       │
//! │  → Connection   │    ws://host:PORT/UiHandler  │  → Link         │
//! │                 │                              │  → Connection   │
//! └─────────────────┘                              └─────────────────┘
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `connection` | WebSocket event loop |
//! | `link` | Liveness state machine and current-connection slot |
//! | `server` | Listener binding and path-checked upgrade |

// ============================================================================
// Submodules
// ============================================================================

/// WebSocket connection and event loop.
pub mod connection;

/// Connection liveness state machine.
pub mod link;

/// WebSocket listener for the server-side peer.
pub mod server;

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::{Connection, InboundHandler};
pub use link::{Link, LinkState};
pub use server::Listener;
