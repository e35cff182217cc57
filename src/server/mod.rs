//! Server-side end of the protocol.
//!
//! Element types are declared up front as [`ElementSchema`]s. The
//! [`ServerPeer`] creates a [`RemoteElement`] per client element and keeps
//! its cached values current from the client's reports.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `descriptor` | Property, event, method and variable descriptors |
//! | `element` | Server-side element handle |
//! | `peer` | Listener, connection and inbound routing |

// ============================================================================
// Submodules
// ============================================================================

/// Element descriptor model.
pub mod descriptor;

/// Server-side element handle.
pub mod element;

/// Server-side session peer.
pub mod peer;

// ============================================================================
// Re-exports
// ============================================================================

pub use descriptor::{
    AccessPolicy, ElementSchema, ElementSchemaBuilder, EventDescriptor, MethodDescriptor,
    PropertyDescriptor, PropertyTarget, SchemaRegistry, VariableDescriptor,
};
pub use element::{EventHandler, RemoteElement};
pub use peer::ServerPeer;
