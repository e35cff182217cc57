//! Browser-side end of the protocol.
//!
//! The client tracks marked DOM nodes, answers the server's property and
//! method requests, relays subscribed events, and reports mutations as
//! property values.
//!
//! # Data Flow
//!
//! ```text
//! MutationRecord batch ──► ChangeDetector ──► PropertyChange ──► Outbox ──► server
//! server ──► Connection ──► RequestRouter ──► DomNode (read / write / listen)
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `dom` | Host node capability trait and mutation records |
//! | `memory` | In-memory node tree |
//! | `detector` | Mutation classification |
//! | `registry` | Element id → node and subscriptions |
//! | `router` | Inbound dispatch and checked outbound path |
//! | `session` | Connection lifecycle and timers |

// ============================================================================
// Submodules
// ============================================================================

/// Mutation classification.
pub mod detector;

/// Host node capability trait.
pub mod dom;

/// In-memory node tree.
pub mod memory;

/// Element registry.
pub mod registry;

/// Inbound request dispatch.
pub mod router;

/// Browser-side session.
pub mod session;

// ============================================================================
// Re-exports
// ============================================================================

pub use detector::{CONTENT_PROPERTIES, ChangeDetector, PropertyChange};
pub use dom::{DomEvent, DomNode, Listener, MutationRecord, NodeRef};
pub use memory::MemoryNode;
pub use registry::ElementRegistry;
pub use router::{Outbox, RequestRouter};
pub use session::ClientSession;
