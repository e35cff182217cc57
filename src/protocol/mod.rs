//! WebSocket protocol message types.
//!
//! This module defines the message format shared by the browser-side
//! session and the server-side peer.
//!
//! # Protocol Overview
//!
//! Every frame is one JSON text message:
//!
//! ```json
//! { "requestType": 3, "uiElementId": "btn1", "data": { ... } }
//! ```
//!
//! | Kind | Direction | Payload |
//! |------|-----------|---------|
//! | `GetEvents` | Client → Server (request), Server → Client (reply) | `{}` / [`EventList`] |
//! | `EventCallback` | Client → Server | [`EventCallback`] |
//! | `GetPropValue` | Either | [`PropRequest`] / [`PropValue`] |
//! | `SetPropValue` | Server → Client | [`PropUpdate`] |
//! | `CallMethod` | Server → Client | [`MethodCall`] |
//! | `SetVariable` | Server → Client | [`VariableUpdate`] |
//!
//! Unknown kinds decode as [`RequestKind::None`] and are ignored by both
//! ends.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `message` | Envelope and request kinds |
//! | `payload` | Kind-specific payload structures |

// ============================================================================
// Submodules
// ============================================================================

/// Message envelope and request kinds.
pub mod message;

/// Kind-specific payloads.
pub mod payload;

// ============================================================================
// Re-exports
// ============================================================================

pub use message::{Message, RequestKind};
pub use payload::{
    EventCallback, EventList, MethodCall, PropRequest, PropUpdate, PropValue, VariableUpdate,
};
