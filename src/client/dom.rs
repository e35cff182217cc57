//! Host capability interface for observed DOM nodes.
//!
//! The session never touches a concrete DOM. Each host environment (a
//! wasm binding, a headless test document, an embedded webview bridge)
//! implements [`DomNode`] for its node type and feeds [`MutationRecord`]
//! batches into the session.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::Result;

// ============================================================================
// Types
// ============================================================================

/// Shared handle to a host node.
pub type NodeRef = Arc<dyn DomNode>;

/// Native event listener attached to a node.
pub type Listener = Arc<dyn Fn(&DomEvent) + Send + Sync>;

// ============================================================================
// DomEvent
// ============================================================================

/// A native event as seen by a listener.
#[derive(Debug, Clone, PartialEq)]
pub struct DomEvent {
    /// The event's `type`, e.g. `click`.
    pub name: String,

    /// The event object's class name, e.g. `MouseEvent`.
    pub class_name: String,

    /// Serialized event object.
    pub data: Value,
}

impl DomEvent {
    /// Creates an event.
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>, class_name: impl Into<String>, data: Value) -> Self {
        Self {
            name: name.into(),
            class_name: class_name.into(),
            data,
        }
    }
}

// ============================================================================
// DomNode
// ============================================================================

/// Capability interface of an observation target.
///
/// Implementations must be cheap to call from the session's event loop and
/// must not invoke listeners synchronously from [`DomNode::add_listener`].
pub trait DomNode: Send + Sync {
    /// Reads an attribute. `None` if absent.
    fn get_attribute(&self, name: &str) -> Option<String>;

    /// Returns `true` if the attribute is present.
    fn has_attribute(&self, name: &str) -> bool {
        self.get_attribute(name).is_some()
    }

    /// Writes an attribute.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PropertyAccess`](crate::Error::PropertyAccess) if the
    /// host rejects the name or value.
    fn set_attribute(&self, name: &str, value: &str) -> Result<()>;

    /// Removes an attribute. Absent attributes are ignored.
    fn remove_attribute(&self, name: &str);

    /// Reads a native property.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PropertyAccess`](crate::Error::PropertyAccess) if the
    /// node has no such property.
    fn get_property(&self, name: &str) -> Result<Value>;

    /// Writes a native property.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PropertyAccess`](crate::Error::PropertyAccess) if the
    /// host rejects the write.
    fn set_property(&self, name: &str, value: Value) -> Result<()>;

    /// Invokes a native method.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PropertyAccess`](crate::Error::PropertyAccess) if the
    /// node has no such method.
    fn call_method(&self, name: &str, args: &[Value]) -> Result<Value>;

    /// Attaches a native listener for an event name.
    fn add_listener(&self, event_name: &str, listener: Listener);

    /// Returns the parent element, if any.
    fn parent_element(&self) -> Option<NodeRef>;

    /// Returns `false` once the node has been removed from the document.
    fn is_connected(&self) -> bool {
        true
    }
}

// ============================================================================
// MutationRecord
// ============================================================================

/// One record from the host's mutation observer.
#[derive(Clone)]
pub enum MutationRecord {
    /// An attribute of `target` changed.
    Attributes {
        /// The element whose attribute changed.
        target: NodeRef,
        /// Name of the changed attribute.
        attribute_name: String,
    },

    /// Children of `target` were added or removed.
    ChildList {
        /// The element whose child list changed.
        target: NodeRef,
    },

    /// Content of a text node changed.
    CharacterData {
        /// The text node itself.
        target: NodeRef,
    },
}

impl MutationRecord {
    /// Creates an attribute record.
    #[inline]
    #[must_use]
    pub fn attributes(target: NodeRef, attribute_name: impl Into<String>) -> Self {
        Self::Attributes {
            target,
            attribute_name: attribute_name.into(),
        }
    }

    /// Creates a child-list record.
    #[inline]
    #[must_use]
    pub fn child_list(target: NodeRef) -> Self {
        Self::ChildList { target }
    }

    /// Creates a character-data record.
    #[inline]
    #[must_use]
    pub fn character_data(target: NodeRef) -> Self {
        Self::CharacterData { target }
    }

    /// Returns the mutation type as the DOM names it.
    #[inline]
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Attributes { .. } => "attributes",
            Self::ChildList { .. } => "childList",
            Self::CharacterData { .. } => "characterData",
        }
    }

    /// Returns the mutated node.
    #[inline]
    #[must_use]
    pub fn target(&self) -> &NodeRef {
        match self {
            Self::Attributes { target, .. }
            | Self::ChildList { target }
            | Self::CharacterData { target } => target,
        }
    }
}

impl fmt::Debug for MutationRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Attributes { attribute_name, .. } => f
                .debug_struct("Attributes")
                .field("attribute_name", attribute_name)
                .finish_non_exhaustive(),
            Self::ChildList { .. } => f.debug_struct("ChildList").finish_non_exhaustive(),
            Self::CharacterData { .. } => f.debug_struct("CharacterData").finish_non_exhaustive(),
        }
    }
}
