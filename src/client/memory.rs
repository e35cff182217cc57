//! In-memory [`DomNode`] implementation.
//!
//! A minimal document tree for headless hosts and tests: attributes,
//! properties, listeners and parent links, without layout or rendering.
//! Reads of properties that were never written fail like a host node
//! lacking the property.
//!
//! # Example
//!
//! ```ignore
//! use domsync::client::{MemoryNode, DomEvent};
//!
//! let body = MemoryNode::element("body");
//! let button = MemoryNode::element("button");
//! body.append_child(&button);
//! button.set_attribute("uielement", "btn1")?;
//!
//! button.dispatch(&DomEvent::new("click", "MouseEvent", serde_json::json!({})));
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use serde_json::Value;

use crate::error::{Error, Result};

use super::dom::{DomEvent, DomNode, Listener, NodeRef};

// ============================================================================
// Types
// ============================================================================

/// A recorded native method invocation.
pub type MethodInvocation = (String, Vec<Value>);

// ============================================================================
// MemoryNode
// ============================================================================

/// Node of an in-memory document tree.
pub struct MemoryNode {
    /// Tag name, or `#text` for text nodes.
    tag: String,
    /// Attribute map.
    attributes: RwLock<FxHashMap<String, String>>,
    /// Native property map.
    properties: RwLock<FxHashMap<String, Value>>,
    /// Attached listeners in attachment order.
    listeners: RwLock<Vec<(String, Listener)>>,
    /// Methods invoked through [`DomNode::call_method`].
    invocations: Mutex<Vec<MethodInvocation>>,
    /// Parent element.
    parent: RwLock<Weak<MemoryNode>>,
    /// Child nodes, owned by the parent.
    children: RwLock<Vec<Arc<MemoryNode>>>,
    /// Cleared by [`MemoryNode::detach`].
    connected: AtomicBool,
}

impl fmt::Debug for MemoryNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryNode")
            .field("tag", &self.tag)
            .field("attributes", &*self.attributes.read())
            .field("connected", &self.connected.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

// ============================================================================
// MemoryNode - Constructors
// ============================================================================

impl MemoryNode {
    fn with_tag(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attributes: RwLock::new(FxHashMap::default()),
            properties: RwLock::new(FxHashMap::default()),
            listeners: RwLock::new(Vec::new()),
            invocations: Mutex::new(Vec::new()),
            parent: RwLock::new(Weak::new()),
            children: RwLock::new(Vec::new()),
            connected: AtomicBool::new(true),
        }
    }

    /// Creates a detached element.
    #[must_use]
    pub fn element(tag: impl Into<String>) -> Arc<Self> {
        Arc::new(Self::with_tag(tag))
    }

    /// Creates a text node holding `content` as `textContent` and `data`.
    #[must_use]
    pub fn text(content: impl Into<String>) -> Arc<Self> {
        let node = Self::with_tag("#text");
        let content = Value::String(content.into());
        {
            let mut properties = node.properties.write();
            properties.insert("textContent".to_string(), content.clone());
            properties.insert("data".to_string(), content);
        }
        Arc::new(node)
    }
}

// ============================================================================
// MemoryNode - Tree
// ============================================================================

impl MemoryNode {
    /// Returns the tag name.
    #[inline]
    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Makes `child` the last child of this node.
    pub fn append_child(self: &Arc<Self>, child: &Arc<Self>) {
        *child.parent.write() = Arc::downgrade(self);
        child.connected.store(true, Ordering::Relaxed);
        self.children.write().push(Arc::clone(child));
    }

    /// Returns the number of child nodes.
    #[must_use]
    pub fn child_count(&self) -> usize {
        self.children.read().len()
    }

    /// Removes this node from the document.
    ///
    /// Descendants report `is_connected() == false` through their parent
    /// chain.
    pub fn detach(&self) {
        let parent = std::mem::take(&mut *self.parent.write());
        if let Some(parent) = parent.upgrade() {
            parent
                .children
                .write()
                .retain(|child| !std::ptr::eq(Arc::as_ptr(child), self));
        }
        self.connected.store(false, Ordering::Relaxed);
    }

    /// Returns this node as a shared handle.
    #[inline]
    #[must_use]
    pub fn as_node(self: &Arc<Self>) -> NodeRef {
        Arc::clone(self) as NodeRef
    }
}

// ============================================================================
// MemoryNode - Inspection
// ============================================================================

impl MemoryNode {
    /// Fires an event at every listener attached for its name.
    ///
    /// Returns the number of listeners invoked.
    pub fn dispatch(&self, event: &DomEvent) -> usize {
        let matching: Vec<Listener> = self
            .listeners
            .read()
            .iter()
            .filter(|(name, _)| *name == event.name)
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in &matching {
            listener(event);
        }
        matching.len()
    }

    /// Returns the number of listeners attached for an event name.
    #[must_use]
    pub fn listener_count(&self, event_name: &str) -> usize {
        self.listeners
            .read()
            .iter()
            .filter(|(name, _)| name == event_name)
            .count()
    }

    /// Returns every method invocation so far.
    #[must_use]
    pub fn invocations(&self) -> Vec<MethodInvocation> {
        self.invocations.lock().clone()
    }

    /// Returns a property without going through the fallible trait method.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<Value> {
        self.properties.read().get(name).cloned()
    }
}

// ============================================================================
// MemoryNode - DomNode
// ============================================================================

impl DomNode for MemoryNode {
    fn get_attribute(&self, name: &str) -> Option<String> {
        self.attributes.read().get(name).cloned()
    }

    fn set_attribute(&self, name: &str, value: &str) -> Result<()> {
        if name.is_empty() || name.contains(char::is_whitespace) {
            return Err(Error::property_access(name, "invalid attribute name"));
        }
        self.attributes
            .write()
            .insert(name.to_string(), value.to_string());
        Ok(())
    }

    fn remove_attribute(&self, name: &str) {
        self.attributes.write().remove(name);
    }

    fn get_property(&self, name: &str) -> Result<Value> {
        self.properties
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::property_access(name, format!("<{}> has no such property", self.tag)))
    }

    fn set_property(&self, name: &str, value: Value) -> Result<()> {
        self.properties.write().insert(name.to_string(), value);
        Ok(())
    }

    fn call_method(&self, name: &str, args: &[Value]) -> Result<Value> {
        self.invocations
            .lock()
            .push((name.to_string(), args.to_vec()));
        Ok(Value::Null)
    }

    fn add_listener(&self, event_name: &str, listener: Listener) {
        self.listeners
            .write()
            .push((event_name.to_string(), listener));
    }

    fn parent_element(&self) -> Option<NodeRef> {
        self.parent.read().upgrade().map(|parent| parent as NodeRef)
    }

    fn is_connected(&self) -> bool {
        if !self.connected.load(Ordering::Relaxed) {
            return false;
        }
        match self.parent.read().upgrade() {
            Some(parent) => parent.is_connected(),
            None => true,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_attributes() {
        let node = MemoryNode::element("div");
        assert!(!node.has_attribute("id"));

        node.set_attribute("id", "main").expect("set");
        assert_eq!(node.get_attribute("id").as_deref(), Some("main"));

        node.remove_attribute("id");
        assert_eq!(node.get_attribute("id"), None);
        assert!(node.set_attribute("bad name", "x").is_err());
    }

    #[test]
    fn test_missing_property_is_access_error() {
        let node = MemoryNode::element("div");
        assert!(matches!(
            node.get_property("value"),
            Err(Error::PropertyAccess { .. })
        ));

        node.set_property("value", json!("a")).expect("set");
        assert_eq!(node.get_property("value").expect("get"), json!("a"));
    }

    #[test]
    fn test_parent_chain() {
        let root = MemoryNode::element("body");
        let child = MemoryNode::element("span");
        let text = MemoryNode::text("hello");
        root.append_child(&child);
        child.append_child(&text);

        let parent = text.parent_element().expect("parent");
        assert!(parent.parent_element().is_some());
        assert!(root.parent_element().is_none());
        assert_eq!(text.property("textContent"), Some(json!("hello")));
    }

    #[test]
    fn test_detach_disconnects_subtree() {
        let root = MemoryNode::element("body");
        let child = MemoryNode::element("div");
        let grandchild = MemoryNode::element("span");
        root.append_child(&child);
        child.append_child(&grandchild);

        assert!(grandchild.is_connected());
        child.detach();
        assert_eq!(root.child_count(), 0);
        assert!(!child.is_connected());
        assert!(grandchild.parent_element().is_some());
        assert!(!grandchild.is_connected());
    }

    #[test]
    fn test_dispatch_reaches_matching_listeners() {
        let node = MemoryNode::element("button");
        let hits = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&hits);
        node.add_listener("click", Arc::new(move |_| *counter.lock() += 1));

        let fired = node.dispatch(&DomEvent::new("click", "MouseEvent", json!({})));
        assert_eq!(fired, 1);
        assert_eq!(node.dispatch(&DomEvent::new("focus", "FocusEvent", json!({}))), 0);
        assert_eq!(*hits.lock(), 1);
        assert_eq!(node.listener_count("click"), 1);
    }

    #[test]
    fn test_call_method_recorded() {
        let node = MemoryNode::element("mat-select");
        node.call_method("open", &[]).expect("call");
        node.call_method("select", &[json!(2)]).expect("call");

        let calls = node.invocations();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1], ("select".to_string(), vec![json!(2)]));
    }
}
