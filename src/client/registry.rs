//! Registry of tracked elements.
//!
//! Maps each element id to its live node and the event names wired up for
//! it. An empty subscription set marks an element the repair poll still has
//! to request events for.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use crate::error::{Error, Result};
use crate::identifiers::ElementId;

use super::dom::NodeRef;

// ============================================================================
// Types
// ============================================================================

/// Registry shared between the session, router and outbox.
pub type SharedRegistry = Arc<RwLock<ElementRegistry>>;

/// Per-element registry entry.
struct Entry {
    /// The live node.
    node: NodeRef,
    /// Subscribed event names in first-seen order.
    subscriptions: Vec<String>,
    /// Names with a listener attached, for de-duplication.
    attached: FxHashSet<String>,
}

impl Entry {
    fn new(node: NodeRef) -> Self {
        Self {
            node,
            subscriptions: Vec::new(),
            attached: FxHashSet::default(),
        }
    }
}

// ============================================================================
// ElementRegistry
// ============================================================================

/// Element id → node and subscription set.
#[derive(Default)]
pub struct ElementRegistry {
    entries: FxHashMap<ElementId, Entry>,
}

impl ElementRegistry {
    /// Creates an empty registry.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty registry wrapped for sharing.
    #[inline]
    #[must_use]
    pub fn shared() -> SharedRegistry {
        Arc::new(RwLock::new(Self::new()))
    }

    /// Associates an id with a node and an empty subscription set.
    ///
    /// Re-registering replaces the node and resets its subscriptions, since
    /// listeners on the old node do not carry over. Returns `true` if an
    /// entry was replaced.
    pub fn register(&mut self, element_id: ElementId, node: NodeRef) -> bool {
        let replaced = self
            .entries
            .insert(element_id.clone(), Entry::new(node))
            .is_some();
        debug!(element_id = %element_id, replaced, "Element registered");
        replaced
    }

    /// Returns the node for an id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownElement`] if the id is not registered.
    pub fn lookup(&self, element_id: &ElementId) -> Result<NodeRef> {
        self.entries
            .get(element_id)
            .map(|entry| Arc::clone(&entry.node))
            .ok_or_else(|| Error::unknown_element(element_id.clone()))
    }

    /// Returns `true` if the id is registered.
    #[inline]
    #[must_use]
    pub fn contains(&self, element_id: &ElementId) -> bool {
        self.entries.contains_key(element_id)
    }

    /// Returns the number of registered elements.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is registered.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the subscription set of an element.
    #[must_use]
    pub fn subscriptions(&self, element_id: &ElementId) -> Option<&[String]> {
        self.entries
            .get(element_id)
            .map(|entry| entry.subscriptions.as_slice())
    }

    /// Returns ids whose subscription set is still empty, sorted.
    #[must_use]
    pub fn unsubscribed(&self) -> Vec<ElementId> {
        let mut ids: Vec<ElementId> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.subscriptions.is_empty())
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Records event names for an element.
    ///
    /// Returns the node and the names that still need a listener. A name
    /// already attached for this element is never returned twice.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownElement`] if the id is not registered.
    pub fn subscribe(
        &mut self,
        element_id: &ElementId,
        events: impl IntoIterator<Item = String>,
    ) -> Result<(NodeRef, Vec<String>)> {
        let entry = self
            .entries
            .get_mut(element_id)
            .ok_or_else(|| Error::unknown_element(element_id.clone()))?;

        let mut fresh = Vec::new();
        for name in events {
            if entry.attached.insert(name.clone()) {
                entry.subscriptions.push(name.clone());
                fresh.push(name);
            }
        }

        Ok((Arc::clone(&entry.node), fresh))
    }

    /// Removes an element. Returns `true` if it was registered.
    pub fn retire(&mut self, element_id: &ElementId) -> bool {
        let removed = self.entries.remove(element_id).is_some();
        if removed {
            debug!(element_id = %element_id, "Element retired");
        }
        removed
    }

    /// Removes every element whose node has left the document.
    ///
    /// Returns the retired ids, sorted.
    pub fn collect_garbage(&mut self) -> Vec<ElementId> {
        let mut stale: Vec<ElementId> = self
            .entries
            .iter()
            .filter(|(_, entry)| !entry.node.is_connected())
            .map(|(id, _)| id.clone())
            .collect();
        stale.sort();

        for id in &stale {
            self.entries.remove(id);
        }

        if !stale.is_empty() {
            debug!(count = stale.len(), "Retired stale elements");
        }
        stale
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::client::memory::MemoryNode;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|name| (*name).to_string()).collect()
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = ElementRegistry::new();
        let node = MemoryNode::element("button");
        let id = ElementId::new("btn1");

        assert!(!registry.register(id.clone(), node.as_node()));
        assert!(registry.contains(&id));
        assert!(registry.lookup(&id).is_ok());
        assert_eq!(registry.subscriptions(&id), Some(&[][..]));
    }

    #[test]
    fn test_lookup_unknown() {
        let registry = ElementRegistry::new();
        let result = registry.lookup(&ElementId::new("ghost"));
        assert!(matches!(result, Err(Error::UnknownElement { .. })));
    }

    #[test]
    fn test_unsubscribed_lists_empty_sets() {
        let mut registry = ElementRegistry::new();
        registry.register(ElementId::new("b"), MemoryNode::element("x").as_node());
        registry.register(ElementId::new("a"), MemoryNode::element("x").as_node());
        registry
            .subscribe(&ElementId::new("b"), names(&["click"]))
            .expect("subscribe");

        assert_eq!(registry.unsubscribed(), vec![ElementId::new("a")]);
    }

    #[test]
    fn test_subscribe_deduplicates() {
        let mut registry = ElementRegistry::new();
        let id = ElementId::new("sel1");
        registry.register(id.clone(), MemoryNode::element("mat-select").as_node());

        let (_, fresh) = registry
            .subscribe(&id, names(&["openedChange", "selectionChange", "openedChange"]))
            .expect("subscribe");
        assert_eq!(fresh, names(&["openedChange", "selectionChange"]));

        let (_, fresh) = registry
            .subscribe(&id, names(&["selectionChange", "focus"]))
            .expect("subscribe");
        assert_eq!(fresh, names(&["focus"]));
        assert_eq!(
            registry.subscriptions(&id).expect("entry"),
            names(&["openedChange", "selectionChange", "focus"]).as_slice()
        );
    }

    #[test]
    fn test_reregister_resets_subscriptions() {
        let mut registry = ElementRegistry::new();
        let id = ElementId::new("btn1");
        registry.register(id.clone(), MemoryNode::element("button").as_node());
        registry.subscribe(&id, names(&["click"])).expect("subscribe");

        assert!(registry.register(id.clone(), MemoryNode::element("button").as_node()));
        assert_eq!(registry.unsubscribed(), vec![id]);
    }

    #[test]
    fn test_collect_garbage_retires_detached() {
        let mut registry = ElementRegistry::new();
        let body = MemoryNode::element("body");
        let kept = MemoryNode::element("div");
        let removed = MemoryNode::element("div");
        body.append_child(&kept);
        body.append_child(&removed);

        registry.register(ElementId::new("kept"), kept.as_node());
        registry.register(ElementId::new("removed"), removed.as_node());

        removed.detach();
        assert_eq!(registry.collect_garbage(), vec![ElementId::new("removed")]);
        assert_eq!(registry.len(), 1);
        assert!(registry.collect_garbage().is_empty());
    }

    #[test]
    fn test_retire() {
        let mut registry = ElementRegistry::new();
        let id = ElementId::new("a");
        registry.register(id.clone(), MemoryNode::element("x").as_node());
        assert!(registry.retire(&id));
        assert!(!registry.retire(&id));
        assert!(registry.is_empty());
    }
}
