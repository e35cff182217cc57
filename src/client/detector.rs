//! Mutation classification.
//!
//! Turns the host's mutation records into normalized property-changed
//! notifications keyed by element id.
//!
//! | Record | Element id from | Notifications |
//! |--------|-----------------|---------------|
//! | attributes | marker on the target | the attribute, `is_attribute = true` |
//! | childList | marker on the target | `innerHTML`, `innerText`, `textContent` |
//! | characterData | nearest marked ancestor (bounded) | `innerHTML`, `innerText`, `textContent` |
//!
//! Targets without a resolvable marker are untracked and produce nothing.

// ============================================================================
// Imports
// ============================================================================

use std::sync::atomic::{AtomicBool, Ordering};

use rustc_hash::FxHashSet;
use tracing::trace;

use crate::config::ClientConfig;
use crate::identifiers::ElementId;

use super::dom::{MutationRecord, NodeRef};

// ============================================================================
// Constants
// ============================================================================

/// Properties reported when an element's content changes.
pub const CONTENT_PROPERTIES: [&str; 3] = ["innerHTML", "innerText", "textContent"];

// ============================================================================
// PropertyChange
// ============================================================================

/// A normalized "property changed" notification.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PropertyChange {
    /// Element whose property changed.
    pub element_id: ElementId,
    /// Attribute or property name.
    pub prop_name: String,
    /// `true` for attributes, `false` for native properties.
    pub is_attribute: bool,
}

impl PropertyChange {
    fn attribute(element_id: ElementId, name: impl Into<String>) -> Self {
        Self {
            element_id,
            prop_name: name.into(),
            is_attribute: true,
        }
    }

    fn content(element_id: &ElementId) -> impl Iterator<Item = Self> + '_ {
        CONTENT_PROPERTIES.iter().map(move |name| Self {
            element_id: element_id.clone(),
            prop_name: (*name).to_string(),
            is_attribute: false,
        })
    }
}

// ============================================================================
// ChangeDetector
// ============================================================================

/// Classifies mutation records into [`PropertyChange`]s.
#[derive(Debug)]
pub struct ChangeDetector {
    /// Attribute carrying the element id.
    marker: String,
    /// Ancestor levels searched for character-data mutations.
    max_depth: usize,
    /// Drop duplicates within one batch.
    coalesce: bool,
    /// Cleared by [`ChangeDetector::stop`].
    observing: AtomicBool,
}

impl ChangeDetector {
    /// Creates an observing detector from client configuration.
    #[must_use]
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            marker: config.marker_attribute.clone(),
            max_depth: config.max_ancestor_depth,
            coalesce: config.coalesce_mutations,
            observing: AtomicBool::new(true),
        }
    }

    /// Returns the marker attribute name.
    #[inline]
    #[must_use]
    pub fn marker(&self) -> &str {
        &self.marker
    }

    /// Returns `true` until [`stop`](Self::stop) is called.
    #[inline]
    #[must_use]
    pub fn is_observing(&self) -> bool {
        self.observing.load(Ordering::Acquire)
    }

    /// Detaches observation. Later batches produce nothing.
    pub fn stop(&self) {
        self.observing.store(false, Ordering::Release);
    }

    /// Re-attaches observation.
    pub fn resume(&self) {
        self.observing.store(true, Ordering::Release);
    }

    /// Classifies a batch of records.
    ///
    /// Returns notifications in record order. With coalescing enabled,
    /// repeats within the batch are dropped, keeping the first.
    #[must_use]
    pub fn process(&self, records: &[MutationRecord]) -> Vec<PropertyChange> {
        if !self.is_observing() {
            return Vec::new();
        }

        let changes = records.iter().flat_map(|record| self.classify(record));

        if !self.coalesce {
            return changes.collect();
        }

        let mut seen = FxHashSet::default();
        changes.filter(|change| seen.insert(change.clone())).collect()
    }

    /// Classifies a single record, ignoring the observing flag.
    #[must_use]
    pub fn classify(&self, record: &MutationRecord) -> Vec<PropertyChange> {
        let changes = match record {
            MutationRecord::Attributes {
                target,
                attribute_name,
            } => self
                .marker_of(target)
                .map(|id| vec![PropertyChange::attribute(id, attribute_name.as_str())])
                .unwrap_or_default(),

            MutationRecord::ChildList { target } => self
                .marker_of(target)
                .map(|id| PropertyChange::content(&id).collect())
                .unwrap_or_default(),

            MutationRecord::CharacterData { target } => self
                .marked_ancestor(target)
                .map(|id| PropertyChange::content(&id).collect())
                .unwrap_or_default(),
        };

        if changes.is_empty() {
            trace!(
                kind = record.kind(),
                connected = record.target().is_connected(),
                depth = self.max_depth,
                "No marked node for mutation"
            );
        }
        changes
    }

    /// Reads the element id from the node's own marker.
    fn marker_of(&self, node: &NodeRef) -> Option<ElementId> {
        node.get_attribute(&self.marker).map(ElementId::from)
    }

    /// Walks up from the node's parent, at most `max_depth` levels.
    fn marked_ancestor(&self, node: &NodeRef) -> Option<ElementId> {
        let mut current = node.parent_element();

        for _ in 0..self.max_depth {
            let element = current?;
            if let Some(id) = self.marker_of(&element) {
                return Some(id);
            }
            current = element.parent_element();
        }

        None
    }
}

// ============================================================================
// Tests
// ============================================================================
