//! Element descriptor model.
//!
//! Each element type declares, once, what can be synchronized: properties
//! (read individually, optionally writable), events (relayed from the
//! client), methods (fire-and-forget commands) and variables (bulk values
//! replaced wholesale). Schemas are immutable after
//! [`ElementSchemaBuilder::build`] and shared as `Arc<ElementSchema>`.
//!
//! # Example
//!
//! ```ignore
//! use domsync::server::{ElementSchema, PropertyDescriptor, SchemaRegistry};
//!
//! let select = ElementSchema::builder("MatSelect")
//!     .event("openedChange")
//!     .event("selectionChange")
//!     .variable_with_default("options", serde_json::json!([]))
//!     .property(PropertyDescriptor::dom("value"))
//!     .property(PropertyDescriptor::dom("panelOpen").read_only())
//!     .method("open")
//!     .build()?;
//!
//! let mut schemas = SchemaRegistry::new();
//! schemas.register(select)?;
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
use serde_json::Value;

use crate::error::{Error, Result};

// ============================================================================
// PropertyTarget / AccessPolicy
// ============================================================================

/// Where a property lives on the client node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyTarget {
    /// A markup attribute (`getAttribute` / `setAttribute`).
    Attribute,
    /// A native DOM or component property.
    DomProperty,
}

/// Whether application code may write a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AccessPolicy {
    /// Readable and writable.
    #[default]
    ReadWrite,
    /// Updated only by the client.
    ReadOnly,
}

// ============================================================================
// Descriptors
// ============================================================================

/// A synchronized property.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PropertyDescriptor {
    name: String,
    target: PropertyTarget,
    access: AccessPolicy,
}

impl PropertyDescriptor {
    /// Declares a writable native property.
    #[must_use]
    pub fn dom(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target: PropertyTarget::DomProperty,
            access: AccessPolicy::ReadWrite,
        }
    }

    /// Declares a writable attribute.
    #[must_use]
    pub fn attribute(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target: PropertyTarget::Attribute,
            access: AccessPolicy::ReadWrite,
        }
    }

    /// Marks the property read-only.
    #[must_use]
    pub fn read_only(mut self) -> Self {
        self.access = AccessPolicy::ReadOnly;
        self
    }

    /// Returns the wire name.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the property target.
    #[inline]
    #[must_use]
    pub fn target(&self) -> PropertyTarget {
        self.target
    }

    /// Returns the access policy.
    #[inline]
    #[must_use]
    pub fn access(&self) -> AccessPolicy {
        self.access
    }

    /// Returns `true` for attribute-backed properties.
    #[inline]
    #[must_use]
    pub fn is_attribute(&self) -> bool {
        self.target == PropertyTarget::Attribute
    }

    /// Returns `true` if writes are rejected.
    #[inline]
    #[must_use]
    pub fn is_read_only(&self) -> bool {
        self.access == AccessPolicy::ReadOnly
    }
}

/// An event the client subscribes to and relays.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EventDescriptor {
    name: String,
}

impl EventDescriptor {
    /// Returns the event name.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// A native method the server may invoke.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodDescriptor {
    name: String,
}

impl MethodDescriptor {
    /// Returns the method name.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// A bulk value replaced wholesale on explicit request.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableDescriptor {
    name: String,
    initial: Value,
}

impl VariableDescriptor {
    /// Returns the variable name.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the value a new element starts with.
    #[inline]
    #[must_use]
    pub fn initial(&self) -> &Value {
        &self.initial
    }
}

// ============================================================================
// ElementSchema
// ============================================================================

/// Immutable catalog of one element type.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementSchema {
    type_name: String,
    properties: Vec<PropertyDescriptor>,
    events: Vec<EventDescriptor>,
    methods: Vec<MethodDescriptor>,
    variables: Vec<VariableDescriptor>,
}

impl ElementSchema {
    /// Starts declaring an element type.
    #[must_use]
    pub fn builder(type_name: impl Into<String>) -> ElementSchemaBuilder {
        ElementSchemaBuilder {
            type_name: type_name.into(),
            properties: Vec::new(),
            events: Vec::new(),
            methods: Vec::new(),
            variables: Vec::new(),
        }
    }

    /// Returns the type name.
    #[inline]
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Returns all properties in declaration order.
    #[inline]
    #[must_use]
    pub fn properties(&self) -> &[PropertyDescriptor] {
        &self.properties
    }

    /// Looks up a property by wire name.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// Returns all events in declaration order.
    #[inline]
    #[must_use]
    pub fn events(&self) -> &[EventDescriptor] {
        &self.events
    }

    /// Looks up an event by name.
    #[must_use]
    pub fn event(&self, name: &str) -> Option<&EventDescriptor> {
        self.events.iter().find(|e| e.name == name)
    }

    /// Returns the event names sent in a `GetEvents` reply.
    #[must_use]
    pub fn event_names(&self) -> Vec<String> {
        self.events.iter().map(|e| e.name.clone()).collect()
    }

    /// Returns all methods in declaration order.
    #[inline]
    #[must_use]
    pub fn methods(&self) -> &[MethodDescriptor] {
        &self.methods
    }

    /// Looks up a method by name.
    #[must_use]
    pub fn method(&self, name: &str) -> Option<&MethodDescriptor> {
        self.methods.iter().find(|m| m.name == name)
    }

    /// Returns all variables in declaration order.
    #[inline]
    #[must_use]
    pub fn variables(&self) -> &[VariableDescriptor] {
        &self.variables
    }

    /// Looks up a variable by name.
    #[must_use]
    pub fn variable(&self, name: &str) -> Option<&VariableDescriptor> {
        self.variables.iter().find(|v| v.name == name)
    }
}

// ============================================================================
// ElementSchemaBuilder
// ============================================================================

/// Builder for [`ElementSchema`].
#[derive(Debug, Clone)]
pub struct ElementSchemaBuilder {
    type_name: String,
    properties: Vec<PropertyDescriptor>,
    events: Vec<EventDescriptor>,
    methods: Vec<MethodDescriptor>,
    variables: Vec<VariableDescriptor>,
}

impl ElementSchemaBuilder {
    /// Declares a property.
    #[must_use]
    pub fn property(mut self, descriptor: PropertyDescriptor) -> Self {
        self.properties.push(descriptor);
        self
    }

    /// Declares an event.
    #[must_use]
    pub fn event(mut self, name: impl Into<String>) -> Self {
        self.events.push(EventDescriptor { name: name.into() });
        self
    }

    /// Declares a method.
    #[must_use]
    pub fn method(mut self, name: impl Into<String>) -> Self {
        self.methods.push(MethodDescriptor { name: name.into() });
        self
    }

    /// Declares a variable starting as `null`.
    #[must_use]
    pub fn variable(self, name: impl Into<String>) -> Self {
        self.variable_with_default(name, Value::Null)
    }

    /// Declares a variable with an initial value.
    #[must_use]
    pub fn variable_with_default(mut self, name: impl Into<String>, initial: Value) -> Self {
        self.variables.push(VariableDescriptor {
            name: name.into(),
            initial,
        });
        self
    }

    /// Validates and freezes the schema.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSchema`] if the type name is empty, a name is
    /// empty, or a name repeats within its category.
    pub fn build(self) -> Result<ElementSchema> {
        if self.type_name.trim().is_empty() {
            return Err(Error::invalid_schema(self.type_name, "type name is empty"));
        }

        let type_name = &self.type_name;
        check_names(type_name, "property", self.properties.iter().map(|p| p.name.as_str()))?;
        check_names(type_name, "event", self.events.iter().map(|e| e.name.as_str()))?;
        check_names(type_name, "method", self.methods.iter().map(|m| m.name.as_str()))?;
        check_names(type_name, "variable", self.variables.iter().map(|v| v.name.as_str()))?;

        Ok(ElementSchema {
            type_name: self.type_name,
            properties: self.properties,
            events: self.events,
            methods: self.methods,
            variables: self.variables,
        })
    }
}

/// Rejects empty and repeated names within one category.
fn check_names<'a>(
    type_name: &str,
    category: &str,
    names: impl Iterator<Item = &'a str>,
) -> Result<()> {
    let mut seen = FxHashSet::default();
    for name in names {
        if name.is_empty() {
            return Err(Error::invalid_schema(type_name, format!("empty {category} name")));
        }
        if !seen.insert(name) {
            return Err(Error::invalid_schema(
                type_name,
                format!("duplicate {category} '{name}'"),
            ));
        }
    }
    Ok(())
}

// ============================================================================
// SchemaRegistry
// ============================================================================

/// Element type name → schema.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: FxHashMap<String, Arc<ElementSchema>>,
}

impl SchemaRegistry {
    /// Creates an empty registry.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a schema.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSchema`] if the type name is already taken.
    pub fn register(&mut self, schema: ElementSchema) -> Result<Arc<ElementSchema>> {
        if self.schemas.contains_key(schema.type_name()) {
            return Err(Error::invalid_schema(
                schema.type_name(),
                "type already registered",
            ));
        }

        let schema = Arc::new(schema);
        self.schemas
            .insert(schema.type_name().to_string(), Arc::clone(&schema));
        Ok(schema)
    }

    /// Returns the schema of a type.
    #[must_use]
    pub fn get(&self, type_name: &str) -> Option<Arc<ElementSchema>> {
        self.schemas.get(type_name).map(Arc::clone)
    }

    /// Returns `true` if the type is registered.
    #[inline]
    #[must_use]
    pub fn contains(&self, type_name: &str) -> bool {
        self.schemas.contains_key(type_name)
    }

    /// Returns the number of registered types.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    /// Returns `true` if nothing is registered.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn select() -> ElementSchema {
        ElementSchema::builder("MatSelect")
            .event("openedChange")
            .event("selectionChange")
            .variable_with_default("options", json!([]))
            .property(PropertyDescriptor::dom("disabled"))
            .property(PropertyDescriptor::dom("value").read_only())
            .property(PropertyDescriptor::attribute("aria-label"))
            .method("open")
            .method("close")
            .build()
            .expect("schema")
    }

    #[test]
    fn test_lookup() {
        let schema = select();
        assert_eq!(schema.type_name(), "MatSelect");
        assert!(schema.property("value").expect("value").is_read_only());
        assert!(schema.property("aria-label").expect("attr").is_attribute());
        assert!(!schema.property("disabled").expect("disabled").is_attribute());
        assert!(schema.property("missing").is_none());
        assert!(schema.method("open").is_some());
        assert_eq!(schema.variable("options").expect("var").initial(), &json!([]));
    }

    #[test]
    fn test_event_names_in_declaration_order() {
        assert_eq!(select().event_names(), vec!["openedChange", "selectionChange"]);
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let result = ElementSchema::builder("Button")
            .event("click")
            .event("click")
            .build();
        assert!(matches!(result, Err(Error::InvalidSchema { .. })));

        let result = ElementSchema::builder("Button")
            .property(PropertyDescriptor::dom("value"))
            .property(PropertyDescriptor::attribute("value"))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_same_name_across_categories_allowed() {
        let schema = ElementSchema::builder("Select")
            .property(PropertyDescriptor::dom("focus"))
            .method("focus")
            .build();
        assert!(schema.is_ok());
    }

    #[test]
    fn test_empty_names_rejected() {
        assert!(ElementSchema::builder("  ").build().is_err());
        assert!(ElementSchema::builder("Button").method("").build().is_err());
    }

    #[test]
    fn test_registry() {
        let mut registry = SchemaRegistry::new();
        let schema = registry.register(select()).expect("register");
        assert_eq!(schema.type_name(), "MatSelect");
        assert!(registry.contains("MatSelect"));
        assert!(registry.get("Button").is_none());
        assert_eq!(registry.len(), 1);

        let result = registry.register(select());
        assert!(matches!(result, Err(Error::InvalidSchema { .. })));
    }
}
