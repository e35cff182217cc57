//! Server-side handle to a client element.
//!
//! A [`RemoteElement`] caches the last value received for each declared
//! property and forwards writes, method calls and variable replacements to
//! the client. Reads never block on the network: values arrive as
//! `GetPropValue` messages, either replies to [`RemoteElement::refresh`] or
//! unsolicited change reports, and are applied last-write-wins.
//!
//! # Example
//!
//! ```ignore
//! let select = peer.create_element("MatSelect", "sel1")?;
//!
//! select.on("selectionChange", |event| println!("{:?}", event.data))?;
//! select.set_variable("options", json!(["Option A", "Option B"]))?;
//! select.set("value", "Option B")?;
//! select.invoke("open", vec![])?;
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::identifiers::ElementId;
use crate::protocol::{EventCallback, Message, PropValue};
use crate::transport::Link;

use super::descriptor::{ElementSchema, PropertyDescriptor};

// ============================================================================
// Types
// ============================================================================

/// Application handler for a relayed event.
pub type EventHandler = Arc<dyn Fn(&EventCallback) + Send + Sync>;

/// Internal shared state for an element.
struct ElementInner {
    /// Element id shared with the client.
    id: ElementId,
    /// Declared members of the element's type.
    schema: Arc<ElementSchema>,
    /// Peer link every outbound message goes through.
    link: Link,
    /// Last received property values.
    values: RwLock<FxHashMap<String, Value>>,
    /// Local copies of bulk variables.
    variables: RwLock<FxHashMap<String, Value>>,
    /// Handlers by event name.
    handlers: RwLock<FxHashMap<String, Vec<EventHandler>>>,
    /// Set once the peer has dropped the id; outbound sends stop.
    retired: AtomicBool,
}

// ============================================================================
// RemoteElement
// ============================================================================

/// Handle to one element on the client.
///
/// Cheap to clone; clones share the cache and handlers.
#[derive(Clone)]
pub struct RemoteElement {
    inner: Arc<ElementInner>,
}

impl fmt::Debug for RemoteElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteElement")
            .field("id", &self.inner.id)
            .field("type_name", &self.inner.schema.type_name())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// RemoteElement - Constructor
// ============================================================================

impl RemoteElement {
    /// Creates an element with every variable at its initial value.
    pub(crate) fn new(id: ElementId, schema: Arc<ElementSchema>, link: Link) -> Self {
        let variables = schema
            .variables()
            .iter()
            .map(|v| (v.name().to_string(), v.initial().clone()))
            .collect();

        Self {
            inner: Arc::new(ElementInner {
                id,
                schema,
                link,
                values: RwLock::new(FxHashMap::default()),
                variables: RwLock::new(variables),
                handlers: RwLock::new(FxHashMap::default()),
                retired: AtomicBool::new(false),
            }),
        }
    }
}

// ============================================================================
// RemoteElement - Accessors
// ============================================================================

impl RemoteElement {
    /// Returns the element id.
    #[inline]
    #[must_use]
    pub fn id(&self) -> &ElementId {
        &self.inner.id
    }

    /// Returns the element type name.
    #[inline]
    #[must_use]
    pub fn type_name(&self) -> &str {
        self.inner.schema.type_name()
    }

    /// Returns the element's schema.
    #[inline]
    #[must_use]
    pub fn schema(&self) -> &Arc<ElementSchema> {
        &self.inner.schema
    }

    /// Returns `true` once the element has been removed from its peer.
    ///
    /// A retired handle keeps its cache but sends nothing.
    #[inline]
    #[must_use]
    pub fn is_retired(&self) -> bool {
        self.inner.retired.load(Ordering::Acquire)
    }
}

// ============================================================================
// RemoteElement - Properties
// ============================================================================

impl RemoteElement {
    /// Returns the last known value of a property.
    ///
    /// `None` until a value has been received or written. An absent
    /// attribute is reported by the client as `Some(Value::Null)`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownProperty`] if the property is not declared.
    pub fn get(&self, prop_name: &str) -> Result<Option<Value>> {
        self.declared_property(prop_name)?;
        Ok(self.inner.values.read().get(prop_name).cloned())
    }

    /// Returns the last known value decoded as `T`.
    ///
    /// # Errors
    ///
    /// - [`Error::UnknownProperty`] if the property is not declared
    /// - [`Error::Json`] if the value does not decode as `T`
    pub fn get_as<T: DeserializeOwned>(&self, prop_name: &str) -> Result<Option<T>> {
        self.get(prop_name)?
            .map(serde_json::from_value)
            .transpose()
            .map_err(Error::from)
    }

    /// Writes a property.
    ///
    /// The cache is updated immediately and a `SetPropValue` is sent.
    /// Returns whether the message was sent; while disconnected the write
    /// stays local until the client reports a newer value.
    ///
    /// # Errors
    ///
    /// - [`Error::UnknownProperty`] if the property is not declared
    /// - [`Error::ReadOnlyProperty`] if the property is read-only
    pub fn set(&self, prop_name: &str, value: impl Into<Value>) -> Result<bool> {
        let descriptor = self.declared_property(prop_name)?;
        if descriptor.is_read_only() {
            return Err(Error::read_only_property(self.type_name(), prop_name));
        }

        let value = value.into();
        let is_attribute = descriptor.is_attribute();
        self.inner
            .values
            .write()
            .insert(prop_name.to_string(), value.clone());

        debug!(element_id = %self.inner.id, prop = %prop_name, "Setting property");
        Ok(self.send(&Message::set_prop(
            self.inner.id.clone(),
            prop_name,
            is_attribute,
            value,
        )))
    }

    /// Asks the client for a property's current value.
    ///
    /// The reply updates the cache when it arrives. Returns whether the
    /// request was sent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownProperty`] if the property is not declared.
    pub fn refresh(&self, prop_name: &str) -> Result<bool> {
        let is_attribute = self.declared_property(prop_name)?.is_attribute();
        Ok(self.send(&Message::get_prop(
            self.inner.id.clone(),
            prop_name,
            is_attribute,
        )))
    }

    /// Asks the client for every declared property.
    ///
    /// Returns the number of requests sent.
    pub fn refresh_all(&self) -> usize {
        self.inner
            .schema
            .properties()
            .iter()
            .filter(|p| {
                self.send(&Message::get_prop(
                    self.inner.id.clone(),
                    p.name(),
                    p.is_attribute(),
                ))
            })
            .count()
    }

    fn declared_property(&self, prop_name: &str) -> Result<&PropertyDescriptor> {
        self.inner
            .schema
            .property(prop_name)
            .ok_or_else(|| Error::unknown_property(self.type_name(), prop_name))
    }
}

// ============================================================================
// RemoteElement - Methods & Variables
// ============================================================================

impl RemoteElement {
    /// Invokes a native method on the client. Fire-and-forget.
    ///
    /// Returns whether the command was sent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownMethod`] if the method is not declared.
    pub fn invoke(&self, method_name: &str, args: Vec<Value>) -> Result<bool> {
        if self.inner.schema.method(method_name).is_none() {
            return Err(Error::unknown_method(self.type_name(), method_name));
        }

        debug!(element_id = %self.inner.id, method = %method_name, "Invoking method");
        Ok(self.send(&Message::call_method(
            self.inner.id.clone(),
            method_name,
            args,
        )))
    }

    /// Replaces a variable wholesale and pushes it to the client.
    ///
    /// Returns whether the update was sent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownVariable`] if the variable is not declared.
    pub fn set_variable(&self, var_name: &str, value: impl Into<Value>) -> Result<bool> {
        if self.inner.schema.variable(var_name).is_none() {
            return Err(Error::unknown_variable(self.type_name(), var_name));
        }

        let value = value.into();
        self.inner
            .variables
            .write()
            .insert(var_name.to_string(), value.clone());

        Ok(self.send(&Message::set_variable(
            self.inner.id.clone(),
            var_name,
            value,
        )))
    }

    /// Returns the local copy of a variable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownVariable`] if the variable is not declared.
    pub fn variable(&self, var_name: &str) -> Result<Value> {
        self.inner
            .variables
            .read()
            .get(var_name)
            .cloned()
            .ok_or_else(|| Error::unknown_variable(self.type_name(), var_name))
    }

    /// Returns the local copy of a variable decoded as `T`.
    ///
    /// # Errors
    ///
    /// - [`Error::UnknownVariable`] if the variable is not declared
    /// - [`Error::Json`] if the value does not decode as `T`
    pub fn variable_as<T: DeserializeOwned>(&self, var_name: &str) -> Result<T> {
        Ok(serde_json::from_value(self.variable(var_name)?)?)
    }
}

// ============================================================================
// RemoteElement - Events
// ============================================================================

impl RemoteElement {
    /// Registers a handler for a declared event.
    ///
    /// Handlers run on the connection's event loop and must not block.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownEvent`] if the event is not declared.
    pub fn on<F>(&self, event_name: &str, handler: F) -> Result<()>
    where
        F: Fn(&EventCallback) + Send + Sync + 'static,
    {
        if self.inner.schema.event(event_name).is_none() {
            return Err(Error::unknown_event(self.type_name(), event_name));
        }

        self.inner
            .handlers
            .write()
            .entry(event_name.to_string())
            .or_default()
            .push(Arc::new(handler));
        Ok(())
    }

    /// Returns the number of handlers registered for an event.
    #[must_use]
    pub fn handler_count(&self, event_name: &str) -> usize {
        self.inner
            .handlers
            .read()
            .get(event_name)
            .map_or(0, Vec::len)
    }
}

// ============================================================================
// RemoteElement - Link
// ============================================================================

impl RemoteElement {
    /// Marks the element as removed from its peer.
    pub(crate) fn retire(&self) {
        self.inner.retired.store(true, Ordering::Release);
    }

    /// Sends through the peer link unless the element is retired.
    fn send(&self, message: &Message) -> bool {
        if self.is_retired() {
            debug!(element_id = %self.inner.id, kind = ?message.kind, "Dropping send from retired element");
            return false;
        }
        self.inner.link.send(message)
    }
}

// ============================================================================
// RemoteElement - Inbound
// ============================================================================

impl RemoteElement {
    /// Stores a reported value. Undeclared properties are dropped.
    pub(crate) fn apply_value(&self, update: PropValue) -> bool {
        if self.inner.schema.property(&update.prop_name).is_none() {
            trace!(element_id = %self.inner.id, prop = %update.prop_name, "Dropping undeclared property");
            return false;
        }

        self.inner
            .values
            .write()
            .insert(update.prop_name, update.prop_value);
        true
    }

    /// Runs the handlers of a relayed event. Returns how many ran.
    pub(crate) fn dispatch_event(&self, callback: &EventCallback) -> usize {
        let handlers: Vec<EventHandler> = self
            .inner
            .handlers
            .read()
            .get(&callback.event_name)
            .cloned()
            .unwrap_or_default();

        if handlers.is_empty() {
            debug!(element_id = %self.inner.id, event = %callback.event_name, "No handler for event");
        }

        for handler in &handlers {
            handler(callback);
        }
        handlers.len()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use parking_lot::Mutex;
    use serde_json::json;
    use tokio::sync::mpsc::UnboundedReceiver;

    use crate::protocol::{MethodCall, PropRequest, PropUpdate, RequestKind, VariableUpdate};
    use crate::transport::Connection;
    use crate::transport::connection::ConnectionCommand;

    fn schema() -> Arc<ElementSchema> {
        Arc::new(
            ElementSchema::builder("MatSelect")
                .event("selectionChange")
                .variable_with_default("options", json!([]))
                .property(PropertyDescriptor::dom("value"))
                .property(PropertyDescriptor::dom("panelOpen").read_only())
                .property(PropertyDescriptor::attribute("disabled"))
                .method("open")
                .build()
                .expect("schema"),
        )
    }

    fn connected() -> (RemoteElement, UnboundedReceiver<ConnectionCommand>) {
        let link = Link::new();
        let (connection, rx) = Connection::capture();
        link.attach(connection);
        (RemoteElement::new(ElementId::new("sel1"), schema(), link), rx)
    }

    fn next(rx: &mut UnboundedReceiver<ConnectionCommand>) -> Message {
        match rx.try_recv() {
            Ok(ConnectionCommand::Send(json)) => Message::from_json(&json).expect("decode"),
            other => panic!("expected frame, got {other:?}"),
        }
    }

    #[test]
    fn test_get_before_any_value() {
        let (element, _rx) = connected();
        assert_eq!(element.get("value").expect("get"), None);
        assert!(matches!(element.get("nope"), Err(Error::UnknownProperty { .. })));
    }

    #[test]
    fn test_set_updates_cache_and_sends() {
        let (element, mut rx) = connected();
        assert!(element.set("value", "Option B").expect("set"));
        assert_eq!(element.get("value").expect("get"), Some(json!("Option B")));

        let message = next(&mut rx);
        assert_eq!(message.kind, RequestKind::SetPropValue);
        let update: PropUpdate = message.payload().expect("payload");
        assert_eq!(update.prop_name, "value");
        assert!(!update.prop_is_attr);
        assert_eq!(update.prop_val, json!("Option B"));
    }

    #[test]
    fn test_set_attribute_flag() {
        let (element, mut rx) = connected();
        element.set("disabled", true).expect("set");
        let update: PropUpdate = next(&mut rx).payload().expect("payload");
        assert!(update.prop_is_attr);
    }

    #[test]
    fn test_set_read_only_rejected() {
        let (element, mut rx) = connected();
        assert!(matches!(
            element.set("panelOpen", true),
            Err(Error::ReadOnlyProperty { .. })
        ));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_set_while_disconnected_is_local() {
        let element = RemoteElement::new(ElementId::new("sel1"), schema(), Link::new());
        assert!(!element.set("value", "Option A").expect("set"));
        assert_eq!(element.get_as::<String>("value").expect("get").as_deref(), Some("Option A"));
    }

    #[test]
    fn test_apply_value_last_write_wins() {
        let (element, _rx) = connected();
        element.set("value", "Option A").expect("set");

        assert!(element.apply_value(PropValue {
            prop_name: "value".into(),
            prop_value: json!("Option C"),
        }));
        assert_eq!(element.get("value").expect("get"), Some(json!("Option C")));

        assert!(!element.apply_value(PropValue {
            prop_name: "innerHTML".into(),
            prop_value: json!("<b>x</b>"),
        }));
    }

    #[test]
    fn test_refresh_requests() {
        let (element, mut rx) = connected();
        assert!(element.refresh("disabled").expect("refresh"));
        let request: PropRequest = next(&mut rx).payload().expect("payload");
        assert_eq!(request.prop_name, "disabled");
        assert!(request.prop_is_attr);

        assert_eq!(element.refresh_all(), 3);
    }

    #[test]
    fn test_invoke() {
        let (element, mut rx) = connected();
        assert!(element.invoke("open", vec![]).expect("invoke"));
        let call: MethodCall = next(&mut rx).payload().expect("payload");
        assert_eq!(call.method_name, "open");

        assert!(matches!(
            element.invoke("explode", vec![]),
            Err(Error::UnknownMethod { .. })
        ));
    }

    #[test]
    fn test_variables_replace_wholesale() {
        let (element, mut rx) = connected();
        assert_eq!(element.variable("options").expect("var"), json!([]));

        element
            .set_variable("options", json!(["Option A", "Option B"]))
            .expect("set");
        element.set_variable("options", json!(["Option C"])).expect("set");

        let options: Vec<String> = element.variable_as("options").expect("var");
        assert_eq!(options, vec!["Option C"]);

        let first: VariableUpdate = next(&mut rx).payload().expect("payload");
        assert_eq!(first.var_value, json!(["Option A", "Option B"]));
        assert!(matches!(
            element.variable("missing"),
            Err(Error::UnknownVariable { .. })
        ));
    }

    #[test]
    fn test_event_handlers() {
        let (element, _rx) = connected();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);

        element
            .on("selectionChange", move |event| sink.lock().push(event.data.clone()))
            .expect("on");
        assert!(matches!(
            element.on("click", |_| {}),
            Err(Error::UnknownEvent { .. })
        ));
        assert_eq!(element.handler_count("selectionChange"), 1);

        let callback = EventCallback {
            event_name: "selectionChange".into(),
            event_type: "MatSelectChange".into(),
            data: json!({ "value": "Option B" }),
        };
        assert_eq!(element.dispatch_event(&callback), 1);
        assert_eq!(seen.lock().as_slice(), &[json!({ "value": "Option B" })]);
    }

    #[test]
    fn test_retired_element_sends_nothing() {
        let (element, mut rx) = connected();
        element.retire();
        assert!(element.is_retired());

        assert!(!element.set("value", "Option B").expect("set"));
        assert!(!element.refresh("value").expect("refresh"));
        assert_eq!(element.refresh_all(), 0);
        assert!(!element.invoke("open", vec![]).expect("invoke"));
        assert!(!element.set_variable("options", json!(["Option A"])).expect("set"));
        assert!(rx.try_recv().is_err());

        // The local cache still reflects the last write.
        assert_eq!(element.get("value").expect("get"), Some(json!("Option B")));
    }
}
