//! Inbound request dispatch.
//!
//! The router runs on the connection's event loop and handles one message
//! at a time. Everything it sends goes through the [`Outbox`], which applies
//! the same liveness and registration checks as every other send.
//!
//! | Kind | Action | Reply |
//! |------|--------|-------|
//! | `GetEvents` | store subscriptions, attach new listeners | none |
//! | `GetPropValue` | read attribute or property | `GetPropValue` |
//! | `SetPropValue` | write attribute or property | none |
//! | `CallMethod` | invoke native method | none |
//! | `SetVariable` | replace property wholesale | none |

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::identifiers::ElementId;
use crate::protocol::{
    EventCallback, EventList, Message, MethodCall, PropRequest, PropUpdate, RequestKind,
    VariableUpdate,
};
use crate::transport::Link;

use super::dom::{DomEvent, Listener, NodeRef};
use super::registry::SharedRegistry;

// ============================================================================
// Outbox
// ============================================================================

/// Checked outbound path of the browser-side session.
///
/// `send` returns `false` without writing anything when the link is not
/// connected or the message targets an unregistered element.
#[derive(Clone)]
pub struct Outbox {
    link: Link,
    registry: SharedRegistry,
}

impl Outbox {
    /// Creates an outbox over a link and registry.
    #[inline]
    #[must_use]
    pub fn new(link: Link, registry: SharedRegistry) -> Self {
        Self { link, registry }
    }

    /// Sends a message if connected and the element is registered.
    pub fn send(&self, message: &Message) -> bool {
        if !self.link.is_connected() {
            debug!(kind = ?message.kind, element_id = %message.element_id, "Can't send to closed socket");
            return false;
        }
        if !self.registry.read().contains(&message.element_id) {
            trace!(element_id = %message.element_id, "Dropping message for unregistered element");
            return false;
        }
        self.link.send(message)
    }
}

// ============================================================================
// RequestRouter
// ============================================================================

/// Dispatches inbound messages against the element registry.
#[derive(Clone)]
pub struct RequestRouter {
    registry: SharedRegistry,
    outbox: Outbox,
}

impl RequestRouter {
    /// Creates a router.
    #[inline]
    #[must_use]
    pub fn new(registry: SharedRegistry, outbox: Outbox) -> Self {
        Self { registry, outbox }
    }

    /// Returns the outbox replies are sent through.
    #[inline]
    #[must_use]
    pub fn outbox(&self) -> &Outbox {
        &self.outbox
    }

    /// Handles one inbound message.
    ///
    /// Unknown kinds, unregistered elements and malformed payloads are
    /// logged and ignored.
    pub fn dispatch(&self, message: Message) {
        let node = match message.kind {
            RequestKind::None | RequestKind::EventCallback => {
                trace!(kind = ?message.kind, "Ignoring message kind on client");
                return;
            }
            _ => match self.registry.read().lookup(&message.element_id) {
                Ok(node) => node,
                Err(e) => {
                    debug!(error = %e, kind = ?message.kind, "Ignoring message");
                    return;
                }
            },
        };

        let handled = match message.kind {
            RequestKind::GetEvents => message
                .payload::<EventList>()
                .map(|list| self.handle_get_events(&message.element_id, list)),
            RequestKind::GetPropValue => message
                .payload::<PropRequest>()
                .map(|request| self.handle_get_prop(&message.element_id, &node, &request)),
            RequestKind::SetPropValue => message
                .payload::<PropUpdate>()
                .map(|update| Self::handle_set_prop(&message.element_id, &node, update)),
            RequestKind::CallMethod => message
                .payload::<MethodCall>()
                .map(|call| Self::handle_call_method(&message.element_id, &node, &call)),
            RequestKind::SetVariable => message
                .payload::<VariableUpdate>()
                .map(|update| Self::handle_set_variable(&message.element_id, &node, update)),
            RequestKind::None | RequestKind::EventCallback => Ok(()),
        };

        if let Err(e) = handled {
            warn!(element_id = %message.element_id, error = %e, "Malformed request");
        }
    }

    /// Reads a property or attribute and sends its value.
    ///
    /// Used both for `GetPropValue` requests and for change notifications.
    /// Returns whether the value was sent.
    pub fn report(&self, element_id: &ElementId, prop_name: &str, prop_is_attr: bool) -> bool {
        let node = match self.registry.read().lookup(element_id) {
            Ok(node) => node,
            Err(_) => return false,
        };

        let value = read_value(element_id, &node, prop_name, prop_is_attr);
        self.outbox
            .send(&Message::prop_value(element_id.clone(), prop_name, value))
    }

    // ========================================================================
    // Handlers
    // ========================================================================

    fn handle_get_events(&self, element_id: &ElementId, list: EventList) {
        let subscribed = self.registry.write().subscribe(element_id, list.events);

        let (node, fresh) = match subscribed {
            Ok(subscribed) => subscribed,
            Err(e) => {
                debug!(error = %e, "Element retired before subscription");
                return;
            }
        };

        for event_name in &fresh {
            node.add_listener(event_name, self.event_listener(element_id.clone()));
        }

        debug!(element_id = %element_id, attached = fresh.len(), "Event listeners attached");
    }

    fn handle_get_prop(&self, element_id: &ElementId, node: &NodeRef, request: &PropRequest) {
        let value = read_value(element_id, node, &request.prop_name, request.prop_is_attr);
        self.outbox.send(&Message::prop_value(
            element_id.clone(),
            request.prop_name.as_str(),
            value,
        ));
    }

    fn handle_set_prop(element_id: &ElementId, node: &NodeRef, update: PropUpdate) {
        let result = if update.prop_is_attr {
            match attribute_text(&update.prop_val) {
                Some(text) => node.set_attribute(&update.prop_name, &text),
                None => {
                    node.remove_attribute(&update.prop_name);
                    Ok(())
                }
            }
        } else {
            node.set_property(&update.prop_name, update.prop_val)
        };

        if let Err(e) = result {
            warn!(element_id = %element_id, prop = %update.prop_name, error = %e, "Property write failed");
        }
    }

    fn handle_call_method(element_id: &ElementId, node: &NodeRef, call: &MethodCall) {
        if let Err(e) = node.call_method(&call.method_name, &call.method_args) {
            warn!(element_id = %element_id, method = %call.method_name, error = %e, "Method call failed");
        }
    }

    fn handle_set_variable(element_id: &ElementId, node: &NodeRef, update: VariableUpdate) {
        if let Err(e) = node.set_property(&update.var_name, update.var_value) {
            warn!(element_id = %element_id, variable = %update.var_name, error = %e, "Variable write failed");
        }
    }

    /// Builds the listener relaying one element's events.
    fn event_listener(&self, element_id: ElementId) -> Listener {
        let outbox = self.outbox.clone();
        Arc::new(move |event: &DomEvent| {
            let callback = EventCallback {
                event_name: event.name.clone(),
                event_type: event.class_name.clone(),
                data: event.data.clone(),
            };
            outbox.send(&Message::event_callback(element_id.clone(), callback));
        })
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Reads an attribute or native property as a JSON value.
///
/// Absent attributes and failed property reads yield `null`.
fn read_value(element_id: &ElementId, node: &NodeRef, name: &str, is_attr: bool) -> Value {
    if is_attr {
        return node.get_attribute(name).map_or(Value::Null, Value::String);
    }

    node.get_property(name).unwrap_or_else(|e| {
        warn!(element_id = %element_id, prop = %name, error = %e, "Property read failed");
        Value::Null
    })
}

/// Maps a JSON value onto attribute text.
///
/// `None` means the attribute should be removed.
fn attribute_text(value: &Value) -> Option<String> {
    match value {
        Value::Null | Value::Bool(false) => None,
        Value::Bool(true) => Some(String::new()),
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

// ============================================================================
// Tests
// ============================================================================
