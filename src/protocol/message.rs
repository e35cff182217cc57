//! Message envelope and request kinds.
//!
//! The envelope carries no request token: replies are matched to requests
//! by `(uiElementId, propName)` convention and applied last-write-wins.

// ============================================================================
// Imports
// ============================================================================

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::identifiers::ElementId;

use super::payload::{
    EventCallback, EventList, MethodCall, PropRequest, PropUpdate, PropValue, VariableUpdate,
};

// ============================================================================
// RequestKind
// ============================================================================

/// Request kind discriminator, encoded as an integer on the wire.
///
/// Any value outside the known set decodes to [`RequestKind::None`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum RequestKind {
    /// Unknown or absent kind. Always ignored.
    #[default]
    None,
    /// Event subscription request (client) or event list reply (server).
    GetEvents,
    /// A subscribed DOM event fired on the client.
    EventCallback,
    /// Property read request, or the value it produced.
    GetPropValue,
    /// Property write.
    SetPropValue,
    /// Fire-and-forget native method invocation.
    CallMethod,
    /// Wholesale replacement of a bulk variable.
    SetVariable,
}

impl From<i64> for RequestKind {
    fn from(value: i64) -> Self {
        match value {
            1 => Self::GetEvents,
            2 => Self::EventCallback,
            3 => Self::GetPropValue,
            4 => Self::SetPropValue,
            5 => Self::CallMethod,
            6 => Self::SetVariable,
            _ => Self::None,
        }
    }
}

impl From<RequestKind> for i64 {
    fn from(kind: RequestKind) -> Self {
        match kind {
            RequestKind::None => 0,
            RequestKind::GetEvents => 1,
            RequestKind::EventCallback => 2,
            RequestKind::GetPropValue => 3,
            RequestKind::SetPropValue => 4,
            RequestKind::CallMethod => 5,
            RequestKind::SetVariable => 6,
        }
    }
}

// ============================================================================
// Message
// ============================================================================

/// One protocol frame.
///
/// # Format
///
/// ```json
/// {
///   "requestType": 4,
///   "uiElementId": "sel1",
///   "data": { "propName": "value", "propIsAttr": false, "propVal": "Option B" }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Request kind.
    #[serde(rename = "requestType", default)]
    pub kind: RequestKind,

    /// Target element.
    #[serde(rename = "uiElementId", default)]
    pub element_id: ElementId,

    /// Kind-specific payload. Absent payloads decode as `{}`.
    #[serde(default = "empty_payload")]
    pub data: Value,
}

/// Default payload for frames without `data`.
fn empty_payload() -> Value {
    Value::Object(Map::new())
}

// ============================================================================
// Message - Constructors
// ============================================================================

impl Message {
    /// Creates a message with an arbitrary payload.
    #[inline]
    #[must_use]
    pub fn new(kind: RequestKind, element_id: ElementId, data: Value) -> Self {
        let data = if data.is_null() { empty_payload() } else { data };
        Self {
            kind,
            element_id,
            data,
        }
    }

    /// Creates a message from a typed payload.
    ///
    /// Payload types in this crate always serialize; a failure falls back to
    /// an empty payload.
    fn with_payload<T: Serialize>(kind: RequestKind, element_id: ElementId, payload: &T) -> Self {
        let data = serde_json::to_value(payload).unwrap_or_else(|_| empty_payload());
        Self::new(kind, element_id, data)
    }

    /// Client request for the element's event list.
    #[inline]
    #[must_use]
    pub fn get_events(element_id: ElementId) -> Self {
        Self::new(RequestKind::GetEvents, element_id, empty_payload())
    }

    /// Server reply carrying the event names to subscribe.
    #[must_use]
    pub fn event_list(element_id: ElementId, events: Vec<String>) -> Self {
        Self::with_payload(RequestKind::GetEvents, element_id, &EventList { events })
    }

    /// Client notification that a subscribed event fired.
    #[must_use]
    pub fn event_callback(element_id: ElementId, callback: EventCallback) -> Self {
        Self::with_payload(RequestKind::EventCallback, element_id, &callback)
    }

    /// Property read request.
    #[must_use]
    pub fn get_prop(element_id: ElementId, prop_name: impl Into<String>, prop_is_attr: bool) -> Self {
        Self::with_payload(
            RequestKind::GetPropValue,
            element_id,
            &PropRequest {
                prop_name: prop_name.into(),
                prop_is_attr,
            },
        )
    }

    /// Property value report.
    #[must_use]
    pub fn prop_value(element_id: ElementId, prop_name: impl Into<String>, prop_value: Value) -> Self {
        Self::with_payload(
            RequestKind::GetPropValue,
            element_id,
            &PropValue {
                prop_name: prop_name.into(),
                prop_value,
            },
        )
    }

    /// Property write.
    #[must_use]
    pub fn set_prop(
        element_id: ElementId,
        prop_name: impl Into<String>,
        prop_is_attr: bool,
        prop_val: Value,
    ) -> Self {
        Self::with_payload(
            RequestKind::SetPropValue,
            element_id,
            &PropUpdate {
                prop_name: prop_name.into(),
                prop_is_attr,
                prop_val,
            },
        )
    }

    /// Native method invocation.
    #[must_use]
    pub fn call_method(
        element_id: ElementId,
        method_name: impl Into<String>,
        method_args: Vec<Value>,
    ) -> Self {
        Self::with_payload(
            RequestKind::CallMethod,
            element_id,
            &MethodCall {
                method_name: method_name.into(),
                method_args,
            },
        )
    }

    /// Bulk variable replacement.
    #[must_use]
    pub fn set_variable(element_id: ElementId, var_name: impl Into<String>, var_value: Value) -> Self {
        Self::with_payload(
            RequestKind::SetVariable,
            element_id,
            &VariableUpdate {
                var_name: var_name.into(),
                var_value,
            },
        )
    }
}

// ============================================================================
// Message - Codec
// ============================================================================

impl Message {
    /// Decodes the payload into a typed structure.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if the payload does not match `T`.
    pub fn payload<T: DeserializeOwned>(&self) -> Result<T> {
        T::deserialize(&self.data).map_err(|e| {
            Error::protocol(format!("invalid {:?} payload: {e}", self.kind))
        })
    }

    /// Encodes the message as a JSON text frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decodes a JSON text frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if the text is not a message object.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

// ============================================================================
// Tests
// ============================================================================
