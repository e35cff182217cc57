//! Kind-specific payloads.
//!
//! All field names are camelCase on the wire.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// GetEvents
// ============================================================================

/// Event names the client should attach listeners for.
///
/// ```json
/// { "events": ["openedChange", "selectionChange"] }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventList {
    /// Ordered event names.
    #[serde(default)]
    pub events: Vec<String>,
}

// ============================================================================
// EventCallback
// ============================================================================

/// A subscribed DOM event fired on the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventCallback {
    /// The event's `type`, e.g. `click`.
    pub event_name: String,

    /// The event's class name, e.g. `MouseEvent`.
    #[serde(default)]
    pub event_type: String,

    /// Serialized event object.
    #[serde(default)]
    pub data: Value,
}

// ============================================================================
// GetPropValue
// ============================================================================

/// Request to read a property or attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropRequest {
    /// Property or attribute name.
    pub prop_name: String,

    /// Read the attribute instead of the native property.
    #[serde(default)]
    pub prop_is_attr: bool,
}

/// Current value of a property or attribute.
///
/// An absent attribute is reported as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropValue {
    /// Property or attribute name.
    pub prop_name: String,

    /// The value read.
    #[serde(default)]
    pub prop_value: Value,
}

// ============================================================================
// SetPropValue
// ============================================================================

/// Request to write a property or attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropUpdate {
    /// Property or attribute name.
    pub prop_name: String,

    /// Write the attribute instead of the native property.
    #[serde(default)]
    pub prop_is_attr: bool,

    /// The value to write.
    #[serde(default)]
    pub prop_val: Value,
}

// ============================================================================
// CallMethod
// ============================================================================

/// Fire-and-forget native method invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodCall {
    /// Method name on the bound node.
    pub method_name: String,

    /// Positional arguments.
    #[serde(default)]
    pub method_args: Vec<Value>,
}

// ============================================================================
// SetVariable
// ============================================================================

/// Wholesale replacement of a bulk variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableUpdate {
    /// Variable name.
    pub var_name: String,

    /// Complete new value.
    #[serde(default)]
    pub var_value: Value,
}

// ============================================================================
// Tests
// ============================================================================
