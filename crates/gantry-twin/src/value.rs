//! Resource values and resource types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A value together with the instant it was set.
///
/// An unset resource has neither value nor timestamp.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TimedValue {
    /// Current value.
    pub value: Option<Value>,
    /// When the value was set.
    pub timestamp: Option<DateTime<Utc>>,
}

impl TimedValue {
    /// Creates a set value.
    #[must_use]
    pub fn new(value: Value, timestamp: DateTime<Utc>) -> Self {
        Self {
            value: Some(value),
            timestamp: Some(timestamp),
        }
    }

    /// Returns `true` if no value has been set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.value.is_none()
    }

    /// Returns the value as a string slice, if it is a JSON string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        self.value.as_ref().and_then(Value::as_str)
    }
}

/// How fresh a value read must be.
///
/// The in-memory twin always answers from its cache; twins backed by a
/// southbound device may pull a fresh value for `Strong`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GetLevel {
    /// Fetch from the device.
    Strong,
    /// Use the cached value unless the twin decides otherwise.
    #[default]
    Normal,
    /// Cached value only.
    Weak,
}

/// Kind of a twin resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceType {
    /// Value measured by a device.
    Sensor,
    /// Configuration-like value.
    Property,
    /// Internal device state.
    StateVariable,
    /// Invocable action. Has no value.
    Action,
}

impl ResourceType {
    /// Returns `true` for [`ResourceType::Action`].
    #[must_use]
    pub fn is_action(&self) -> bool {
        matches!(self, Self::Action)
    }
}

impl std::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Sensor => "SENSOR",
            Self::Property => "PROPERTY",
            Self::StateVariable => "STATE_VARIABLE",
            Self::Action => "ACTION",
        };
        f.write_str(s)
    }
}

/// Declared JSON shape of a resource value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    /// Any JSON value.
    #[default]
    Any,
    /// JSON string.
    String,
    /// Any JSON number.
    Number,
    /// JSON number without fraction.
    Integer,
    /// JSON boolean.
    Boolean,
    /// JSON object.
    Object,
    /// JSON array.
    Array,
}

impl ContentType {
    /// Returns `true` if `value` fits this content type. `null` always fits.
    ///
    /// # Example
    ///
    /// ```
    /// use gantry_twin::ContentType;
    /// use serde_json::json;
    ///
    /// assert!(ContentType::Integer.accepts(&json!(3)));
    /// assert!(!ContentType::Integer.accepts(&json!(3.5)));
    /// assert!(ContentType::String.accepts(&json!(null)));
    /// ```
    #[must_use]
    pub fn accepts(&self, value: &Value) -> bool {
        if value.is_null() {
            return true;
        }
        match self {
            Self::Any => true,
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Boolean => value.is_boolean(),
            Self::Object => value.is_object(),
            Self::Array => value.is_array(),
        }
    }

    /// Returns the lowercase name of this content type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Any => "any",
            Self::String => "string",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array => "array",
        }
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
