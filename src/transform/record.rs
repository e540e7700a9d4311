//! Target record shape and transform errors

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A record reshaped for the target table
///
/// Serialized field order matches the table's column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransformedRecord {
    pub id: String,
    pub category_id: Option<String>,
    pub is_active: Option<bool>,
    pub record_type: String,
    /// Every source field that was neither promoted nor dropped
    #[serde(default)]
    pub data: Map<String, Value>,
}

/// Result of reshaping one source record
#[derive(Debug, Clone, PartialEq)]
pub enum Reshaped {
    Record(TransformedRecord),
    /// Unknown discriminator under the quarantine policy; the source is kept verbatim
    Quarantined(Value),
}

/// Conditions that abort the transform stage
#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    #[error("source record is not a JSON object (found {found})")]
    NotAnObject { found: &'static str },

    #[error("source record has no '{field}' field")]
    MissingField { field: String },

    #[error("record '{id}': field '{field}' must be {expected}, found {found}")]
    InvalidField {
        id: String,
        field: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error(
        "record '{id}': unrecognized discriminator {field}={value}; add it to record_types or quarantine it"
    )]
    UnknownDiscriminator {
        id: String,
        field: String,
        value: String,
    },
}

/// JSON type name used in error messages
pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
