//! Structural checks for JSON asset documents.
//!
//! Every cache tier and the network layer use the same rule: a tokenizer
//! document is valid when it parses as JSON whose top level is an object.

use serde_json::Value;

/// Why a byte payload is not an acceptable JSON document.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DocumentError {
    /// The payload ends before the JSON value is complete.
    #[error("document is truncated: {0}")]
    Truncated(String),
    /// The payload is not well-formed JSON.
    #[error("document is not valid JSON: {0}")]
    Malformed(String),
    /// The payload is valid JSON but its top level is not an object.
    #[error("document top level is {found}, expected an object")]
    NotAnObject {
        /// The JSON type found at the top level.
        found: &'static str,
    },
}

impl DocumentError {
    /// Truncation is the only failure that a re-download can fix.
    pub fn is_truncation(&self) -> bool {
        matches!(self, DocumentError::Truncated(_))
    }
}

/// Checks that `bytes` hold one complete, well-formed JSON value.
pub fn check_json(bytes: &[u8]) -> Result<Value, DocumentError> {
    serde_json::from_slice::<Value>(bytes).map_err(|e| {
        if e.is_eof() {
            DocumentError::Truncated(e.to_string())
        } else {
            DocumentError::Malformed(e.to_string())
        }
    })
}

/// Checks that `bytes` hold a JSON document whose top level is an object.
pub fn check_json_object(bytes: &[u8]) -> Result<(), DocumentError> {
    match check_json(bytes)? {
        Value::Object(_) => Ok(()),
        other => Err(DocumentError::NotAnObject {
            found: json_type_name(&other),
        }),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
