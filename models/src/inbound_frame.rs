//! Application frames received on the ingestion connection.

use crate::{ErrorLocation, ModelError};

use std::panic::Location;

use serde_json::{Map, Value};

/// Field carrying the frame discriminator.
pub const FRAME_TYPE_FIELD: &str = "type";

/// A decoded JSON object received from the ingestion endpoint.
///
/// Only objects qualify. The `type` discriminator is read through [`InboundFrame::kind`];
/// everything else is opaque payload handed to the frame handler as-is.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundFrame {
    body: Map<String, Value>,
}

impl InboundFrame {
    /// Wrap a decoded JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Frame`] if the value is not a JSON object.
    #[track_caller]
    pub fn from_value(value: Value) -> Result<Self, ModelError> {
        match value {
            Value::Object(body) => Ok(Self { body }),
            other => Err(ModelError::Frame {
                message: format!("Inbound frame must be a JSON object, got {}", json_kind(&other)),
                location: ErrorLocation::from(Location::caller()),
            }),
        }
    }

    /// The `type` discriminator, if present and a string.
    pub fn kind(&self) -> Option<&str> {
        self.body.get(FRAME_TYPE_FIELD).and_then(Value::as_str)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.body.get(field)
    }

    pub fn body(&self) -> &Map<String, Value> {
        &self.body
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.body)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
