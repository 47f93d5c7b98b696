//! Frame decoding
//!
//! A frame is one JSON object pushed by the gateway. Only three fields matter
//! to the bridge: `id` (the resource identifier), `r` (the resource type) and
//! `state`. Everything else on the wire is ignored.

use serde_json::{Map, Value};

use crate::error::FrameError;

/// Resource type tag of sensor frames
pub const SENSOR_RESOURCE: &str = "sensors";

/// A decoded gateway frame
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Resource identifier, always in string form
    pub id: String,
    /// Resource type tag (`r` on the wire)
    pub resource: String,
    /// Nested state object
    pub state: Map<String, Value>,
}

impl Frame {
    /// Decode a frame from its text payload.
    ///
    /// Integer identifiers are normalised to their decimal string so that
    /// `"id": 7` and `"id": "7"` route to the same subscriber.
    pub fn decode(payload: &str) -> Result<Self, FrameError> {
        let value: Value = serde_json::from_str(payload)?;
        let mut object = match value {
            Value::Object(object) => object,
            other => {
                return Err(FrameError::InvalidField {
                    field: "<root>",
                    found: json_type(&other),
                })
            }
        };

        let id = match object.remove("id") {
            Some(Value::String(id)) => id,
            Some(Value::Number(n)) if n.is_u64() || n.is_i64() => n.to_string(),
            Some(Value::Null) | None => return Err(FrameError::MissingField("id")),
            Some(other) => {
                return Err(FrameError::InvalidField {
                    field: "id",
                    found: json_type(&other),
                })
            }
        };

        let resource = match object.remove("r") {
            Some(Value::String(r)) => r,
            Some(Value::Null) | None => return Err(FrameError::MissingField("r")),
            Some(other) => {
                return Err(FrameError::InvalidField {
                    field: "r",
                    found: json_type(&other),
                })
            }
        };

        let state = match object.remove("state") {
            Some(Value::Object(state)) => state,
            Some(Value::Null) | None => return Err(FrameError::MissingField("state")),
            Some(other) => {
                return Err(FrameError::InvalidField {
                    field: "state",
                    found: json_type(&other),
                })
            }
        };

        Ok(Self {
            id,
            resource,
            state,
        })
    }

    /// Whether this frame describes a resource of the given type
    pub fn is_resource(&self, resource: &str) -> bool {
        self.resource == resource
    }

    /// Presence signal carried by the state object.
    ///
    /// `true` only when a `presence` field exists and is truthy.
    pub fn presence(&self) -> bool {
        self.state.get("presence").is_some_and(is_truthy)
    }
}

/// Truthiness of a JSON value: `false`, `null`, zero and empty values are false
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
