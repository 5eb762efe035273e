//! Wire Envelope
//!
//! One named event plus its payload, carried as a single JSON text frame:
//! `{"event": "<name>", "data": <payload>}`.

use serde::Serialize;
use serde_json::Value;

use super::error::FrameError;

/// A named unit of data sent or received over the channel
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope {
    /// Event name used for routing
    pub event: String,
    /// Arbitrary structured payload
    pub data: Value,
}

impl Envelope {
    /// Create an envelope with an explicit payload
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }

    /// Create an envelope from positional emit arguments.
    ///
    /// A single argument is sent bare; any other count (including zero) is
    /// sent as an array in argument order.
    pub fn from_args(event: impl Into<String>, mut args: Vec<Value>) -> Self {
        let data = if args.len() == 1 {
            args.swap_remove(0)
        } else {
            Value::Array(args)
        };
        Self::new(event, data)
    }

    /// Serialize to a text frame
    pub fn to_frame(&self) -> Result<String, FrameError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse an inbound text frame.
    ///
    /// Returns `Ok(None)` for valid JSON that is not an object with a
    /// non-empty string `event`; those are ignored rather than treated as
    /// malformed. A missing `data` decodes as `null`.
    pub fn parse(frame: &str) -> Result<Option<Self>, FrameError> {
        let Value::Object(mut fields) = serde_json::from_str::<Value>(frame)? else {
            return Ok(None);
        };

        let event = match fields.remove("event") {
            Some(Value::String(event)) if !event.is_empty() => event,
            _ => return Ok(None),
        };
        let data = fields.remove("data").unwrap_or(Value::Null);

        Ok(Some(Self::new(event, data)))
    }
}
