//! Outbound text interpretation.
//!
//! The backend may send either plain text or a full Messenger message object
//! serialized as JSON in the `text` field.

use serde_json::Value;

use crate::messenger::MessageBody;

/// Interpret backend text as a message body.
///
/// A JSON object is forwarded as a structured message. Anything else,
/// including JSON scalars and arrays, is sent as plain text.
pub fn outbound_body(text: &str) -> MessageBody {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => MessageBody::Structured(map),
        _ => MessageBody::Text {
            text: text.to_string(),
        },
    }
}
