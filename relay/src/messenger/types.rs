//! Messenger Platform wire types.
//!
//! Webhook payloads are deeply nested and almost every field is optional, so
//! every field that Facebook may omit or send as `null` decodes to its default.
//! Nothing here trusts the documented "single element" shape of arrays.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use super::attachment::Attachment;

/// The only webhook object kind this relay accepts.
pub const PAGE_OBJECT: &str = "page";

/// Messaging type used for replies inside the standard messaging window.
pub const MESSAGING_TYPE_RESPONSE: &str = "RESPONSE";

/// Decode an explicit `null` the same as a missing field.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// =============================================================================
// Webhook Types (Facebook → relay)
// =============================================================================

/// Webhook request received from Facebook, carrying messages, delivery
/// receipts and postbacks.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEnvelope {
    /// Subscription object kind, must be `page`
    #[serde(default, deserialize_with = "null_as_default")]
    pub object: String,
    /// Batched entries, processed in order
    #[serde(default, deserialize_with = "null_as_default")]
    pub entry: Vec<Entry>,
}

/// A single entry of a webhook request.
#[derive(Debug, Clone, Deserialize)]
pub struct Entry {
    /// Time of update in epoch milliseconds
    #[serde(default, deserialize_with = "null_as_default")]
    pub time: i64,
    /// Page id
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    /// Messaging events; documented to hold exactly one element
    #[serde(default, deserialize_with = "null_as_default")]
    pub messaging: Vec<MessagingEvent>,
}

/// Sender or recipient of a messaging event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
}

impl Participant {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// One messaging event as it appears on the wire.
///
/// Facebook sends at most one of `message`, `postback` or `delivery`; use
/// [`MessagingEvent::content`] to get the tagged view.
#[derive(Debug, Clone, Deserialize)]
pub struct MessagingEvent {
    #[serde(default, deserialize_with = "null_as_default")]
    pub sender: Participant,
    #[serde(default, deserialize_with = "null_as_default")]
    pub recipient: Participant,
    #[serde(default, deserialize_with = "null_as_default")]
    pub timestamp: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub message: Option<Message>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub postback: Option<Postback>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub delivery: Option<Delivery>,
}

/// Tagged view over the payload of a messaging event.
#[derive(Debug, Clone, Copy)]
pub enum EventContent<'a> {
    Message(&'a Message),
    Postback(&'a Postback),
    Delivery(&'a Delivery),
    Empty,
}

impl MessagingEvent {
    /// Classify the event. A message wins over a postback, which wins over a
    /// delivery receipt.
    pub fn content(&self) -> EventContent<'_> {
        if let Some(message) = &self.message {
            EventContent::Message(message)
        } else if let Some(postback) = &self.postback {
            EventContent::Postback(postback)
        } else if let Some(delivery) = &self.delivery {
            EventContent::Delivery(delivery)
        } else {
            EventContent::Empty
        }
    }
}

/// Text or attachment message sent by a user.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Message {
    #[serde(default, deserialize_with = "null_as_default")]
    pub mid: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub seq: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub text: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub attachments: Vec<Attachment>,
}

/// Button click payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Postback {
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub payload: String,
}

/// Delivery receipt for previously sent messages.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Delivery {
    #[serde(default, deserialize_with = "null_as_default")]
    pub mids: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub seq: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub watermark: i64,
}

// =============================================================================
// Send API Types (relay → Facebook)
// =============================================================================

/// Request body for the Messenger send API.
#[derive(Debug, Clone, Serialize)]
pub struct SendMessageRequest {
    pub messaging_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    pub recipient: Participant,
    pub message: MessageBody,
}

impl SendMessageRequest {
    /// Build a `RESPONSE` request for the given recipient.
    pub fn response(recipient_id: impl Into<String>, message: MessageBody) -> Self {
        Self {
            messaging_type: MESSAGING_TYPE_RESPONSE.to_string(),
            tag: None,
            recipient: Participant::new(recipient_id),
            message,
        }
    }
}

/// The `message` object of a send request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MessageBody {
    /// Plain text, serialized as `{"text": ...}`
    Text { text: String },
    /// A structured message object forwarded as-is
    Structured(serde_json::Map<String, serde_json::Value>),
}

/// Error object returned by the Graph API.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ApiError {
    #[serde(default)]
    pub code: i64,
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub fbtrace_id: String,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "FB Error {}: Type {}: {}; FB trace ID: {}",
            self.code, self.kind, self.message, self.fbtrace_id
        )
    }
}
