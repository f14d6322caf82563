//! Webhook payload normalization.
//!
//! This module turns Messenger webhook entries into platform-agnostic
//! messages for the backend, and backend text into Messenger message bodies.
//!
//! ## Processing Flow
//!
//! ```text
//! Entry → normalize_entry() → NormalizedMessage        (inbound)
//! text  → outbound_body()   → MessageBody               (outbound)
//! ```

pub mod attachment;
pub mod outbound;

use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::info;

use crate::messenger::{Entry, EventContent, Participant};

pub use attachment::render_attachment;
pub use outbound::outbound_body;

/// Platform name stamped on every normalized message.
pub const SOURCE_PLATFORM: &str = "Facebook";

/// Normalization failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NormalizeError {
    /// The entry carried no messaging events at all.
    #[error("there is no message entry")]
    NoMessageEntry,
}

/// A shared location.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Location {
    pub lat: f64,
    pub lng: f64,
}

/// Platform-agnostic message forwarded to the backend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedMessage {
    /// Platform message id (`mid`), empty for postbacks
    pub id: String,
    pub source_platform: String,
    pub channel_id: String,
    /// Message text or attachment marker; empty for unsupported content
    pub text: String,
    pub location: Option<Location>,
    pub sender: Participant,
    pub recipient: Participant,
    pub extra: HashMap<String, Value>,
}

/// Normalize the first messaging event of a webhook entry.
///
/// Facebook documents `messaging` as a single-element array. Only the first
/// event is used and an empty array is an error, not a skip.
pub fn normalize_entry(entry: &Entry, channel_id: &str) -> Result<NormalizedMessage, NormalizeError> {
    let event = entry.messaging.first().ok_or(NormalizeError::NoMessageEntry)?;

    let mut msg = NormalizedMessage {
        id: String::new(),
        source_platform: SOURCE_PLATFORM.to_string(),
        channel_id: channel_id.to_string(),
        text: String::new(),
        location: None,
        sender: event.sender.clone(),
        recipient: event.recipient.clone(),
        extra: HashMap::new(),
    };
    msg.extra.insert("entry_id".to_string(), Value::from(entry.id.clone()));
    msg.extra.insert("timestamp".to_string(), Value::from(event.timestamp));

    let kind = match event.content() {
        EventContent::Message(message) => {
            msg.id = message.mid.clone();
            match message.attachments.first() {
                None => msg.text = message.text.clone(),
                Some(attachment) => {
                    let rendered = render_attachment(attachment);
                    msg.text = rendered.text;
                    msg.location = rendered.location;
                    msg.extra.extend(rendered.extra);
                }
            }
            "message"
        }
        EventContent::Postback(postback) => {
            msg.text = postback.payload.clone();
            "postback"
        }
        EventContent::Delivery(_) => "delivery",
        EventContent::Empty => "empty",
    };

    info!(
        channel_id = %channel_id,
        entry_id = %entry.id,
        event_kind = kind,
        sender = %msg.sender.id,
        recipient = %msg.recipient.id,
        text_length = msg.text.len(),
        "entry_normalized"
    );

    Ok(msg)
}
