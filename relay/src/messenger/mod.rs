//! Facebook Messenger Platform data model.
//!
//! This module provides:
//! - Webhook types received from Facebook
//! - Send API request and error types
//! - Attachment decoding into a closed set of variants

pub mod attachment;
pub mod types;

pub use attachment::{Attachment, Coordinates, MediaKind};
pub use types::{
    ApiError, Delivery, Entry, EventContent, Message, MessageBody, MessagingEvent, Participant,
    Postback, SendMessageRequest, WebhookEnvelope, MESSAGING_TYPE_RESPONSE, PAGE_OBJECT,
};
