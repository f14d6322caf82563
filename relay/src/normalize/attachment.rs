//! Attachment rendering into backend marker text.
//!
//! The backend only understands text, so attachments are encoded as marker
//! strings the flows can match on:
//!
//! - location: `#location=<lat>,<long>`
//! - media: `#type=<type>#title=<title>#url=<url>`

use std::collections::HashMap;

use serde_json::Value;
use tracing::{debug, warn};

use super::Location;
use crate::messenger::Attachment;

/// Text and side data produced from an attachment.
#[derive(Debug, Default, PartialEq)]
pub struct RenderedAttachment {
    pub text: String,
    pub location: Option<Location>,
    pub extra: HashMap<String, Value>,
}

/// Render an attachment. Unsupported or malformed attachments render to
/// empty text rather than failing.
pub fn render_attachment(attachment: &Attachment) -> RenderedAttachment {
    let mut rendered = RenderedAttachment::default();

    match attachment {
        Attachment::Location(Some(coordinates)) => {
            // f64 Display is shortest round-trip and never scientific.
            rendered.text = format!("#location={},{}", coordinates.lat, coordinates.long);
            rendered.location = Some(Location {
                lat: coordinates.lat,
                lng: coordinates.long,
            });
        }
        Attachment::Location(None) => {
            warn!("location_coordinates_missing");
        }
        Attachment::Media { kind, title, url } => {
            rendered.text = format!("#type={}#title={}#url={}", kind.as_str(), title, url);
            rendered
                .extra
                .insert("attachment_type".to_string(), Value::from(kind.as_str()));
            rendered.extra.insert("url".to_string(), Value::from(url.as_str()));
        }
        Attachment::Unsupported { kind } => {
            debug!(attachment_type = %kind, "attachment_unsupported");
        }
    }

    rendered
}
