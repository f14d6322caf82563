//! Message attachments.
//!
//! The attachment `payload` schema depends on `type`. Decoding goes through a
//! raw form and is then matched into a closed set of variants, so that unknown
//! or malformed attachments become data rather than decode failures.

use serde::Deserialize;
use serde_json::Value;

use super::types::null_as_default;

/// Media attachment kinds relayed as marker text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
    Audio,
    File,
}

impl MediaKind {
    fn from_type(kind: &str) -> Option<Self> {
        match kind {
            "image" => Some(Self::Image),
            "video" => Some(Self::Video),
            "audio" => Some(Self::Audio),
            "file" => Some(Self::File),
            _ => None,
        }
    }

    /// The wire name of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
            Self::Audio => "audio",
            Self::File => "file",
        }
    }
}

/// Geographic coordinates of a shared location.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub long: f64,
}

/// A decoded message attachment.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "RawAttachment")]
pub enum Attachment {
    /// Shared location; `None` when the coordinates are missing or malformed
    Location(Option<Coordinates>),
    /// Image, video, audio or file
    Media {
        kind: MediaKind,
        title: String,
        url: String,
    },
    /// Any other attachment type (templates, fallback, stickers...)
    Unsupported { kind: String },
}

#[derive(Deserialize)]
struct RawAttachment {
    #[serde(default, rename = "type", deserialize_with = "null_as_default")]
    kind: String,
    #[serde(default)]
    payload: Value,
}

#[derive(Deserialize)]
struct LocationPayload {
    coordinates: Coordinates,
}

impl From<RawAttachment> for Attachment {
    fn from(raw: RawAttachment) -> Self {
        if raw.kind == "location" {
            let coordinates = serde_json::from_value::<LocationPayload>(raw.payload)
                .ok()
                .map(|p| p.coordinates);
            return Attachment::Location(coordinates);
        }

        match MediaKind::from_type(&raw.kind) {
            Some(kind) => Attachment::Media {
                kind,
                title: payload_str(&raw.payload, "title"),
                url: payload_str(&raw.payload, "url"),
            },
            None => Attachment::Unsupported { kind: raw.kind },
        }
    }
}

/// A string field of the payload; anything else reads as empty.
fn payload_str(payload: &Value, field: &str) -> String {
    payload
        .get(field)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}
