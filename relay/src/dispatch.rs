//! Webhook dispatch.
//!
//! Each inbound webhook request goes through:
//!
//! ```text
//! Received → Verified → Parsed → entries normalized and forwarded → Acknowledged
//!     │          │         │                 │
//!    401        400       400               500
//! ```
//!
//! Entries are handled strictly in order and the first failing entry aborts
//! the whole request. Nothing is retried here; Facebook redelivers on its own.

use std::time::Instant;

use axum::http::{HeaderMap, StatusCode};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::messenger::{WebhookEnvelope, PAGE_OBJECT};
use crate::normalize::{normalize_entry, NormalizeError};
use crate::transport::{RapidProClient, TransportError};
use crate::web::signature::{is_signature_verification_enabled, verify_request, SignatureError};

/// Failure while handling a single entry.
#[derive(Debug, Error)]
pub enum EntryError {
    #[error(transparent)]
    Normalize(#[from] NormalizeError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Terminal failure of a webhook request.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("authorize: {0}")]
    Unauthorized(#[from] SignatureError),

    #[error("unmarshal request: {0}")]
    BadRequest(#[from] serde_json::Error),

    #[error("unknown web hook object: {0:?}")]
    UnknownObject(String),

    #[error("handle webhook request entry {index}: {source}")]
    Entry {
        index: usize,
        #[source]
        source: EntryError,
    },
}

impl DispatchError {
    /// HTTP status reported to Facebook.
    pub fn status_code(&self) -> StatusCode {
        match self {
            DispatchError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            DispatchError::BadRequest(_) | DispatchError::UnknownObject(_) => StatusCode::BAD_REQUEST,
            DispatchError::Entry { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short response body matching the status.
    pub fn response_body(&self) -> &'static str {
        match self {
            DispatchError::Unauthorized(_) => "unauthorized",
            DispatchError::BadRequest(_) | DispatchError::UnknownObject(_) => "bad request",
            DispatchError::Entry { .. } => "internal",
        }
    }

    /// Pipeline stage that failed, for logging.
    pub fn stage(&self) -> &'static str {
        match self {
            DispatchError::Unauthorized(_) => "verify",
            DispatchError::BadRequest(_) => "parse",
            DispatchError::UnknownObject(_) => "envelope",
            DispatchError::Entry {
                source: EntryError::Normalize(_),
                ..
            } => "normalize",
            DispatchError::Entry {
                source: EntryError::Transport(_),
                ..
            } => "forward",
        }
    }
}

/// Runs the verify → parse → normalize → forward pipeline.
#[derive(Clone)]
pub struct Dispatcher {
    app_secret: Option<String>,
    rapidpro: RapidProClient,
}

impl Dispatcher {
    /// Create a dispatcher. Signature checking is skipped when `app_secret`
    /// is unset or blank.
    pub fn new(rapidpro: RapidProClient, app_secret: Option<String>) -> Self {
        let app_secret = if is_signature_verification_enabled(&app_secret) {
            app_secret
        } else {
            None
        };
        Self {
            app_secret,
            rapidpro,
        }
    }

    pub fn verifies_signatures(&self) -> bool {
        self.app_secret.is_some()
    }

    /// Handle a raw webhook request. Returns the number of forwarded entries.
    pub async fn handle(
        &self,
        headers: &HeaderMap,
        body: &[u8],
        channel_id: &str,
        deadline: Option<Instant>,
    ) -> Result<usize, DispatchError> {
        if let Some(secret) = &self.app_secret {
            verify_request(secret, headers, body)?;
        }

        let envelope: WebhookEnvelope = serde_json::from_slice(body)?;

        self.dispatch(&envelope, channel_id, deadline).await
    }

    /// Normalize and forward every entry of a decoded envelope, in order.
    pub async fn dispatch(
        &self,
        envelope: &WebhookEnvelope,
        channel_id: &str,
        deadline: Option<Instant>,
    ) -> Result<usize, DispatchError> {
        if envelope.object != PAGE_OBJECT {
            warn!(
                channel_id = %channel_id,
                object = %envelope.object,
                "webhook_unknown_object"
            );
            return Err(DispatchError::UnknownObject(envelope.object.clone()));
        }

        info!(
            channel_id = %channel_id,
            entry_count = envelope.entry.len(),
            "webhook_dispatch_start"
        );

        for (index, entry) in envelope.entry.iter().enumerate() {
            let result = match normalize_entry(entry, channel_id) {
                Ok(msg) => self
                    .rapidpro
                    .deliver(&msg, deadline)
                    .await
                    .map_err(EntryError::from),
                Err(e) => Err(EntryError::from(e)),
            };

            if let Err(source) = result {
                error!(
                    channel_id = %channel_id,
                    entry_index = index,
                    entry_id = %entry.id,
                    error = %source,
                    "webhook_entry_failed"
                );
                return Err(DispatchError::Entry { index, source });
            }
        }

        info!(
            channel_id = %channel_id,
            entry_count = envelope.entry.len(),
            "webhook_dispatch_complete"
        );

        Ok(envelope.entry.len())
    }
}
