//! Outbound HTTP transport.
//!
//! This module provides:
//! - `RapidProClient` for form-encoded delivery to the backend
//! - `GraphClient` for JSON delivery to the Messenger send API
//!
//! Both wrap one shared `reqwest::Client` built at startup. Every call issues
//! exactly one request with a bounded deadline and is never retried.

pub mod graph;
pub mod rapidpro;

use std::time::{Duration, Instant};

use reqwest::{Response, StatusCode};
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::warn;

use crate::messenger::ApiError;

pub use graph::GraphClient;
pub use rapidpro::RapidProClient;

/// Deadline applied when the caller supplies none.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Outbound delivery failures.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection, timeout or request construction failure.
    #[error("transport error: {0}")]
    Network(#[from] reqwest::Error),

    /// The upstream answered, but not with success.
    #[error("unexpected response status {code}, error: {body}")]
    Upstream { code: u16, body: String },
}

impl TransportError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Network(e) if e.is_timeout())
    }
}

/// Time left until `deadline`, or `default` when there is none.
///
/// An elapsed deadline yields a zero timeout, which fails the request
/// immediately instead of sending it unbounded.
pub fn remaining_time(deadline: Option<Instant>, default: Duration) -> Duration {
    match deadline {
        Some(deadline) => deadline.saturating_duration_since(Instant::now()),
        None => default,
    }
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    error: Option<Map<String, Value>>,
}

/// Extract a non-empty `error` object from a response body, if any.
pub fn structured_error(body: &str) -> Option<ApiError> {
    let map = serde_json::from_str::<ErrorEnvelope>(body).ok()?.error?;
    if map.is_empty() {
        return None;
    }

    let raw = Value::Object(map);
    let error = serde_json::from_value::<ApiError>(raw.clone()).unwrap_or_else(|_| ApiError {
        message: raw.to_string(),
        ..ApiError::default()
    });
    Some(error)
}

/// Turn a response into success or `TransportError::Upstream`.
///
/// A structured error object in the body takes precedence over the status
/// code, so a 200 carrying `{"error": {...}}` is still a failure.
pub(crate) async fn check_response(response: Response, target: &str) -> Result<(), TransportError> {
    let status = response.status();
    let body = response.text().await?;

    if let Some(error) = structured_error(&body) {
        warn!(
            target_name = target,
            status_code = status.as_u16(),
            error_code = error.code,
            error = %error,
            "upstream_error_object"
        );
        return Err(TransportError::Upstream {
            code: status.as_u16(),
            body: error.to_string(),
        });
    }

    if status != StatusCode::OK {
        warn!(
            target_name = target,
            status_code = status.as_u16(),
            body_preview = %&body[..floor_char_boundary(&body, 500)],
            "upstream_unexpected_status"
        );
        return Err(TransportError::Upstream {
            code: status.as_u16(),
            body,
        });
    }

    Ok(())
}

fn floor_char_boundary(s: &str, max: usize) -> usize {
    if s.len() <= max {
        return s.len();
    }
    let mut idx = max;
    while !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}
