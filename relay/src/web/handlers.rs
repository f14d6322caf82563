//! HTTP endpoint handlers.
//!
//! Inbound (Facebook → relay):
//! - `GET  /webhook/:channel_id/receive` verification handshake
//! - `POST /webhook/:channel_id/receive` signed webhook events
//!
//! Outbound (backend → relay → Facebook):
//! - `POST /webhook/:channel_id/send` form-encoded send request, keyed by app id

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{rejection::FormRejection, Form, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::dispatch::Dispatcher;
use crate::messenger::{SendMessageRequest, MESSAGING_TYPE_RESPONSE};
use crate::normalize::outbound_body;
use crate::transport::GraphClient;
use crate::Config;

/// Body Facebook expects on a successfully received webhook.
pub const EVENT_RECEIVED: &str = "EVENT_RECEIVED";

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub dispatcher: Dispatcher,
    pub graph: GraphClient,
}

impl AppState {
    pub fn new(config: Config, dispatcher: Dispatcher, graph: GraphClient) -> Self {
        Self {
            config: Arc::new(config),
            dispatcher,
            graph,
        }
    }
}

// =============================================================================
// Health Check
// =============================================================================

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

// =============================================================================
// Webhook Verification
// =============================================================================

/// Query parameters of the subscription handshake.
#[derive(Debug, Deserialize)]
pub struct VerifyQuery {
    #[serde(default, rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(default, rename = "hub.verify_token")]
    pub verify_token: String,
    #[serde(default, rename = "hub.challenge")]
    pub challenge: String,
}

/// Echo the challenge when the verify token matches.
pub async fn verify_webhook(
    State(state): State<AppState>,
    Path(channel_id): Path<String>,
    Query(query): Query<VerifyQuery>,
) -> impl IntoResponse {
    let expected = state.config.verify_token.as_str();

    if expected.is_empty() || query.verify_token != expected {
        warn!(
            channel_id = %channel_id,
            mode = ?query.mode,
            verify_token_configured = !expected.is_empty(),
            "webhook_verification_failed"
        );
        return (StatusCode::UNAUTHORIZED, String::new());
    }

    info!(channel_id = %channel_id, "webhook_verified");
    (StatusCode::OK, query.challenge)
}

// =============================================================================
// Webhook Events
// =============================================================================

/// Receive a webhook, forward its entries to the backend and acknowledge.
///
/// The raw body is taken as bytes because the signature covers the exact
/// payload Facebook sent.
pub async fn receive_webhook(
    State(state): State<AppState>,
    Path(channel_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    info!(
        channel_id = %channel_id,
        body_length = body.len(),
        has_signature = headers.contains_key("x-hub-signature")
            || headers.contains_key("x-hub-signature-256"),
        "webhook_received"
    );

    match state.dispatcher.handle(&headers, &body, &channel_id, None).await {
        Ok(entries) => {
            info!(channel_id = %channel_id, entries = entries, "webhook_acknowledged");
            (StatusCode::OK, EVENT_RECEIVED)
        }
        Err(e) => {
            error!(
                channel_id = %channel_id,
                stage = e.stage(),
                status_code = e.status_code().as_u16(),
                error = %e,
                "webhook_failed"
            );
            (e.status_code(), e.response_body())
        }
    }
}

// =============================================================================
// Outbound Send
// =============================================================================

/// Form posted by the backend to send a message.
#[derive(Debug, Deserialize)]
pub struct SendForm {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub to: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub messaging_type: Option<String>,
    #[serde(default)]
    pub tag: Option<String>,
}

/// Relay a backend message to the Messenger send API.
pub async fn send_message(
    State(state): State<AppState>,
    Path(app_id): Path<String>,
    form: Result<Form<SendForm>, FormRejection>,
) -> impl IntoResponse {
    let Form(form) = match form {
        Ok(form) => form,
        Err(e) => {
            warn!(app_id = %app_id, stage = "parse", error = %e, "send_request_invalid");
            return (StatusCode::BAD_REQUEST, "bad request".to_string());
        }
    };

    info!(
        app_id = %app_id,
        id = %form.id,
        from = %form.from,
        to = %form.to,
        text_length = form.text.len(),
        "send_request_received"
    );

    if form.to.is_empty() {
        warn!(app_id = %app_id, id = %form.id, "send_missing_recipient");
        return (StatusCode::BAD_REQUEST, "missing recipient".to_string());
    }

    let access_token = if form.access_token.is_empty() {
        state.config.access_token.clone().unwrap_or_default()
    } else {
        form.access_token
    };
    if access_token.is_empty() {
        warn!(app_id = %app_id, id = %form.id, "send_missing_access_token");
    }

    let mut request = SendMessageRequest::response(form.to, outbound_body(&form.text));
    request.messaging_type = form
        .messaging_type
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| MESSAGING_TYPE_RESPONSE.to_string());
    request.tag = form.tag.filter(|t| !t.is_empty());

    if let Err(e) = state.graph.send(&access_token, &request, None).await {
        error!(
            app_id = %app_id,
            id = %form.id,
            to = %request.recipient.id,
            stage = "forward",
            error = %e,
            "send_failed"
        );
        return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
    }

    info!(app_id = %app_id, id = %form.id, to = %request.recipient.id, "send_complete");

    (StatusCode::OK, String::new())
}
