//! Web server module for the Messenger relay.
//!
//! This module provides:
//! - The webhook verification handshake
//! - Signed webhook intake, dispatched to the backend
//! - The outbound send endpoint used by the backend

pub mod handlers;
pub mod signature;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

pub use handlers::{
    health, receive_webhook, send_message, verify_webhook, AppState, HealthResponse, SendForm,
    VerifyQuery, EVENT_RECEIVED,
};
pub use signature::{
    is_signature_verification_enabled, sign_body, verify_request, verify_signature,
    SignatureAlgorithm, SignatureError,
};

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/webhook/:channel_id/receive",
            get(verify_webhook).post(receive_webhook),
        )
        .route("/webhook/:channel_id/send", post(send_message))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
