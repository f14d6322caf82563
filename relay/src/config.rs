//! Configuration module for environment variable parsing.
//!
//! All settings come from the environment. A `.env` file in the working
//! directory is loaded first when present.

use std::env;
use std::time::Duration;

use tracing::warn;

/// Default Graph API endpoint for sending Messenger messages.
pub const DEFAULT_SEND_URL: &str = "https://graph.facebook.com/v12.0/me/messages";

/// Placeholder in the backend URL template replaced by the channel id.
pub const CHANNEL_ID_PLACEHOLDER: &str = "{ChannelId}";

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port for the web server to listen on
    pub port: u16,

    /// Token Facebook echoes back during the webhook verification handshake
    pub verify_token: String,

    /// App secret used as the HMAC key for payload signatures
    pub app_secret: Option<String>,

    /// Page access token used when the backend does not supply one
    pub access_token: Option<String>,

    /// Backend receive URL, containing `{ChannelId}`
    pub rapidpro_url: String,

    /// Messenger send API endpoint
    pub send_url: String,

    /// Default deadline for outbound HTTP calls in milliseconds
    pub request_timeout_ms: u64,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                warn!(error = %e, "dotenv_load_failed");
            }
        }

        let rapidpro_url = env::var("RAPID_URL").unwrap_or_else(|_| {
            format!("http://localhost:8000/c/fba/{}/receive", CHANNEL_ID_PLACEHOLDER)
        });
        if !rapidpro_url.contains(CHANNEL_ID_PLACEHOLDER) {
            warn!(
                rapidpro_url = %rapidpro_url,
                placeholder = CHANNEL_ID_PLACEHOLDER,
                "rapidpro_url_missing_placeholder"
            );
        }

        Config {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8119),

            verify_token: env::var("FB_VERIFY_TOKEN").unwrap_or_default(),

            app_secret: non_empty_var("FB_APP_SECRET"),

            access_token: non_empty_var("FB_ACCESS_TOKEN"),

            rapidpro_url,

            send_url: env::var("FB_SEND_URL").unwrap_or_else(|_| DEFAULT_SEND_URL.to_string()),

            request_timeout_ms: env::var("REQUEST_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10_000),
        }
    }

    /// Default outbound deadline as a duration.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Read a variable, treating blank values as unset.
fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
