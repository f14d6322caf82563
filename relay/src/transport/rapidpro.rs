//! Delivery of normalized messages to the RapidPro channel backend.

use std::time::{Duration, Instant};

use reqwest::Client;
use serde::Serialize;
use tracing::{error, info};

use super::{check_response, remaining_time, TransportError};
use crate::config::CHANNEL_ID_PLACEHOLDER;
use crate::normalize::NormalizedMessage;

/// Form fields accepted by the backend receive endpoint.
#[derive(Debug, Serialize)]
struct ReceiveForm<'a> {
    from: &'a str,
    text: &'a str,
}

/// Client for the backend's external channel receive endpoint.
#[derive(Clone)]
pub struct RapidProClient {
    http: Client,
    url_template: String,
    default_timeout: Duration,
}

impl RapidProClient {
    /// Create a client. `url_template` contains `{ChannelId}`.
    pub fn new(http: Client, url_template: impl Into<String>, default_timeout: Duration) -> Self {
        Self {
            http,
            url_template: url_template.into(),
            default_timeout,
        }
    }

    /// Receive URL for a channel.
    pub fn channel_url(&self, channel_id: &str) -> String {
        self.url_template.replacen(CHANNEL_ID_PLACEHOLDER, channel_id, 1)
    }

    /// Post a normalized message as `from`/`text` form fields.
    ///
    /// Succeeds only on HTTP 200.
    pub async fn deliver(
        &self,
        msg: &NormalizedMessage,
        deadline: Option<Instant>,
    ) -> Result<(), TransportError> {
        let url = self.channel_url(&msg.channel_id);
        let timeout = remaining_time(deadline, self.default_timeout);

        info!(
            url = %url,
            channel_id = %msg.channel_id,
            from = %msg.sender.id,
            text_length = msg.text.len(),
            timeout_seconds = timeout.as_secs_f64(),
            "rapidpro_deliver_starting"
        );

        let form = ReceiveForm {
            from: &msg.sender.id,
            text: &msg.text,
        };

        let response = match self.http.post(&url).timeout(timeout).form(&form).send().await {
            Ok(response) => response,
            Err(e) => {
                error!(
                    url = %url,
                    channel_id = %msg.channel_id,
                    is_timeout = e.is_timeout(),
                    error = %e,
                    "rapidpro_deliver_request_error"
                );
                return Err(TransportError::Network(e));
            }
        };

        check_response(response, "rapidpro").await?;

        info!(channel_id = %msg.channel_id, from = %msg.sender.id, "rapidpro_deliver_complete");

        Ok(())
    }
}
