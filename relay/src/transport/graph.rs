//! Messenger send API client.
//!
//! Reference: https://developers.facebook.com/docs/messenger-platform/send-messages

use std::time::{Duration, Instant};

use reqwest::Client;
use tracing::{error, info};

use super::{check_response, remaining_time, TransportError};
use crate::messenger::SendMessageRequest;

/// Client for the Graph API `me/messages` endpoint.
#[derive(Clone)]
pub struct GraphClient {
    http: Client,
    send_url: String,
    default_timeout: Duration,
}

impl GraphClient {
    pub fn new(http: Client, send_url: impl Into<String>, default_timeout: Duration) -> Self {
        Self {
            http,
            send_url: send_url.into(),
            default_timeout,
        }
    }

    /// Send a message as JSON, passing the page access token as a query
    /// parameter.
    ///
    /// Succeeds on HTTP 200 without an `error` object in the response body.
    pub async fn send(
        &self,
        access_token: &str,
        request: &SendMessageRequest,
        deadline: Option<Instant>,
    ) -> Result<(), TransportError> {
        let timeout = remaining_time(deadline, self.default_timeout);

        info!(
            recipient = %request.recipient.id,
            messaging_type = %request.messaging_type,
            timeout_seconds = timeout.as_secs_f64(),
            "graph_send_starting"
        );

        let response = match self
            .http
            .post(&self.send_url)
            .query(&[("access_token", access_token)])
            .timeout(timeout)
            .json(request)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                error!(
                    recipient = %request.recipient.id,
                    is_timeout = e.is_timeout(),
                    error = %e,
                    "graph_send_request_error"
                );
                return Err(TransportError::Network(e));
            }
        };

        check_response(response, "graph").await?;

        info!(recipient = %request.recipient.id, "graph_send_complete");

        Ok(())
    }
}
