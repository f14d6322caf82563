//! End-to-end tests: the real router on an ephemeral port, with RapidPro and
//! the Graph API mocked.

use std::time::Duration;

use relay::web::{sign_body, SignatureAlgorithm};
use relay::{router, AppState, Config, Dispatcher, GraphClient, RapidProClient};
use serde_json::json;
use tokio::net::TcpListener;
use wiremock::matchers::{body_json, body_string, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const APP_SECRET: &str = "e2e-app-secret";
const VERIFY_TOKEN: &str = "e2e-verify-token";
const PAGE_TOKEN: &str = "EAAPAGE";

fn config(rapidpro: &MockServer, graph: &MockServer) -> Config {
    Config {
        port: 0,
        verify_token: VERIFY_TOKEN.to_string(),
        app_secret: Some(APP_SECRET.to_string()),
        access_token: Some(PAGE_TOKEN.to_string()),
        rapidpro_url: format!("{}/c/fba/{{ChannelId}}/receive", rapidpro.uri()),
        send_url: format!("{}/v12.0/me/messages", graph.uri()),
        request_timeout_ms: 5_000,
    }
}

/// Start the relay and return its base URL.
async fn spawn_relay(config: Config) -> String {
    let http = reqwest::Client::new();
    let rapidpro = RapidProClient::new(
        http.clone(),
        config.rapidpro_url.clone(),
        config.request_timeout(),
    );
    let graph = GraphClient::new(http, config.send_url.clone(), config.request_timeout());
    let dispatcher = Dispatcher::new(rapidpro, config.app_secret.clone());
    let app = router(AppState::new(config, dispatcher, graph));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{}", addr)
}

fn text_envelope(sender: &str, text: &str) -> String {
    json!({
        "object": "page",
        "entry": [{
            "id": "PAGE_ID",
            "time": 1458692752478_i64,
            "messaging": [{
                "sender": {"id": sender},
                "recipient": {"id": "PAGE_ID"},
                "timestamp": 1458692752478_i64,
                "message": {"mid": "mid.1", "text": text}
            }]
        }]
    })
    .to_string()
}

async fn post_webhook(base: &str, channel_id: &str, body: &str, signature: Option<&str>) -> (u16, String) {
    let mut request = reqwest::Client::new()
        .post(format!("{}/webhook/{}/receive", base, channel_id))
        .header("content-type", "application/json")
        .timeout(Duration::from_secs(10))
        .body(body.to_string());
    if let Some(signature) = signature {
        request = request.header("X-Hub-Signature", signature);
    }
    let response = request.send().await.unwrap();
    let status = response.status().as_u16();
    (status, response.text().await.unwrap())
}

#[tokio::test]
async fn test_text_message_reaches_backend() {
    let rapidpro = MockServer::start().await;
    let graph = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/c/fba/123/receive"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string("from=USER_1&text=hello"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&rapidpro)
        .await;

    let base = spawn_relay(config(&rapidpro, &graph)).await;
    let body = text_envelope("USER_1", "hello");
    let signature = sign_body(APP_SECRET, body.as_bytes(), SignatureAlgorithm::Sha1);

    let (status, text) = post_webhook(&base, "123", &body, Some(&signature)).await;
    assert_eq!(status, 200);
    assert_eq!(text, "EVENT_RECEIVED");
}

#[tokio::test]
async fn test_sha256_signature_accepted() {
    let rapidpro = MockServer::start().await;
    let graph = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&rapidpro)
        .await;

    let base = spawn_relay(config(&rapidpro, &graph)).await;
    let body = text_envelope("USER_1", "hello");
    let signature = sign_body(APP_SECRET, body.as_bytes(), SignatureAlgorithm::Sha256);

    let response = reqwest::Client::new()
        .post(format!("{}/webhook/123/receive", base))
        .header("X-Hub-Signature-256", signature)
        .body(body)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
}

#[tokio::test]
async fn test_location_attachment_marker_forwarded() {
    let rapidpro = MockServer::start().await;
    let graph = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_string("from=USER_1&text=%23location%3D1.5%2C-2.25"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&rapidpro)
        .await;

    let base = spawn_relay(config(&rapidpro, &graph)).await;
    let body = json!({
        "object": "page",
        "entry": [{"id": "PAGE_ID", "time": 1, "messaging": [{
            "sender": {"id": "USER_1"},
            "recipient": {"id": "PAGE_ID"},
            "message": {"mid": "m", "attachments": [
                {"type": "location", "payload": {"coordinates": {"lat": 1.5, "long": -2.25}}}
            ]}
        }]}]
    })
    .to_string();
    let signature = sign_body(APP_SECRET, body.as_bytes(), SignatureAlgorithm::Sha1);

    let (status, _) = post_webhook(&base, "123", &body, Some(&signature)).await;
    assert_eq!(status, 200);
}

#[tokio::test]
async fn test_invalid_signature_is_unauthorized() {
    let rapidpro = MockServer::start().await;
    let graph = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&rapidpro)
        .await;

    let base = spawn_relay(config(&rapidpro, &graph)).await;
    let body = text_envelope("USER_1", "hello");
    let signature = sign_body("wrong-secret", body.as_bytes(), SignatureAlgorithm::Sha1);

    let (status, text) = post_webhook(&base, "123", &body, Some(&signature)).await;
    assert_eq!(status, 401);
    assert_eq!(text, "unauthorized");

    let (status, _) = post_webhook(&base, "123", &body, None).await;
    assert_eq!(status, 401);
}

#[tokio::test]
async fn test_undecodable_body_is_bad_request() {
    let rapidpro = MockServer::start().await;
    let graph = MockServer::start().await;
    let base = spawn_relay(config(&rapidpro, &graph)).await;

    let body = "{\"object\": ";
    let signature = sign_body(APP_SECRET, body.as_bytes(), SignatureAlgorithm::Sha1);

    let (status, text) = post_webhook(&base, "123", body, Some(&signature)).await;
    assert_eq!(status, 400);
    assert_eq!(text, "bad request");
}

#[tokio::test]
async fn test_unknown_object_is_bad_request() {
    let rapidpro = MockServer::start().await;
    let graph = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&rapidpro)
        .await;

    let base = spawn_relay(config(&rapidpro, &graph)).await;
    let body = text_envelope("USER_1", "hello").replace("\"page\"", "\"instagram\"");
    let signature = sign_body(APP_SECRET, body.as_bytes(), SignatureAlgorithm::Sha1);

    let (status, _) = post_webhook(&base, "123", &body, Some(&signature)).await;
    assert_eq!(status, 400);
}

#[tokio::test]
async fn test_backend_failure_is_internal_error() {
    let rapidpro = MockServer::start().await;
    let graph = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(502))
        .expect(1)
        .mount(&rapidpro)
        .await;

    let base = spawn_relay(config(&rapidpro, &graph)).await;
    let body = text_envelope("USER_1", "hello");
    let signature = sign_body(APP_SECRET, body.as_bytes(), SignatureAlgorithm::Sha1);

    let (status, text) = post_webhook(&base, "123", &body, Some(&signature)).await;
    assert_eq!(status, 500);
    assert_eq!(text, "internal");
}

#[tokio::test]
async fn test_verification_handshake() {
    let rapidpro = MockServer::start().await;
    let graph = MockServer::start().await;
    let base = spawn_relay(config(&rapidpro, &graph)).await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/webhook/123/receive", base))
        .query(&[
            ("hub.mode", "subscribe"),
            ("hub.verify_token", VERIFY_TOKEN),
            ("hub.challenge", "CHALLENGE_ACCEPTED"),
        ])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(response.text().await.unwrap(), "CHALLENGE_ACCEPTED");

    let response = client
        .get(format!("{}/webhook/123/receive", base))
        .query(&[("hub.verify_token", "nope"), ("hub.challenge", "x")])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn test_send_plain_text() {
    let rapidpro = MockServer::start().await;
    let graph = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v12.0/me/messages"))
        .and(query_param("access_token", "FORM_TOKEN"))
        .and(body_json(json!({
            "messaging_type": "RESPONSE",
            "recipient": {"id": "USER_1"},
            "message": {"text": "hello"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "recipient_id": "USER_1",
            "message_id": "mid.2"
        })))
        .expect(1)
        .mount(&graph)
        .await;

    let base = spawn_relay(config(&rapidpro, &graph)).await;
    let response = reqwest::Client::new()
        .post(format!("{}/webhook/APP_1/send", base))
        .form(&[
            ("id", "42"),
            ("from", "PAGE_ID"),
            ("to", "USER_1"),
            ("text", "hello"),
            ("access_token", "FORM_TOKEN"),
        ])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
}

#[tokio::test]
async fn test_send_structured_uses_configured_token() {
    let rapidpro = MockServer::start().await;
    let graph = MockServer::start().await;
    Mock::given(method("POST"))
        .and(query_param("access_token", PAGE_TOKEN))
        .and(body_json(json!({
            "messaging_type": "RESPONSE",
            "recipient": {"id": "USER_1"},
            "message": {"text": "hi"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message_id": "m"})))
        .expect(1)
        .mount(&graph)
        .await;

    let base = spawn_relay(config(&rapidpro, &graph)).await;
    let response = reqwest::Client::new()
        .post(format!("{}/webhook/APP_1/send", base))
        .form(&[("id", "1"), ("to", "USER_1"), ("text", r#"{"text":"hi"}"#)])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
}

#[tokio::test]
async fn test_send_platform_error_is_internal_error() {
    let rapidpro = MockServer::start().await;
    let graph = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": {
                "message": "Invalid OAuth access token.",
                "type": "OAuthException",
                "code": 190,
                "fbtrace_id": "TRACE"
            }
        })))
        .expect(1)
        .mount(&graph)
        .await;

    let base = spawn_relay(config(&rapidpro, &graph)).await;
    let response = reqwest::Client::new()
        .post(format!("{}/webhook/APP_1/send", base))
        .form(&[("to", "USER_1"), ("text", "hello")])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 500);
    assert!(response
        .text()
        .await
        .unwrap()
        .contains("Invalid OAuth access token."));
}

#[tokio::test]
async fn test_send_without_recipient_is_bad_request() {
    let rapidpro = MockServer::start().await;
    let graph = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&graph)
        .await;

    let base = spawn_relay(config(&rapidpro, &graph)).await;
    let response = reqwest::Client::new()
        .post(format!("{}/webhook/APP_1/send", base))
        .form(&[("text", "hello")])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn test_send_non_form_body_is_bad_request() {
    let rapidpro = MockServer::start().await;
    let graph = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&graph)
        .await;

    let base = spawn_relay(config(&rapidpro, &graph)).await;
    let response = reqwest::Client::new()
        .post(format!("{}/webhook/APP_1/send", base))
        .header("content-type", "application/json")
        .body(r#"{"to":"USER_1","text":"hello"}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);
    assert_eq!(response.text().await.unwrap(), "bad request");
}

#[tokio::test]
async fn test_health() {
    let rapidpro = MockServer::start().await;
    let graph = MockServer::start().await;
    let base = spawn_relay(config(&rapidpro, &graph)).await;

    let response = reqwest::get(format!("{}/health", base)).await.unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body, json!({"status": "ok"}));
}
