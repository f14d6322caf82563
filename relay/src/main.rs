//! Messenger Relay - Facebook Messenger webhook bridge for RapidPro.
//!
//! This binary:
//! - Answers the Facebook webhook verification handshake
//! - Verifies, normalizes and forwards webhook events to RapidPro
//! - Relays RapidPro send requests to the Messenger send API

use std::net::SocketAddr;

use anyhow::{Context, Result};
use tokio::{net::TcpListener, signal};
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use relay::{router, AppState, Config, Dispatcher, GraphClient, RapidProClient};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured JSON logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    info!("relay_starting");

    // Load configuration
    let config = Config::from_env();
    info!(
        port = config.port,
        rapidpro_url = %config.rapidpro_url,
        send_url = %config.send_url,
        verify_token_configured = !config.verify_token.is_empty(),
        app_secret_configured = config.app_secret.is_some(),
        access_token_configured = config.access_token.is_some(),
        request_timeout_ms = config.request_timeout_ms,
        "config_loaded"
    );

    // One HTTP client shared by both outbound directions
    let http = reqwest::Client::builder()
        .build()
        .context("Failed to build HTTP client")?;

    let rapidpro = RapidProClient::new(
        http.clone(),
        config.rapidpro_url.clone(),
        config.request_timeout(),
    );
    let graph = GraphClient::new(http, config.send_url.clone(), config.request_timeout());

    let dispatcher = Dispatcher::new(rapidpro, config.app_secret.clone());
    if !dispatcher.verifies_signatures() {
        warn!("webhook_signature_verification_disabled");
    }

    let port = config.port;
    let state = AppState::new(config, dispatcher, graph);
    let app = router(state);

    // Bind to address
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!(address = %addr, "relay_listening");

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("relay_shutdown_complete");

    Ok(())
}

/// Create a future that completes when a shutdown signal is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }

    info!("relay_shutting_down");
}
