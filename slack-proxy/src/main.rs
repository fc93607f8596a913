//! slack-proxy - Slack webhook gateway.
//!
//! This binary provides a thin, fast web server that:
//! - Receives Slack webhooks
//! - Verifies the Slack request signature
//! - Immediately publishes the raw payload to RabbitMQ
//! - Returns a bare status code
//!
//! Missing configuration or a missing destination queue stops the process
//! before it starts listening.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::{net::TcpListener, signal};
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use slack_proxy::{router, AmqpPublisher, AppState, Config, RequestValidator};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured JSON logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    info!("proxy_starting");

    let config = Config::from_env().context("Invalid configuration")?;
    info!(
        port = config.port,
        proxy_path = %config.proxy_path,
        publish_queue = %config.publish_queue,
        publish_timeout_ms = config.publish_timeout_ms,
        signature_max_age = ?config.signature_max_age,
        "config_loaded"
    );

    let publisher = AmqpPublisher::connect(
        config.cloudamqp_url.clone(),
        config.publish_queue.clone(),
    )
    .await
    .context("Failed to set up RabbitMQ publisher")?;
    info!(queue = publisher.queue(), "publisher_ready");

    let validator = RequestValidator::new(
        config.signing_secret.clone(),
        config.body_read_timeout(),
    )
    .with_max_age(config.signature_max_age);

    let state = AppState::new(
        validator,
        Arc::new(publisher.clone()),
        config.publish_timeout(),
    );

    let app = router(state, &config.proxy_path);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!(address = %addr, "proxy_listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    publisher.close().await;

    info!("proxy_shutdown_complete");

    Ok(())
}

/// Create a future that completes when a shutdown signal is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "ctrl_c_handler_failed");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "sigterm_handler_failed");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }

    info!("proxy_shutting_down");
}
