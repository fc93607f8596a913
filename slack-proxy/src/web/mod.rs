//! Web server module for handling inbound Slack webhooks.
//!
//! This module provides a thin, fast web server that:
//! - Receives Slack event and interaction webhooks
//! - Verifies the Slack request signature
//! - Immediately publishes the raw payload to RabbitMQ
//! - Returns a bare status code
//!
//! All parsing and processing happens downstream of the queue.

pub mod handlers;
pub mod signature;
pub mod validate;

use axum::{
    routing::{any, get},
    Router,
};
use tower_http::trace::TraceLayer;

pub use handlers::{health, slack_proxy, AppState, HealthResponse};
pub use signature::{
    expected_signature, is_timestamp_fresh, verify_slack_signature, SigningSecret,
};
pub use validate::{
    Rejection, RequestValidator, ValidationOutcome, MAX_BODY_SIZE, SLACK_SIGNATURE_HEADER,
    SLACK_TIMESTAMP_HEADER,
};

/// Build the router: the proxy on `proxy_path` plus `GET /health`.
pub fn router(state: AppState, proxy_path: &str) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(proxy_path, any(slack_proxy))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
