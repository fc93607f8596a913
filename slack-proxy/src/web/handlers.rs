//! Webhook endpoint handlers.
//!
//! The proxy handler is designed to be extremely fast - it only:
//! 1. Validates the request and its Slack signature
//! 2. Publishes the raw body to RabbitMQ
//! 3. Returns a bare status code
//!
//! All parsing and processing happens downstream of the queue.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::queue::{MessagePublisher, OutboundMessage};
use crate::web::validate::{
    RequestValidator, ValidationOutcome, MAX_BODY_SIZE, SLACK_TIMESTAMP_HEADER,
};

/// Shared application state.
///
/// Nothing in here is mutated by request handling.
#[derive(Clone)]
pub struct AppState {
    pub validator: RequestValidator,
    pub publisher: Arc<dyn MessagePublisher>,
    pub publish_timeout: Duration,
}

impl AppState {
    pub fn new(
        validator: RequestValidator,
        publisher: Arc<dyn MessagePublisher>,
        publish_timeout: Duration,
    ) -> Self {
        Self {
            validator,
            publisher,
            publish_timeout,
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
// Slack Proxy
// =============================================================================

/// Slack proxy endpoint.
///
/// Mounted for every method so the method check happens in the validator.
/// Responses never carry a body.
pub async fn slack_proxy(State(state): State<AppState>, mut request: Request) -> Response {
    if let ValidationOutcome::Rejected(rejection) = state.validator.validate(&mut request).await {
        warn!(
            status = rejection.status_code().as_u16(),
            reason = rejection.as_str(),
            "slack_request_rejected"
        );
        return rejection.into_response();
    }

    let slack_timestamp = request
        .headers()
        .get(SLACK_TIMESTAMP_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    // The validator put the body back; this reads the same buffer.
    let body = match axum::body::to_bytes(request.into_body(), MAX_BODY_SIZE as usize).await {
        Ok(body) => body,
        Err(e) => {
            error!(error = %e, "slack_body_reread_failed");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let message = OutboundMessage::new(body).with_slack_timestamp(slack_timestamp);
    let message_id = message.message_id.clone();
    let body_length = message.payload.len();

    let publish = state.publisher.publish(message);

    let status = match tokio::time::timeout(state.publish_timeout, publish).await {
        Ok(Ok(())) => {
            info!(
                message_id = %message_id,
                body_length = body_length,
                "slack_request_forwarded"
            );
            StatusCode::OK
        }
        Ok(Err(e)) => {
            error!(message_id = %message_id, error = %e, "slack_publish_failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
        Err(_) => {
            error!(
                message_id = %message_id,
                timeout_ms = state.publish_timeout.as_millis() as u64,
                "slack_publish_timeout"
            );
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    status.into_response()
}
