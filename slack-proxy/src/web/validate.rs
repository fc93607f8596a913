//! Request validation for inbound Slack calls.
//!
//! Checks run in a fixed order and stop at the first failure:
//!
//! 1. Method is `POST`
//! 2. `Content-Type` is exactly `application/json`
//! 3. Declared `Content-Length` does not exceed [`MAX_BODY_SIZE`]
//! 4. Declared `Content-Length` is present and positive
//! 5. The body is read, restored into the request, and its signature verified
//!
//! The body is only touched by step 5. Whatever is read is put back into the
//! request, whatever the outcome, so the caller can read it again from the
//! start.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use futures::{stream, StreamExt};
use thiserror::Error;
use tracing::debug;

use super::signature::{is_timestamp_fresh, verify_slack_signature, SigningSecret};

/// Largest body accepted (10 MiB).
pub const MAX_BODY_SIZE: u64 = 10 * 1024 * 1024;

/// Header carrying the Unix timestamp Slack signed.
pub const SLACK_TIMESTAMP_HEADER: &str = "x-slack-request-timestamp";

/// Header carrying the `v0=` signature.
pub const SLACK_SIGNATURE_HEADER: &str = "x-slack-signature";

const JSON_CONTENT_TYPE: &[u8] = b"application/json";

/// Reason a request was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("method not allowed")]
    MethodNotAllowed,

    #[error("unsupported media type")]
    UnsupportedMediaType,

    #[error("payload too large")]
    PayloadTooLarge,

    #[error("missing or unreadable body")]
    BadRequest,

    #[error("signature mismatch")]
    Unauthorized,
}

impl Rejection {
    pub fn status_code(self) -> StatusCode {
        match self {
            Rejection::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Rejection::UnsupportedMediaType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Rejection::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Rejection::BadRequest => StatusCode::BAD_REQUEST,
            Rejection::Unauthorized => StatusCode::UNAUTHORIZED,
        }
    }

    /// Short name used in log events.
    pub fn as_str(self) -> &'static str {
        match self {
            Rejection::MethodNotAllowed => "method_not_allowed",
            Rejection::UnsupportedMediaType => "unsupported_media_type",
            Rejection::PayloadTooLarge => "payload_too_large",
            Rejection::BadRequest => "bad_request",
            Rejection::Unauthorized => "unauthorized",
        }
    }
}

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        self.status_code().into_response()
    }
}

/// Result of [`RequestValidator::validate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationOutcome {
    Valid,
    Rejected(Rejection),
}

/// Validates inbound requests against the Slack signing secret.
///
/// Cheap to clone; the secret is shared.
#[derive(Debug, Clone)]
pub struct RequestValidator {
    secret: Arc<SigningSecret>,
    body_read_timeout: Duration,
    max_age_seconds: Option<u64>,
}

impl RequestValidator {
    pub fn new(secret: SigningSecret, body_read_timeout: Duration) -> Self {
        Self {
            secret: Arc::new(secret),
            body_read_timeout,
            max_age_seconds: None,
        }
    }

    /// Reject requests whose timestamp is further than `max_age_seconds`
    /// from the local clock. `None` disables the check.
    pub fn with_max_age(mut self, max_age_seconds: Option<u64>) -> Self {
        self.max_age_seconds = max_age_seconds;
        self
    }

    /// Validate a request.
    ///
    /// On return the request body re-reads exactly as it arrived: checks 1-4
    /// never touch it, and step 5 restores whatever it consumed.
    pub async fn validate(&self, request: &mut Request<Body>) -> ValidationOutcome {
        let content_length = match check_structure(request.method(), request.headers()) {
            Ok(len) => len,
            Err(rejection) => return ValidationOutcome::Rejected(rejection),
        };

        let body = match self.read_and_restore(request, content_length).await {
            Some(body) => body,
            None => return ValidationOutcome::Rejected(Rejection::BadRequest),
        };

        let headers = request.headers();
        let timestamp = header_str(headers, SLACK_TIMESTAMP_HEADER);
        let signature = header_str(headers, SLACK_SIGNATURE_HEADER);

        if !verify_slack_signature(self.secret.as_bytes(), timestamp, &body, signature) {
            return ValidationOutcome::Rejected(Rejection::Unauthorized);
        }

        if let Some(max_age) = self.max_age_seconds {
            let now = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs();

            if !is_timestamp_fresh(timestamp, max_age, now) {
                debug!(max_age_seconds = max_age, "slack_timestamp_stale");
                return ValidationOutcome::Rejected(Rejection::Unauthorized);
            }
        }

        ValidationOutcome::Valid
    }

    /// Read the body and put back everything that was read.
    ///
    /// Reading stops once more than `content_length` bytes have arrived, on
    /// error, or at the read deadline. Whatever was received is restored in
    /// front of any unread remainder, so the request always re-reads the same
    /// bytes. Returns the body only if exactly `content_length` bytes arrived.
    async fn read_and_restore(
        &self,
        request: &mut Request<Body>,
        content_length: usize,
    ) -> Option<Bytes> {
        let mut data = std::mem::take(request.body_mut()).into_data_stream();
        let mut received = Vec::<u8>::with_capacity(content_length);

        // Ok(true) once the stream is exhausted, Ok(false) on overflow.
        let read = tokio::time::timeout(self.body_read_timeout, async {
            while received.len() <= content_length {
                match data.next().await {
                    Some(Ok(chunk)) => received.extend_from_slice(&chunk),
                    Some(Err(e)) => return Err(e),
                    None => return Ok(true),
                }
            }
            Ok(false)
        })
        .await;

        let received = Bytes::from(received);

        *request.body_mut() = if matches!(read, Ok(Ok(true))) {
            Body::from(received.clone())
        } else {
            let head = stream::iter([Ok::<_, axum::Error>(received.clone())]);
            Body::from_stream(head.chain(data))
        };

        match read {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                debug!(error = %e, "slack_body_read_failed");
                return None;
            }
            Err(_) => {
                debug!(
                    timeout_ms = self.body_read_timeout.as_millis() as u64,
                    "slack_body_read_timeout"
                );
                return None;
            }
        }

        if received.len() != content_length {
            debug!(
                declared = content_length,
                received = received.len(),
                "slack_body_length_mismatch"
            );
            return None;
        }

        Some(received)
    }
}

/// Checks 1-4. Returns the declared body length when they pass.
fn check_structure(method: &Method, headers: &HeaderMap) -> Result<usize, Rejection> {
    if method != Method::POST {
        return Err(Rejection::MethodNotAllowed);
    }

    let content_type = headers.get(header::CONTENT_TYPE).map(|v| v.as_bytes());
    if content_type != Some(JSON_CONTENT_TYPE) {
        return Err(Rejection::UnsupportedMediaType);
    }

    // Missing or malformed lengths count as unknown: they pass the size
    // ceiling and fail the positive-length check.
    let declared = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok());

    if let Some(len) = declared {
        if len > MAX_BODY_SIZE {
            return Err(Rejection::PayloadTooLarge);
        }
    }

    match declared {
        Some(len) if len > 0 => usize::try_from(len).map_err(|_| Rejection::BadRequest),
        _ => Err(Rejection::BadRequest),
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
}
