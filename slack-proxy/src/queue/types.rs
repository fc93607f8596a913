//! Outbound message envelope.
//!
//! The proxy never parses what Slack sends; the payload is carried as the
//! exact bytes received and the envelope only adds tracking metadata.

use axum::body::Bytes;
use uuid::Uuid;

/// Content type stamped on every outbound message.
pub const PAYLOAD_CONTENT_TYPE: &str = "application/json";

/// AMQP header carrying the Slack request timestamp.
pub const SLACK_TIMESTAMP_PROPERTY: &str = "slack_request_timestamp";

/// A verified Slack payload ready for the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    /// Unique message identifier (UUID v4)
    pub message_id: String,
    /// Content type of the payload
    pub content_type: &'static str,
    /// `X-Slack-Request-Timestamp` of the originating request
    pub slack_timestamp: Option<String>,
    /// Raw request body, byte for byte
    pub payload: Bytes,
}

impl OutboundMessage {
    /// Wrap a payload with a fresh message id.
    pub fn new(payload: Bytes) -> Self {
        Self {
            message_id: Uuid::new_v4().to_string(),
            content_type: PAYLOAD_CONTENT_TYPE,
            slack_timestamp: None,
            payload,
        }
    }

    pub fn with_slack_timestamp(mut self, timestamp: Option<String>) -> Self {
        self.slack_timestamp = timestamp;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outbound_message_keeps_payload_bytes() {
        let raw = Bytes::from_static(b"{\"type\": \"url_verification\" }\n");
        let message = OutboundMessage::new(raw.clone());

        assert_eq!(message.payload, raw);
        assert_eq!(message.content_type, "application/json");
        assert!(message.slack_timestamp.is_none());
    }

    #[test]
    fn test_outbound_message_ids_are_unique() {
        let a = OutboundMessage::new(Bytes::from_static(b"{}"));
        let b = OutboundMessage::new(Bytes::from_static(b"{}"));

        assert_ne!(a.message_id, b.message_id);
        assert!(Uuid::parse_str(&a.message_id).is_ok());
    }

    #[test]
    fn test_outbound_message_timestamp() {
        let message = OutboundMessage::new(Bytes::from_static(b"{}"))
            .with_slack_timestamp(Some("1700000000".to_string()));

        assert_eq!(message.slack_timestamp.as_deref(), Some("1700000000"));
    }
}
