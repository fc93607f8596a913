//! Queue module for RabbitMQ operations.
//!
//! This module provides:
//! - The outbound message envelope
//! - The publisher seam used by the web handler, and its AMQP implementation
//!
//! ## Architecture
//!
//! ```text
//! Slack → slack-proxy → PUBLISH_QUEUE → downstream consumers
//! ```

pub mod publisher;
pub mod types;

pub use publisher::{AmqpPublisher, MessagePublisher, PublishError};
pub use types::{OutboundMessage, PAYLOAD_CONTENT_TYPE, SLACK_TIMESTAMP_PROPERTY};
