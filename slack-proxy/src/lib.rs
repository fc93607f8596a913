//! slack-proxy - Authenticating Slack webhook gateway.
//!
//! Receives Slack webhook calls, verifies the Slack request signature and
//! publishes the untouched body to a RabbitMQ queue for downstream workers.
//!
//! ## Architecture
//!
//! ```text
//! Slack → slack-proxy (validate → publish) → PUBLISH_QUEUE → consumers
//! ```

pub mod config;
pub mod queue;
pub mod web;

// Re-export commonly used types
pub use config::{Config, ConfigError};
pub use queue::{AmqpPublisher, MessagePublisher, OutboundMessage, PublishError};
pub use web::{router, AppState, RequestValidator, SigningSecret};
