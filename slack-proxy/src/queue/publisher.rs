//! Async RabbitMQ publisher for verified Slack payloads.
//!
//! The handler only depends on [`MessagePublisher`]; [`AmqpPublisher`] is the
//! production implementation. It keeps one connection and one channel in
//! publisher-confirm mode and re-establishes them on the next publish if the
//! broker drops them.

use std::sync::Arc;

use async_trait::async_trait;
use lapin::{
    options::{BasicPublishOptions, ConfirmSelectOptions, QueueDeclareOptions},
    types::{AMQPValue, FieldTable},
    BasicProperties, Channel, Connection, ConnectionProperties,
};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{info, warn};

use super::types::{OutboundMessage, SLACK_TIMESTAMP_PROPERTY};

/// Errors returned while talking to the broker.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("failed to connect to RabbitMQ: {0}")]
    Connect(#[source] lapin::Error),

    #[error("failed to open channel: {0}")]
    Channel(#[source] lapin::Error),

    #[error("queue `{queue}` is not available: {source}")]
    QueueUnavailable {
        queue: String,
        #[source]
        source: lapin::Error,
    },

    #[error("failed to publish message: {0}")]
    Publish(#[source] lapin::Error),

    #[error("broker did not acknowledge message {0}")]
    Nacked(String),
}

/// Destination for verified payloads.
///
/// `publish` resolves once the broker has acknowledged the message. It does
/// not retry.
#[async_trait]
pub trait MessagePublisher: Send + Sync {
    async fn publish(&self, message: OutboundMessage) -> Result<(), PublishError>;
}

/// RabbitMQ publisher with connection management.
#[derive(Clone)]
pub struct AmqpPublisher {
    inner: Arc<PublisherInner>,
}

struct PublisherInner {
    url: String,
    queue: String,
    connection: RwLock<Option<Connection>>,
    channel: RwLock<Option<Channel>>,
}

impl AmqpPublisher {
    /// Create a publisher without connecting.
    pub fn new(url: String, queue: String) -> Self {
        Self {
            inner: Arc::new(PublisherInner {
                url,
                queue,
                connection: RwLock::new(None),
                channel: RwLock::new(None),
            }),
        }
    }

    /// Create a publisher and confirm the destination queue exists.
    ///
    /// The queue is declared passively, so a missing queue is an error
    /// rather than being created on the fly.
    pub async fn connect(url: String, queue: String) -> Result<Self, PublishError> {
        let publisher = Self::new(url, queue);
        publisher.ensure_connected().await?;
        Ok(publisher)
    }

    pub fn queue(&self) -> &str {
        &self.inner.queue
    }

    /// Ensure we have a valid connection and channel.
    async fn ensure_connected(&self) -> Result<Channel, PublishError> {
        {
            let channel = self.inner.channel.read().await;
            if let Some(ch) = channel.as_ref() {
                if ch.status().connected() {
                    return Ok(ch.clone());
                }
            }
        }

        let mut connection = self.inner.connection.write().await;
        let mut channel = self.inner.channel.write().await;

        // Double-check after acquiring write lock
        if let Some(ch) = channel.as_ref() {
            if ch.status().connected() {
                return Ok(ch.clone());
            }
        }

        info!("amqp_publisher_connecting");

        let conn = Connection::connect(&self.inner.url, ConnectionProperties::default())
            .await
            .map_err(PublishError::Connect)?;

        let ch = conn.create_channel().await.map_err(PublishError::Channel)?;

        ch.confirm_select(ConfirmSelectOptions::default())
            .await
            .map_err(PublishError::Channel)?;

        ch.queue_declare(
            &self.inner.queue,
            QueueDeclareOptions {
                passive: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await
        .map_err(|source| PublishError::QueueUnavailable {
            queue: self.inner.queue.clone(),
            source,
        })?;

        info!(queue = %self.inner.queue, "amqp_publisher_connected");

        *connection = Some(conn);
        *channel = Some(ch.clone());

        Ok(ch)
    }

    /// Close the connection gracefully.
    pub async fn close(&self) {
        let mut connection = self.inner.connection.write().await;
        let mut channel = self.inner.channel.write().await;

        if let Some(ch) = channel.take() {
            if let Err(e) = ch.close(200, "Normal shutdown").await {
                warn!(error = %e, "amqp_channel_close_error");
            }
        }

        if let Some(conn) = connection.take() {
            if let Err(e) = conn.close(200, "Normal shutdown").await {
                warn!(error = %e, "amqp_connection_close_error");
            }
        }

        info!("amqp_publisher_closed");
    }
}

#[async_trait]
impl MessagePublisher for AmqpPublisher {
    async fn publish(&self, message: OutboundMessage) -> Result<(), PublishError> {
        let channel = self.ensure_connected().await?;

        let mut properties = BasicProperties::default()
            .with_delivery_mode(2) // Persistent
            .with_content_type(message.content_type.into())
            .with_message_id(message.message_id.clone().into());

        if let Some(timestamp) = &message.slack_timestamp {
            let mut headers = FieldTable::default();
            headers.insert(
                SLACK_TIMESTAMP_PROPERTY.into(),
                AMQPValue::LongString(timestamp.as_str().into()),
            );
            properties = properties.with_headers(headers);
        }

        // Published straight to the queue through the default exchange, one
        // message per call; the broker ack is awaited before returning.
        let confirmation = channel
            .basic_publish(
                "",
                &self.inner.queue,
                BasicPublishOptions::default(),
                &message.payload,
                properties,
            )
            .await
            .map_err(PublishError::Publish)?
            .await
            .map_err(PublishError::Publish)?;

        if confirmation.is_nack() {
            return Err(PublishError::Nacked(message.message_id));
        }

        info!(
            queue = %self.inner.queue,
            message_id = %message.message_id,
            body_length = message.payload.len(),
            "amqp_message_published"
        );

        Ok(())
    }
}
