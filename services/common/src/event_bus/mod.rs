//! Publish/subscribe event bus for the feed-ingestion pipeline.
//!
//! Two event kinds flow through this bus: an accepted order and a
//! rejected order. Everything here is generic over `BusMessage`
//! because the repository layer, not the bus, owns the concrete
//! payload shapes.

pub mod bus;
pub mod message;
pub mod metrics;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use tokio::sync::broadcast;
use tracing::{debug, error};

pub use bus::{EventBus, EventBusConfig};
pub use message::{Message, MessageEnvelope, MessageType};
pub use metrics::{BusMetrics, EventBusMetrics};

/// Core message trait for all event bus messages
pub trait BusMessage: Send + Sync + Clone + Debug + 'static {
    /// Get the message topic for routing
    fn topic(&self) -> &str;

    /// Get message priority (0 = highest, 255 = lowest)
    fn priority(&self) -> u8 {
        128 // Default priority
    }

    /// Get message metadata
    fn metadata(&self) -> MessageMetadata {
        MessageMetadata::default()
    }
}

/// Message metadata for enhanced routing and processing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageMetadata {
    /// Message ID
    pub message_id: String,
    /// Source service
    pub source: String,
    /// Target service (optional)
    pub target: Option<String>,
    /// Correlation ID for request tracing
    pub correlation_id: Option<String>,
    /// Message timestamp (nanoseconds)
    pub timestamp: u64,
    /// Message TTL in milliseconds
    pub ttl_ms: Option<u64>,
    /// Retry count
    pub retry_count: u32,
    /// Custom headers
    pub headers: rustc_hash::FxHashMap<String, String>,
}

impl Default for MessageMetadata {
    fn default() -> Self {
        Self {
            message_id: uuid::Uuid::new_v4().to_string(),
            source: "unknown".to_string(),
            target: None,
            correlation_id: None,
            timestamp: std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                // SAFETY: u128 to u64 - nanoseconds since epoch fits in u64 for centuries
                .as_nanos() as u64,
            ttl_ms: None,
            retry_count: 0,
            headers: rustc_hash::FxHashMap::default(),
        }
    }
}

/// Publisher trait for sending messages
#[async_trait]
pub trait Publisher<T: BusMessage>: Send + Sync {
    /// Publish a message to the bus
    async fn publish(&self, message: T) -> Result<()>;

    /// Publish a message with custom metadata
    async fn publish_with_metadata(&self, message: T, metadata: MessageMetadata) -> Result<()>;
}

/// Subscriber trait for receiving messages
#[async_trait]
pub trait Subscriber<T: BusMessage>: Send + Sync {
    /// Subscribe to messages
    async fn subscribe(&self) -> Result<broadcast::Receiver<MessageEnvelope<T>>>;
}

/// Message handler trait for processing messages
#[async_trait]
pub trait MessageHandler<T: BusMessage>: Send + Sync {
    /// Handle a message
    async fn handle(&self, envelope: MessageEnvelope<T>) -> Result<()>;

    /// Get handler name for debugging
    fn name(&self) -> &str;
}

/// Error types for event bus operations
#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
    #[error("Bus capacity exceeded")]
    CapacityExceeded,

    #[error("Message TTL expired")]
    MessageExpired,

    #[error("No subscribers for topic: {topic}")]
    NoSubscribers { topic: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Channel error: {0}")]
    Channel(String),

    #[error("Handler error: {source}")]
    Handler { source: anyhow::Error },
}

/// Result type for event bus operations
pub type BusResult<T> = std::result::Result<T, EventBusError>;

/// Event bus middleware trait for cross-cutting concerns
#[async_trait]
pub trait EventBusMiddleware<T: BusMessage>: Send + Sync {
    /// Process message before publishing
    async fn before_publish(&self, envelope: &mut MessageEnvelope<T>) -> Result<()>;

    /// Process message after successful publish
    async fn after_publish(&self, envelope: &MessageEnvelope<T>) -> Result<()>;

    /// Process message before handling
    async fn before_handle(&self, envelope: &MessageEnvelope<T>) -> Result<()>;

    /// Process message after handling
    async fn after_handle(&self, envelope: &MessageEnvelope<T>, result: &Result<()>) -> Result<()>;
}

/// Logging middleware for debugging
pub struct LoggingMiddleware {
    service_name: String,
}

impl LoggingMiddleware {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
        }
    }
}

#[async_trait]
impl<T: BusMessage> EventBusMiddleware<T> for LoggingMiddleware {
    async fn before_publish(&self, envelope: &mut MessageEnvelope<T>) -> Result<()> {
        debug!(
            service = %self.service_name,
            message_id = %envelope.metadata.message_id,
            topic = envelope.message.topic(),
            "Publishing message"
        );
        Ok(())
    }

    async fn after_publish(&self, envelope: &MessageEnvelope<T>) -> Result<()> {
        debug!(
            service = %self.service_name,
            message_id = %envelope.metadata.message_id,
            "Message published successfully"
        );
        Ok(())
    }

    async fn before_handle(&self, envelope: &MessageEnvelope<T>) -> Result<()> {
        debug!(
            service = %self.service_name,
            message_id = %envelope.metadata.message_id,
            topic = envelope.message.topic(),
            "Handling message"
        );
        Ok(())
    }

    async fn after_handle(&self, envelope: &MessageEnvelope<T>, result: &Result<()>) -> Result<()> {
        match result {
            Ok(()) => debug!(
                service = %self.service_name,
                message_id = %envelope.metadata.message_id,
                "Message handled successfully"
            ),
            Err(e) => error!(
                service = %self.service_name,
                message_id = %envelope.metadata.message_id,
                error = %e,
                "Message handling failed"
            ),
        }
        Ok(())
    }
}

/// Metrics middleware for performance monitoring
pub struct MetricsMiddleware {
    metrics: std::sync::Arc<BusMetrics>,
}

impl MetricsMiddleware {
    pub const fn new(metrics: std::sync::Arc<BusMetrics>) -> Self {
        Self { metrics }
    }
}

#[async_trait]
impl<T: BusMessage> EventBusMiddleware<T> for MetricsMiddleware {
    async fn before_publish(&self, envelope: &mut MessageEnvelope<T>) -> Result<()> {
        self.metrics
            .record_publish_attempt(envelope.message.topic());
        Ok(())
    }

    async fn after_publish(&self, envelope: &MessageEnvelope<T>) -> Result<()> {
        self.metrics
            .record_publish_success(envelope.message.topic());
        Ok(())
    }

    async fn before_handle(&self, envelope: &MessageEnvelope<T>) -> Result<()> {
        self.metrics.record_handle_attempt(envelope.message.topic());
        Ok(())
    }

    async fn after_handle(&self, envelope: &MessageEnvelope<T>, result: &Result<()>) -> Result<()> {
        match result {
            Ok(()) => self.metrics.record_handle_success(envelope.message.topic()),
            Err(error) => {
                tracing::warn!("Message handling failed: {}", error);
                self.metrics.record_handle_failure(envelope.message.topic());
            }
        }
        Ok(())
    }
}
