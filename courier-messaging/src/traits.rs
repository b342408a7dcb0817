//! Traits for message broker implementations.

use crate::config::QueueConfig;
use crate::error::MessagingError;
use crate::message::Delivery;
use async_trait::async_trait;
use futures_util::Stream;
use std::pin::Pin;
use std::sync::Arc;

/// A stream of deliveries. An `Err` item or the end of the stream means the
/// channel is gone and a new connection is needed.
pub type DeliveryStream = Pin<Box<dyn Stream<Item = Result<Delivery, MessagingError>> + Send>>;

/// Opens connections to a broker.
#[async_trait]
pub trait MessageBroker: Send + Sync {
    /// Open a connection and a channel on it.
    async fn connect(&self) -> Result<Box<dyn BrokerChannel>, MessagingError>;
}

/// A channel on an open broker connection.
#[async_trait]
pub trait BrokerChannel: Send + Sync {
    /// Declare a queue.
    async fn declare_queue(&self, config: &QueueConfig) -> Result<(), MessagingError>;

    /// Limit unacknowledged deliveries to `count`.
    async fn set_prefetch(&self, count: u16) -> Result<(), MessagingError>;

    /// Start consuming a queue with manual acknowledgement.
    async fn consume(&self, queue: &str, consumer_tag: &str) -> Result<DeliveryStream, MessagingError>;

    /// Handle for settling deliveries from other tasks.
    fn acknowledger(&self) -> Arc<dyn Acknowledger>;

    /// Close the channel and its connection.
    async fn close(&self) -> Result<(), MessagingError>;
}

/// Settles deliveries on the channel they arrived on.
#[async_trait]
pub trait Acknowledger: Send + Sync {
    /// Positive acknowledgement.
    async fn ack(&self, delivery_tag: u64) -> Result<(), MessagingError>;

    /// Negative acknowledgement, optionally asking the broker to redeliver.
    async fn nack(&self, delivery_tag: u64, requeue: bool) -> Result<(), MessagingError>;
}
