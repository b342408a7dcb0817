//! # Courier Messaging
//!
//! Queue consumption for the courier worker.
//!
//! The worker talks to the broker through three small traits:
//!
//! - [`MessageBroker`] opens a connection and returns a [`BrokerChannel`]
//! - [`BrokerChannel`] declares the queue, sets prefetch and starts consuming
//! - [`Acknowledger`] settles deliveries from whichever task finished them
//!
//! ## Features
//!
//! - `rabbitmq` - RabbitMQ/AMQP support via lapin
//!
//! [`memory::InMemoryBroker`] is always available for tests.
//!
//! ## Example
//!
//! ```rust,ignore
//! use courier_messaging::{MessageBroker, QueueConfig, RabbitMqConfig};
//! use courier_messaging::rabbitmq::RabbitMqBroker;
//! use futures_util::StreamExt;
//!
//! let broker = RabbitMqBroker::new(RabbitMqConfig::new("localhost", 5672));
//! let channel = broker.connect().await?;
//! channel.declare_queue(&QueueConfig::durable("emails")).await?;
//! channel.set_prefetch(1).await?;
//!
//! let acker = channel.acknowledger();
//! let mut deliveries = channel.consume("emails", "worker-1").await?;
//! while let Some(delivery) = deliveries.next().await {
//!     let delivery = delivery?;
//!     acker.ack(delivery.delivery_tag).await?;
//! }
//! ```

pub mod config;
pub mod error;
pub mod memory;
pub mod message;
pub mod traits;

#[cfg(feature = "rabbitmq")]
pub mod rabbitmq;

pub use config::{QueueConfig, RabbitMqConfig};
pub use error::MessagingError;
pub use message::Delivery;
pub use traits::{Acknowledger, BrokerChannel, DeliveryStream, MessageBroker};

/// Prelude for common imports
pub mod prelude {
    pub use crate::{
        Acknowledger, BrokerChannel, Delivery, DeliveryStream, MessageBroker, MessagingError,
        QueueConfig, RabbitMqConfig,
    };
}
