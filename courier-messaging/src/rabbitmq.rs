//! RabbitMQ broker implementation

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::StreamExt;
use lapin::{Channel, Connection, ConnectionProperties, options::*, types::FieldTable};
use tracing::{debug, info, warn};

use crate::{
    Acknowledger, BrokerChannel, Delivery, DeliveryStream, MessageBroker, MessagingError,
    QueueConfig, RabbitMqConfig,
};

/// RabbitMQ message broker
pub struct RabbitMqBroker {
    config: RabbitMqConfig,
}

impl RabbitMqBroker {
    pub fn new(config: RabbitMqConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl MessageBroker for RabbitMqBroker {
    async fn connect(&self) -> Result<Box<dyn BrokerChannel>, MessagingError> {
        let uri = self.config.uri()?;
        info!(uri = %self.config.redacted_uri(), "Connecting to RabbitMQ");

        let connection = Connection::connect(&uri, ConnectionProperties::default())
            .await
            .map_err(|e| MessagingError::Connection(e.to_string()))?;
        let channel = connection
            .create_channel()
            .await
            .map_err(|e| MessagingError::Connection(e.to_string()))?;

        info!("Connected to RabbitMQ successfully");

        Ok(Box::new(RabbitMqChannel {
            connection,
            channel,
        }))
    }
}

/// A lapin channel together with the connection that owns it
pub struct RabbitMqChannel {
    connection: Connection,
    channel: Channel,
}

#[async_trait]
impl BrokerChannel for RabbitMqChannel {
    async fn declare_queue(&self, config: &QueueConfig) -> Result<(), MessagingError> {
        let options = QueueDeclareOptions {
            durable: config.durable,
            exclusive: config.exclusive,
            auto_delete: config.auto_delete,
            ..Default::default()
        };
        self.channel
            .queue_declare(&config.name, options, FieldTable::default())
            .await?;

        debug!(queue = %config.name, durable = config.durable, "Queue declared");
        Ok(())
    }

    async fn set_prefetch(&self, count: u16) -> Result<(), MessagingError> {
        self.channel
            .basic_qos(count, BasicQosOptions::default())
            .await?;
        Ok(())
    }

    async fn consume(&self, queue: &str, consumer_tag: &str) -> Result<DeliveryStream, MessagingError> {
        let consumer = self
            .channel
            .basic_consume(
                queue,
                consumer_tag,
                BasicConsumeOptions {
                    no_ack: false,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;

        info!(queue = queue, consumer_tag = consumer_tag, "Subscribed to queue");

        Ok(Box::pin(consumer.map(|item| {
            item.map(Delivery::from)
                .map_err(|e| MessagingError::ChannelClosed(e.to_string()))
        })))
    }

    fn acknowledger(&self) -> Arc<dyn Acknowledger> {
        Arc::new(RabbitMqAcknowledger {
            channel: self.channel.clone(),
        })
    }

    async fn close(&self) -> Result<(), MessagingError> {
        info!("Closing RabbitMQ connection");

        if let Err(e) = self.channel.close(200, "Normal shutdown").await {
            warn!(error = %e, "Error closing channel");
        }

        self.connection
            .close(200, "Normal shutdown")
            .await
            .map_err(|e| MessagingError::Connection(e.to_string()))
    }
}

/// Acks and nacks on a cloned lapin channel
pub struct RabbitMqAcknowledger {
    channel: Channel,
}

#[async_trait]
impl Acknowledger for RabbitMqAcknowledger {
    async fn ack(&self, delivery_tag: u64) -> Result<(), MessagingError> {
        self.channel
            .basic_ack(delivery_tag, BasicAckOptions::default())
            .await
            .map_err(|e| MessagingError::Acknowledge(e.to_string()))
    }

    async fn nack(&self, delivery_tag: u64, requeue: bool) -> Result<(), MessagingError> {
        self.channel
            .basic_nack(
                delivery_tag,
                BasicNackOptions {
                    requeue,
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| MessagingError::Acknowledge(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore = "requires a RabbitMQ server on localhost:5672"]
    async fn test_connect_declare_consume() {
        let broker = RabbitMqBroker::new(RabbitMqConfig::default());
        let channel = broker.connect().await.unwrap();

        channel
            .declare_queue(&QueueConfig::durable("courier-test"))
            .await
            .unwrap();
        channel.set_prefetch(1).await.unwrap();
        let _stream = channel.consume("courier-test", "courier-test-consumer").await.unwrap();

        channel.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_unreachable_broker_is_connection_error() {
        let broker = RabbitMqBroker::new(RabbitMqConfig::new("127.0.0.1", 1));
        let err = broker.connect().await.err().unwrap();

        assert!(err.is_connection_error(), "unexpected error: {err}");
    }
}
