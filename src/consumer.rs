//! The consume loop and its connection state machine.
//!
//! ```text
//! Disconnected -> Connecting -> Consuming
//!       ^                           |
//!       +------ broker error -------+   (wait reconnect_delay, retry)
//! ```
//!
//! Only a failure of the very first connection attempt ends the loop.

use futures_util::StreamExt;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use courier_messaging::{BrokerChannel, DeliveryStream, MessageBroker, MessagingError, QueueConfig};

use crate::dispatch::Dispatcher;
use crate::error::ConsumerError;
use crate::status::StatusBoard;

/// Where the consumer is in its connection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerState {
    Disconnected,
    Connecting,
    Consuming,
}

/// Unacknowledged deliveries the broker may hand this consumer at once.
pub const PREFETCH: u16 = 1;

/// Consumer configuration.
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    /// Queue to declare and consume
    pub queue: QueueConfig,
    pub consumer_tag: String,
    /// Pause before reconnecting after a broker error
    pub reconnect_delay: Duration,
    /// How often the status board is refreshed while idle
    pub status_interval: Duration,
}

impl ConsumerConfig {
    pub fn new(queue: impl Into<String>) -> Self {
        Self {
            queue: QueueConfig::durable(queue),
            consumer_tag: format!("courier-worker-{}", std::process::id()),
            reconnect_delay: Duration::from_secs(5),
            status_interval: Duration::from_secs(1),
        }
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn with_status_interval(mut self, interval: Duration) -> Self {
        self.status_interval = interval;
        self
    }
}

/// Consumes email jobs from the broker for as long as the process lives.
pub struct EmailConsumer {
    broker: Arc<dyn MessageBroker>,
    dispatcher: Dispatcher,
    config: ConsumerConfig,
    status: StatusBoard,
    state: watch::Sender<ConsumerState>,
}

impl EmailConsumer {
    pub fn new(broker: Arc<dyn MessageBroker>, dispatcher: Dispatcher, config: ConsumerConfig) -> Self {
        let (state, _) = watch::channel(ConsumerState::Disconnected);
        Self {
            status: StatusBoard::new(config.queue.name.clone()),
            broker,
            dispatcher,
            config,
            state,
        }
    }

    /// Replace the default status board.
    pub fn with_status_board(mut self, status: StatusBoard) -> Self {
        self.status = status;
        self
    }

    /// Watch the connection state.
    pub fn state(&self) -> watch::Receiver<ConsumerState> {
        self.state.subscribe()
    }

    fn set_state(&self, state: ConsumerState) {
        self.state.send_replace(state);
        debug!(state = ?state, "Consumer state changed");
    }

    /// Run the consume loop.
    ///
    /// Broker errors after the first successful connection are logged and
    /// retried after `reconnect_delay`, forever. The only way out is an
    /// initial connection failure.
    pub async fn run(&mut self) -> Result<Infallible, ConsumerError> {
        let mut connected_once = false;

        loop {
            self.set_state(ConsumerState::Connecting);

            let broken = match self.broker.connect().await {
                Ok(channel) => {
                    connected_once = true;
                    let broken = self.session(channel.as_ref()).await;
                    if let Err(e) = channel.close().await {
                        debug!(error = %e, "Error closing broken channel");
                    }
                    broken
                }
                Err(e) if !connected_once => {
                    self.set_state(ConsumerState::Disconnected);
                    error!(queue = %self.config.queue.name, error = %e, "Cannot connect to broker");
                    self.status.broker_error(&e);
                    return Err(ConsumerError::FatalConnect(e));
                }
                Err(e) => e,
            };

            self.set_state(ConsumerState::Disconnected);
            error!(
                queue = %self.config.queue.name,
                error = %broken,
                connection_lost = broken.is_connection_error(),
                retry_in = ?self.config.reconnect_delay,
                "Broker connection lost"
            );
            self.status.broker_error(&broken);
            tokio::time::sleep(self.config.reconnect_delay).await;
        }
    }

    async fn subscribe(&self, channel: &dyn BrokerChannel) -> Result<DeliveryStream, MessagingError> {
        channel.declare_queue(&self.config.queue).await?;
        channel.set_prefetch(PREFETCH).await?;
        channel
            .consume(&self.config.queue.name, &self.config.consumer_tag)
            .await
    }

    /// Consume until the channel breaks; returns what broke it.
    async fn session(&mut self, channel: &dyn BrokerChannel) -> MessagingError {
        let mut deliveries = match self.subscribe(channel).await {
            Ok(deliveries) => deliveries,
            Err(e) => return e,
        };
        let acker = channel.acknowledger();

        self.set_state(ConsumerState::Consuming);
        info!(
            queue = %self.config.queue.name,
            prefetch = PREFETCH,
            "Waiting for messages"
        );

        let mut ticker = tokio::time::interval(self.config.status_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                next = deliveries.next() => match next {
                    Some(Ok(delivery)) => {
                        let _ = self.dispatcher.dispatch(delivery, acker.clone()).await;
                        self.status.refresh(self.dispatcher.stats().snapshot());
                    }
                    Some(Err(e)) => return e,
                    None => return MessagingError::ChannelClosed("consumer stream ended".to_string()),
                },
                _ = ticker.tick() => {
                    self.status.refresh(self.dispatcher.stats().snapshot());
                }
            }
        }
    }
}
