//! In-memory broker for tests.
//!
//! Messages published before anyone consumes are queued and handed to the
//! next consumer. Acks and nacks are recorded rather than acted on: a nack
//! with requeue does not redeliver.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::{Notify, mpsc};
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::{
    Acknowledger, BrokerChannel, Delivery, DeliveryStream, MessageBroker, MessagingError,
    QueueConfig,
};

/// What the broker has observed so far.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BrokerRecord {
    /// Connection attempts, successful or not
    pub connect_attempts: usize,
    /// Successful connections
    pub connects: usize,
    pub declared: Vec<QueueConfig>,
    pub prefetch: Option<u16>,
    pub acks: Vec<u64>,
    /// `(delivery_tag, requeue)`
    pub nacks: Vec<(u64, bool)>,
}

impl BrokerRecord {
    /// Deliveries settled either way.
    pub fn settled(&self) -> usize {
        self.acks.len() + self.nacks.len()
    }
}

#[derive(Default)]
struct State {
    record: BrokerRecord,
    pending: VecDeque<Delivery>,
    consumer: Option<mpsc::UnboundedSender<Result<Delivery, MessagingError>>>,
    next_tag: u64,
    failing_connects: usize,
}

#[derive(Default)]
struct Shared {
    state: Mutex<State>,
    changed: Notify,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        // A panic while holding the lock only happens in a failing test.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Broker double that keeps everything in process memory.
#[derive(Clone, Default)]
pub struct InMemoryBroker {
    shared: Arc<Shared>,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a message body and return its delivery tag.
    pub fn publish(&self, body: impl Into<Vec<u8>>) -> u64 {
        let mut state = self.shared.lock();
        state.next_tag += 1;
        let delivery = Delivery::new(state.next_tag, body);
        let tag = delivery.delivery_tag;

        let undelivered = match state.consumer.as_ref() {
            Some(consumer) => consumer.send(Ok(delivery)).err().and_then(|e| e.0.ok()),
            None => Some(delivery),
        };
        if let Some(delivery) = undelivered {
            state.consumer = None;
            state.pending.push_back(delivery);
        }
        tag
    }

    /// Fail the next `count` connection attempts.
    pub fn fail_next_connects(&self, count: usize) {
        self.shared.lock().failing_connects = count;
    }

    /// Break the current consumer's stream with a connection error.
    pub fn disconnect(&self) {
        if let Some(consumer) = self.shared.lock().consumer.take() {
            let _ = consumer.send(Err(MessagingError::ChannelClosed(
                "connection reset by broker".to_string(),
            )));
        }
    }

    /// Snapshot of everything recorded so far.
    pub fn record(&self) -> BrokerRecord {
        self.shared.lock().record.clone()
    }

    /// Wait until `condition` holds for the record.
    pub async fn wait_until(&self, condition: impl Fn(&BrokerRecord) -> bool) -> BrokerRecord {
        loop {
            let changed = self.shared.changed.notified();
            {
                let state = self.shared.lock();
                if condition(&state.record) {
                    return state.record.clone();
                }
            }
            changed.await;
        }
    }

    fn update(&self, f: impl FnOnce(&mut State)) {
        f(&mut self.shared.lock());
        self.shared.changed.notify_waiters();
    }
}

#[async_trait]
impl MessageBroker for InMemoryBroker {
    async fn connect(&self) -> Result<Box<dyn BrokerChannel>, MessagingError> {
        let mut refused = false;
        self.update(|state| {
            state.record.connect_attempts += 1;
            if state.failing_connects > 0 {
                state.failing_connects -= 1;
                refused = true;
            } else {
                state.record.connects += 1;
            }
        });

        if refused {
            return Err(MessagingError::Connection("connection refused".to_string()));
        }
        Ok(Box::new(InMemoryChannel {
            broker: self.clone(),
        }))
    }
}

struct InMemoryChannel {
    broker: InMemoryBroker,
}

#[async_trait]
impl BrokerChannel for InMemoryChannel {
    async fn declare_queue(&self, config: &QueueConfig) -> Result<(), MessagingError> {
        let config = config.clone();
        self.broker.update(|state| state.record.declared.push(config));
        Ok(())
    }

    async fn set_prefetch(&self, count: u16) -> Result<(), MessagingError> {
        self.broker.update(|state| state.record.prefetch = Some(count));
        Ok(())
    }

    async fn consume(&self, _queue: &str, _consumer_tag: &str) -> Result<DeliveryStream, MessagingError> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.broker.update(|state| {
            for delivery in state.pending.drain(..) {
                let _ = tx.send(Ok(delivery));
            }
            state.consumer = Some(tx);
        });
        Ok(Box::pin(UnboundedReceiverStream::new(rx)))
    }

    fn acknowledger(&self) -> Arc<dyn Acknowledger> {
        Arc::new(self.broker.clone())
    }

    async fn close(&self) -> Result<(), MessagingError> {
        Ok(())
    }
}

#[async_trait]
impl Acknowledger for InMemoryBroker {
    async fn ack(&self, delivery_tag: u64) -> Result<(), MessagingError> {
        self.update(|state| state.record.acks.push(delivery_tag));
        Ok(())
    }

    async fn nack(&self, delivery_tag: u64, requeue: bool) -> Result<(), MessagingError> {
        self.update(|state| state.record.nacks.push((delivery_tag, requeue)));
        Ok(())
    }
}
