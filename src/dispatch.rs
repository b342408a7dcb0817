//! Per-message handling: validate, then send in the background and settle.

use courier_mail::{EmailJob, EmailSender, MessageValidator};
use courier_messaging::{Acknowledger, Delivery};
use serde_json::Value;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::stats::WorkerStats;

/// What happened to a delivery when it was dispatched.
#[derive(Debug)]
pub enum Dispatch {
    /// Invalid message, already nacked without requeue.
    Rejected(String),
    /// Send task started. Resolves to `true` when the email went out and the
    /// message was acked.
    Spawned(JoinHandle<bool>),
}

/// Turns deliveries into send tasks.
///
/// Invalid messages are discarded for good (nack, no requeue). Valid ones
/// are sent on a separate task; the message is acked when the email goes out
/// and nacked with requeue otherwise, so transient failures are retried by
/// the broker.
#[derive(Clone)]
pub struct Dispatcher {
    validator: MessageValidator,
    sender: Arc<dyn EmailSender>,
    stats: Arc<WorkerStats>,
}

impl Dispatcher {
    pub fn new(sender: Arc<dyn EmailSender>, stats: Arc<WorkerStats>) -> Self {
        Self {
            validator: MessageValidator::new(),
            sender,
            stats,
        }
    }

    pub fn stats(&self) -> &Arc<WorkerStats> {
        &self.stats
    }

    /// Validate `delivery` and either reject it or start its send task.
    ///
    /// Only the rejection nack is awaited here; the send runs detached.
    pub async fn dispatch(&self, delivery: Delivery, acker: Arc<dyn Acknowledger>) -> Dispatch {
        let tag = delivery.delivery_tag;

        // Undecodable bodies are validated as empty.
        let raw: Value = serde_json::from_slice(&delivery.body).unwrap_or(Value::Null);

        let verdict = self.validator.validate(&raw);
        let job = if verdict.valid {
            EmailJob::from_value(&raw).map_err(|e| e.to_string())
        } else {
            Err(verdict.reason)
        };

        let job = match job {
            Ok(job) => job,
            Err(reason) => {
                self.stats.record_failure();
                warn!(delivery_tag = tag, reason = %reason, "Message rejected");
                if let Err(e) = acker.nack(tag, false).await {
                    error!(delivery_tag = tag, error = %e, "Failed to reject message");
                }
                return Dispatch::Rejected(reason);
            }
        };

        info!(
            delivery_tag = tag,
            redelivered = delivery.redelivered,
            "Received: {}",
            job.summary()
        );
        self.stats.record_consumed();

        let sender = self.sender.clone();
        let stats = self.stats.clone();
        Dispatch::Spawned(tokio::spawn(send_and_settle(tag, job, sender, stats, acker)))
    }
}

async fn send_and_settle(
    tag: u64,
    job: EmailJob,
    sender: Arc<dyn EmailSender>,
    stats: Arc<WorkerStats>,
    acker: Arc<dyn Acknowledger>,
) -> bool {
    // A panic inside the send must still settle the message.
    let send = tokio::spawn(async move { sender.send_email(&job).await });

    let sent = match send.await {
        Ok(outcome) if outcome.sent => true,
        Ok(outcome) => {
            warn!(delivery_tag = tag, message = %outcome.message, "Email not sent, requeueing");
            false
        }
        Err(e) => {
            error!(delivery_tag = tag, error = %e, "Send task failed, requeueing");
            false
        }
    };

    let settled = if sent {
        stats.record_success();
        acker.ack(tag).await
    } else {
        stats.record_failure();
        acker.nack(tag, true).await
    };
    if let Err(e) = settled {
        error!(delivery_tag = tag, error = %e, "Failed to settle message");
    }

    sent
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use courier_mail::SendOutcome;
    use courier_messaging::MessageBroker;
    use courier_messaging::memory::InMemoryBroker;

    use crate::stats::StatsSnapshot;

    enum Behaviour {
        Send,
        Refuse,
        Panic,
    }

    struct StubSender(Behaviour);

    #[async_trait]
    impl EmailSender for StubSender {
        async fn send_email(&self, _job: &EmailJob) -> SendOutcome {
            match self.0 {
                Behaviour::Send => SendOutcome::sent(),
                Behaviour::Refuse => SendOutcome::failed("email could not be sent"),
                Behaviour::Panic => panic!("transport blew up"),
            }
        }
    }

    async fn setup(behaviour: Behaviour) -> (Dispatcher, InMemoryBroker, Arc<dyn Acknowledger>) {
        let broker = InMemoryBroker::new();
        let acker = broker.connect().await.unwrap().acknowledger();
        let dispatcher = Dispatcher::new(Arc::new(StubSender(behaviour)), Arc::new(WorkerStats::new()));
        (dispatcher, broker, acker)
    }

    fn valid_body() -> Vec<u8> {
        br#"{"to":"r@example.com","subject":"S","body":"B"}"#.to_vec()
    }

    #[tokio::test]
    async fn test_undecodable_message_rejected_without_requeue() {
        let (dispatcher, broker, acker) = setup(Behaviour::Send).await;

        let result = dispatcher.dispatch(Delivery::new(7, b"{not json".to_vec()), acker).await;

        assert!(matches!(result, Dispatch::Rejected(ref reason) if reason == "message is empty"));
        assert_eq!(broker.record().nacks, vec![(7, false)]);
        assert_eq!(
            dispatcher.stats().snapshot(),
            StatsSnapshot {
                consumed: 0,
                successful: 0,
                failed: 1,
                total: 1,
            }
        );
    }

    #[tokio::test]
    async fn test_invalid_message_reason() {
        let (dispatcher, broker, acker) = setup(Behaviour::Send).await;

        let result = dispatcher
            .dispatch(Delivery::new(1, br#"{"to":"nobody","subject":"S","body":"B"}"#.to_vec()), acker)
            .await;

        assert!(matches!(result, Dispatch::Rejected(ref reason) if reason == "invalid email: nobody"));
        assert_eq!(broker.record().nacks, vec![(1, false)]);
    }

    #[tokio::test]
    async fn test_successful_send_is_acked() {
        let (dispatcher, broker, acker) = setup(Behaviour::Send).await;

        let Dispatch::Spawned(task) = dispatcher.dispatch(Delivery::new(3, valid_body()), acker).await else {
            panic!("valid message was rejected");
        };
        assert!(task.await.unwrap());

        let record = broker.record();
        assert_eq!(record.acks, vec![3]);
        assert!(record.nacks.is_empty());
        assert_eq!(
            dispatcher.stats().snapshot(),
            StatsSnapshot {
                consumed: 1,
                successful: 1,
                failed: 0,
                total: 1,
            }
        );
    }

    #[tokio::test]
    async fn test_failed_send_is_requeued() {
        let (dispatcher, broker, acker) = setup(Behaviour::Refuse).await;

        let Dispatch::Spawned(task) = dispatcher.dispatch(Delivery::new(4, valid_body()), acker).await else {
            panic!("valid message was rejected");
        };
        assert!(!task.await.unwrap());

        assert_eq!(broker.record().nacks, vec![(4, true)]);
        let stats = dispatcher.stats().snapshot();
        assert_eq!((stats.consumed, stats.failed, stats.total), (1, 1, 1));
    }

    #[tokio::test]
    async fn test_panicking_send_is_requeued() {
        let (dispatcher, broker, acker) = setup(Behaviour::Panic).await;

        let Dispatch::Spawned(task) = dispatcher.dispatch(Delivery::new(5, valid_body()), acker).await else {
            panic!("valid message was rejected");
        };
        assert!(!task.await.unwrap());

        assert_eq!(broker.record().nacks, vec![(5, true)]);
        assert_eq!(dispatcher.stats().snapshot().failed, 1);
    }
}
