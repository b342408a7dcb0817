//! End-to-end tests: in-memory broker -> consumer -> email service -> transport.
//!
//! The broker and the SMTP session are doubles; validation, attachment
//! resolution, dispatch, acknowledgement and statistics are the real thing.

use async_trait::async_trait;
use courier::status::StatusBoard;
use courier::{ConsumerConfig, ConsumerState, Dispatcher, EmailConsumer, StatsSnapshot, WorkerStats};
use courier_mail::{EmailService, FileContentResolver, MailError, MailTransport, ResolverConfig, Result};
use courier_messaging::memory::InMemoryBroker;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One message as the transport saw it at send time.
#[derive(Debug, Clone, Default)]
struct Sent {
    to: Vec<String>,
    bcc: Vec<String>,
    subject: String,
    attachments: Vec<PathBuf>,
    attachments_present: bool,
}

#[derive(Default)]
struct Outbox {
    current: Sent,
    sent: Vec<Sent>,
}

/// Transport double that refuses any message whose subject starts with "refuse".
struct OutboxTransport {
    outbox: Arc<Mutex<Outbox>>,
}

#[async_trait]
impl MailTransport for OutboxTransport {
    fn clear_addresses(&mut self) {
        self.outbox.lock().unwrap().current.to.clear();
    }
    fn add_address(&mut self, address: &str) -> Result<()> {
        self.outbox.lock().unwrap().current.to.push(address.to_string());
        Ok(())
    }
    fn clear_bcc(&mut self) {
        self.outbox.lock().unwrap().current.bcc.clear();
    }
    fn add_bcc(&mut self, address: &str) -> Result<()> {
        self.outbox.lock().unwrap().current.bcc.push(address.to_string());
        Ok(())
    }
    fn set_subject(&mut self, subject: &str) {
        self.outbox.lock().unwrap().current.subject = subject.to_string();
    }
    fn set_body(&mut self, _body: &str) {}
    fn clear_attachments(&mut self) {
        self.outbox.lock().unwrap().current.attachments.clear();
    }
    fn add_attachment(&mut self, path: &Path) -> Result<()> {
        self.outbox
            .lock()
            .unwrap()
            .current
            .attachments
            .push(path.to_path_buf());
        Ok(())
    }
    async fn send(&mut self) -> Result<bool> {
        let mut outbox = self.outbox.lock().unwrap();
        if outbox.current.subject.starts_with("refuse") {
            return Err(MailError::Smtp("550 mailbox unavailable".into()));
        }
        let mut sent = outbox.current.clone();
        sent.attachments_present = sent.attachments.iter().all(|p| p.exists());
        outbox.sent.push(sent);
        Ok(true)
    }
}

struct Harness {
    broker: InMemoryBroker,
    outbox: Arc<Mutex<Outbox>>,
    stats: Arc<WorkerStats>,
    attachments: tempfile::TempDir,
    state: tokio::sync::watch::Receiver<ConsumerState>,
    worker: tokio::task::JoinHandle<()>,
}

impl Harness {
    async fn start() -> Self {
        let broker = InMemoryBroker::new();
        let outbox = Arc::new(Mutex::new(Outbox::default()));
        let stats = Arc::new(WorkerStats::new());
        let attachments = tempfile::tempdir().unwrap();

        let resolver = FileContentResolver::new(ResolverConfig::new(attachments.path())).unwrap();
        let service = EmailService::new(
            OutboxTransport {
                outbox: outbox.clone(),
            },
            Arc::new(resolver),
        );
        let dispatcher = Dispatcher::new(Arc::new(service), stats.clone());
        let config = ConsumerConfig::new("emails")
            .with_reconnect_delay(Duration::from_millis(20))
            .with_status_interval(Duration::from_millis(10));
        let mut consumer = EmailConsumer::new(Arc::new(broker.clone()), dispatcher, config)
            .with_status_board(StatusBoard::new("emails").with_terminal(false));

        let mut state = consumer.state();
        let worker = tokio::spawn(async move {
            let _ = consumer.run().await;
        });
        state
            .wait_for(|s| *s == ConsumerState::Consuming)
            .await
            .unwrap();

        Self {
            broker,
            outbox,
            stats,
            attachments,
            state,
            worker,
        }
    }

    fn publish(&self, message: serde_json::Value) -> u64 {
        self.broker.publish(message.to_string())
    }

    fn sent(&self) -> Vec<Sent> {
        self.outbox.lock().unwrap().sent.clone()
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        self.worker.abort();
    }
}

#[tokio::test]
async fn test_valid_job_is_sent_and_acked() {
    let harness = Harness::start().await;

    let tag = harness.publish(json!({
        "to": ["a@example.com", "b@example.com"],
        "subject": "Invoice",
        "body": "<p>Attached</p>",
        "bcc": "audit@example.com",
        "attachments": ["data:application/pdf;base64,JVBERi0xLjQ="]
    }));

    let record = harness.broker.wait_until(|r| r.settled() == 1).await;
    assert_eq!(record.acks, vec![tag]);

    let sent = harness.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, vec!["a@example.com", "b@example.com"]);
    assert_eq!(sent[0].bcc, vec!["audit@example.com"]);
    assert_eq!(sent[0].attachments.len(), 1);
    assert!(sent[0].attachments_present);
    assert!(!sent[0].attachments[0].exists());
    assert_eq!(
        std::fs::read_dir(harness.attachments.path()).unwrap().count(),
        0
    );

    assert_eq!(
        harness.stats.snapshot(),
        StatsSnapshot {
            consumed: 1,
            successful: 1,
            failed: 0,
            total: 1,
        }
    );
}

#[tokio::test]
async fn test_invalid_messages_are_discarded() {
    let harness = Harness::start().await;

    let bad_address = harness.publish(json!({"to": "nobody", "subject": "S", "body": "B"}));
    let missing_body = harness.publish(json!({"to": "r@example.com", "subject": "S"}));
    let not_json = harness.broker.publish(b"<<garbage>>".to_vec());

    let record = harness.broker.wait_until(|r| r.settled() == 3).await;
    assert!(record.acks.is_empty());
    assert_eq!(
        record.nacks,
        vec![(bad_address, false), (missing_body, false), (not_json, false)]
    );
    assert!(harness.sent().is_empty());

    let stats = harness.stats.snapshot();
    assert_eq!((stats.consumed, stats.failed, stats.total), (0, 3, 3));
}

#[tokio::test]
async fn test_refused_send_is_requeued() {
    let harness = Harness::start().await;

    let tag = harness.publish(json!({
        "to": "r@example.com",
        "subject": "refuse me",
        "body": "B"
    }));

    let record = harness.broker.wait_until(|r| r.settled() == 1).await;
    assert_eq!(record.nacks, vec![(tag, true)]);

    let stats = harness.stats.snapshot();
    assert_eq!((stats.consumed, stats.successful, stats.failed), (1, 0, 1));
}

#[tokio::test]
async fn test_bcc_does_not_carry_over() {
    let harness = Harness::start().await;

    harness.publish(json!({
        "to": "first@example.com",
        "subject": "One",
        "body": "B",
        "bcc": ["hidden@example.com"]
    }));
    harness.broker.wait_until(|r| r.settled() == 1).await;
    harness.publish(json!({"to": "second@example.com", "subject": "Two", "body": "B"}));
    harness.broker.wait_until(|r| r.settled() == 2).await;

    let sent = harness.sent();
    assert_eq!(sent[0].bcc, vec!["hidden@example.com"]);
    assert!(sent[1].bcc.is_empty());
    assert_eq!(sent[1].to, vec!["second@example.com"]);
}

#[tokio::test]
async fn test_stats_survive_reconnect() {
    let mut harness = Harness::start().await;

    harness.publish(json!({"to": "r@example.com", "subject": "Before", "body": "B"}));
    harness.broker.wait_until(|r| r.settled() == 1).await;

    harness.broker.disconnect();
    harness.broker.wait_until(|r| r.connects == 2).await;
    harness
        .state
        .wait_for(|s| *s == ConsumerState::Consuming)
        .await
        .unwrap();

    harness.publish(json!({"to": "r@example.com", "subject": "After", "body": "B"}));
    let record = harness.broker.wait_until(|r| r.settled() == 2).await;

    assert_eq!(record.acks.len(), 2);
    assert_eq!(harness.stats.snapshot().successful, 2);
    assert_eq!(
        harness.sent().iter().map(|s| s.subject.as_str()).collect::<Vec<_>>(),
        vec!["Before", "After"]
    );
}
