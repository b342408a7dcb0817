//! Sending one email job end to end.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::job::EmailJob;
use crate::resolver::{AttachmentHandle, ContentResolver};
use crate::transport::MailTransport;
use crate::{MailError, Result};

/// Terminal result of trying to send one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendOutcome {
    pub sent: bool,
    pub message: String,
}

impl SendOutcome {
    pub fn sent() -> Self {
        Self {
            sent: true,
            message: "email sent successfully".to_string(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            sent: false,
            message: message.into(),
        }
    }
}

/// Anything that can deliver an [`EmailJob`].
#[async_trait]
pub trait EmailSender: Send + Sync {
    /// Never fails; problems are reported in the outcome.
    async fn send_email(&self, job: &EmailJob) -> SendOutcome;
}

/// Releases every handle it holds when dropped.
struct AttachmentGuard<'a> {
    resolver: &'a dyn ContentResolver,
    handles: Vec<AttachmentHandle>,
}

impl Drop for AttachmentGuard<'_> {
    fn drop(&mut self) {
        for handle in self.handles.drain(..) {
            self.resolver.release(&handle);
        }
    }
}

/// Resolves attachments, fills the shared transport and sends.
///
/// The transport holds per-message state, so filling and sending happen
/// under one lock: concurrent jobs are sent one after another.
pub struct EmailService {
    transport: Mutex<Box<dyn MailTransport>>,
    resolver: Arc<dyn ContentResolver>,
}

impl EmailService {
    pub fn new(transport: impl MailTransport + 'static, resolver: Arc<dyn ContentResolver>) -> Self {
        Self {
            transport: Mutex::new(Box::new(transport)),
            resolver,
        }
    }

    async fn deliver(&self, job: &EmailJob) -> Result<bool> {
        let mut transport = self.transport.lock().await;

        transport.clear_addresses();
        for address in job.to.iter() {
            transport.add_address(address)?;
        }

        transport.clear_bcc();
        if let Some(bcc) = &job.bcc {
            for address in bcc.iter() {
                transport.add_bcc(address)?;
            }
        }

        transport.set_subject(&job.subject);
        transport.set_body(&job.body);

        transport.clear_attachments();
        let mut guard = AttachmentGuard {
            resolver: self.resolver.as_ref(),
            handles: Vec::new(),
        };
        for reference in job.attachments.iter().flat_map(|a| a.iter()) {
            let handle = match self.resolver.resolve(reference).await {
                Ok(handle) => handle,
                Err(e) => {
                    warn!(reference = %truncate(reference), error = %e, "Attachment could not be resolved");
                    return Err(MailError::InvalidAttachment(reference.to_string()));
                }
            };
            // Owned by the guard before anything else can fail.
            guard.handles.push(handle);
            if let Some(handle) = guard.handles.last() {
                transport.add_attachment(handle.path())?;
            }
        }

        transport.send().await
    }
}

#[async_trait]
impl EmailSender for EmailService {
    async fn send_email(&self, job: &EmailJob) -> SendOutcome {
        let outcome = match self.deliver(job).await {
            Ok(true) => SendOutcome::sent(),
            Ok(false) => SendOutcome::failed("email could not be sent"),
            Err(MailError::InvalidAttachment(_)) => SendOutcome::failed("invalid attachment"),
            Err(e) => {
                warn!(to = %job.to.joined(), error = %e, retryable = e.is_retryable(), "Send failed");
                SendOutcome::failed(e.to_string())
            }
        };

        info!(
            to = %job.to.joined(),
            sent = outcome.sent,
            message = %outcome.message,
            "Email send finished"
        );
        outcome
    }
}

// Inline payloads can be megabytes long; keep log lines readable.
fn truncate(reference: &str) -> &str {
    match reference.char_indices().nth(120) {
        Some((idx, _)) => &reference[..idx],
        None => reference,
    }
}
