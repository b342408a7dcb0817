//! # Courier Mail
//!
//! Everything between a decoded queue message and a delivered email.
//!
//! - [`MessageValidator`]: structural checks on a decoded message
//! - [`EmailJob`]: the typed job once a message is valid
//! - [`ContentResolver`]: attachment references to local files
//!   ([`FileContentResolver`] fetches URLs and decodes inline payloads)
//! - [`MailTransport`]: a reusable SMTP session ([`SmtpMailTransport`] over lettre)
//! - [`EmailService`]: resolves, fills the transport, sends, cleans up
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use courier_mail::{
//!     EmailJob, EmailSender, EmailService, FileContentResolver, MessageValidator,
//!     ResolverConfig, SmtpConfig, SmtpMailTransport,
//! };
//! use std::sync::Arc;
//!
//! # async fn run() -> courier_mail::Result<()> {
//! let raw = serde_json::json!({
//!     "to": "recipient@example.com",
//!     "subject": "Hello",
//!     "body": "<p>Hi there</p>"
//! });
//!
//! let verdict = MessageValidator::new().validate(&raw);
//! assert!(verdict.valid, "{}", verdict.reason);
//!
//! let transport = SmtpMailTransport::new(
//!     &SmtpConfig::new("smtp.example.com", "noreply@example.com").credentials("user", "pass"),
//! )?;
//! let resolver = Arc::new(FileContentResolver::new(ResolverConfig::default())?);
//! let service = EmailService::new(transport, resolver);
//!
//! let outcome = service.send_email(&EmailJob::from_value(&raw)?).await;
//! println!("{}", outcome.message);
//! # Ok(())
//! # }
//! ```

mod error;
mod job;

pub mod address;
pub mod attachment;
pub mod resolver;
pub mod service;
pub mod transport;
pub mod validator;

pub use attachment::AttachmentReference;
pub use error::{MailError, Result};
pub use job::{EmailJob, OneOrMany};
pub use resolver::{AttachmentHandle, ContentResolver, FileContentResolver, ResolverConfig};
pub use service::{EmailSender, EmailService, SendOutcome};
pub use transport::{MailTransport, SmtpConfig, SmtpMailTransport, SmtpSecurity};
pub use validator::{MessageValidator, ValidationVerdict};

/// Prelude for common imports.
pub mod prelude {
    pub use crate::{
        ContentResolver, EmailJob, EmailSender, EmailService, MailError, MailTransport,
        MessageValidator, SendOutcome,
    };
}
