//! Mail transport: a reusable SMTP session that is filled in, then sent.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Mailbox, MultiPart, SinglePart};
use lettre::{
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Tokio1Executor,
};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::address::{mailbox, parse_address};
use crate::{MailError, Result};

/// A stateful outgoing message builder bound to one SMTP session.
///
/// Callers clear and refill recipients, content and attachments before each
/// [`send`](MailTransport::send). Nothing is reset automatically.
#[async_trait]
pub trait MailTransport: Send {
    fn clear_addresses(&mut self);

    fn add_address(&mut self, address: &str) -> Result<()>;

    fn clear_bcc(&mut self);

    fn add_bcc(&mut self, address: &str) -> Result<()>;

    fn set_subject(&mut self, subject: &str);

    /// Set the HTML body.
    fn set_body(&mut self, body: &str);

    fn clear_attachments(&mut self);

    /// Attach the file at `path`; it is read when the message is sent.
    fn add_attachment(&mut self, path: &Path) -> Result<()>;

    /// Send the current message. `Ok(false)` means the server refused it.
    async fn send(&mut self) -> Result<bool>;
}

/// SMTP security mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SmtpSecurity {
    /// Plain SMTP without opportunistic TLS.
    #[default]
    None,
    /// STARTTLS upgrade.
    StartTls,
    /// Implicit TLS.
    Tls,
}

/// SMTP configuration.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    /// SMTP server host.
    pub host: String,
    /// SMTP server port.
    pub port: u16,
    /// Security mode.
    pub security: SmtpSecurity,
    /// Username for authentication.
    pub username: Option<String>,
    /// Password for authentication.
    pub password: Option<String>,
    /// Per-command timeout.
    pub timeout: Duration,
    /// Sender address.
    pub from: String,
    /// Sender display name.
    pub from_name: Option<String>,
}

impl SmtpConfig {
    /// Create a new SMTP configuration.
    pub fn new(host: impl Into<String>, from: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: 587,
            security: SmtpSecurity::None,
            username: None,
            password: None,
            timeout: Duration::from_secs(5),
            from: from.into(),
            from_name: None,
        }
    }

    /// Set credentials.
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Set the port.
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the security mode.
    pub fn security(mut self, security: SmtpSecurity) -> Self {
        self.security = security;
        self
    }

    /// Set the timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the sender display name.
    pub fn from_name(mut self, name: impl Into<String>) -> Self {
        self.from_name = Some(name.into());
        self
    }
}

/// [`MailTransport`] over lettre's async SMTP client.
pub struct SmtpMailTransport {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Vec<Mailbox>,
    bcc: Vec<Mailbox>,
    subject: String,
    body: String,
    attachments: Vec<PathBuf>,
}

impl SmtpMailTransport {
    /// Create a new SMTP transport. No connection is opened until the first send.
    pub fn new(config: &SmtpConfig) -> Result<Self> {
        let from = mailbox(&config.from, config.from_name.as_deref())?;

        let mut builder = match config.security {
            SmtpSecurity::None => {
                AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
            }
            SmtpSecurity::StartTls => {
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
            }
            SmtpSecurity::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)?,
        };

        builder = builder.port(config.port).timeout(Some(config.timeout));

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        info!(
            host = %config.host,
            port = config.port,
            security = ?config.security,
            from = %from,
            "SMTP transport initialized"
        );

        Ok(Self {
            transport: builder.build(),
            from,
            to: Vec::new(),
            bcc: Vec::new(),
            subject: String::new(),
            body: String::new(),
            attachments: Vec::new(),
        })
    }

    async fn build_message(&self) -> Result<lettre::Message> {
        if self.to.is_empty() {
            return Err(MailError::Message("no recipients".to_string()));
        }

        let mut builder = lettre::Message::builder()
            .from(self.from.clone())
            .subject(self.subject.clone());

        for to in &self.to {
            builder = builder.to(to.clone());
        }
        // lettre keeps Bcc in the envelope and drops the header.
        for bcc in &self.bcc {
            builder = builder.bcc(bcc.clone());
        }

        let html = SinglePart::html(self.body.clone());
        if self.attachments.is_empty() {
            return Ok(builder.singlepart(html)?);
        }

        let mut mixed = MultiPart::mixed().singlepart(html);
        for path in &self.attachments {
            mixed = mixed.singlepart(load_attachment(path).await?);
        }
        Ok(builder.multipart(mixed)?)
    }
}

async fn load_attachment(path: &Path) -> Result<SinglePart> {
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| MailError::Attachment(format!("invalid file name: {}", path.display())))?
        .to_string();

    let content_type = mime_guess::from_path(path)
        .first_or_octet_stream()
        .to_string()
        .parse()
        .unwrap_or(ContentType::TEXT_PLAIN);

    let data = tokio::fs::read(path).await?;

    Ok(lettre::message::Attachment::new(filename).body(data, content_type))
}

#[async_trait]
impl MailTransport for SmtpMailTransport {
    fn clear_addresses(&mut self) {
        self.to.clear();
    }

    fn add_address(&mut self, address: &str) -> Result<()> {
        self.to.push(Mailbox::new(None, parse_address(address)?));
        Ok(())
    }

    fn clear_bcc(&mut self) {
        self.bcc.clear();
    }

    fn add_bcc(&mut self, address: &str) -> Result<()> {
        self.bcc.push(Mailbox::new(None, parse_address(address)?));
        Ok(())
    }

    fn set_subject(&mut self, subject: &str) {
        self.subject = subject.to_string();
    }

    fn set_body(&mut self, body: &str) {
        self.body = body.to_string();
    }

    fn clear_attachments(&mut self) {
        self.attachments.clear();
    }

    fn add_attachment(&mut self, path: &Path) -> Result<()> {
        if !path.is_file() {
            return Err(MailError::Attachment(format!(
                "not a readable file: {}",
                path.display()
            )));
        }
        self.attachments.push(path.to_path_buf());
        Ok(())
    }

    async fn send(&mut self) -> Result<bool> {
        let message = self.build_message().await?;

        debug!(
            to = ?self.to.iter().map(ToString::to_string).collect::<Vec<_>>(),
            bcc = self.bcc.len(),
            attachments = self.attachments.len(),
            subject = %self.subject,
            "Sending email via SMTP"
        );

        let response = self.transport.send(message).await?;
        Ok(response.is_positive())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport() -> SmtpMailTransport {
        let config = SmtpConfig::new("localhost", "noreply@example.com")
            .port(2525)
            .credentials("user", "pass")
            .from_name("TPTEC");
        SmtpMailTransport::new(&config).unwrap()
    }

    #[test]
    fn test_smtp_config_builder() {
        let config = SmtpConfig::new("smtp.example.com", "noreply@example.com")
            .port(465)
            .security(SmtpSecurity::Tls)
            .timeout(Duration::from_secs(10))
            .credentials("user", "pass");

        assert_eq!(config.host, "smtp.example.com");
        assert_eq!(config.port, 465);
        assert_eq!(config.security, SmtpSecurity::Tls);
        assert_eq!(config.username.as_deref(), Some("user"));
        assert_eq!(config.timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_defaults_match_plain_smtp() {
        let config = SmtpConfig::new("smtp.example.com", "noreply@example.com");
        assert_eq!(config.security, SmtpSecurity::None);
        assert_eq!(config.port, 587);
        assert_eq!(config.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_invalid_sender_rejected() {
        let config = SmtpConfig::new("localhost", "not-an-address");
        assert!(SmtpMailTransport::new(&config).is_err());
    }

    #[tokio::test]
    async fn test_message_assembly() {
        let dir = tempfile::tempdir().unwrap();
        let attachment = dir.path().join("report.pdf");
        std::fs::write(&attachment, b"%PDF-1.4").unwrap();

        let mut transport = transport();
        transport.add_address("r1@example.com").unwrap();
        transport.add_address("r2@example.com").unwrap();
        transport.add_bcc("audit@example.com").unwrap();
        transport.set_subject("Report");
        transport.set_body("<p>See attached</p>");
        transport.add_attachment(&attachment).unwrap();

        let message = transport.build_message().await.unwrap();
        let envelope = message.envelope();
        assert_eq!(envelope.to().len(), 3);

        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("Subject: Report"));
        assert!(raw.contains("TPTEC"));
        assert!(raw.contains("report.pdf"));
        assert!(raw.contains("application/pdf"));
        assert!(!raw.contains("Bcc:"));
    }

    #[tokio::test]
    async fn test_clearing_resets_state() {
        let mut transport = transport();
        transport.add_address("r1@example.com").unwrap();
        transport.clear_addresses();

        assert!(transport.build_message().await.is_err());
        assert!(transport.add_address("bogus").is_err());
        assert!(transport.add_attachment(Path::new("/definitely/not/here.txt")).is_err());
    }
}
