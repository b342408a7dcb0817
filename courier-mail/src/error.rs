//! Errors raised while preparing or sending an email.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, MailError>;

#[derive(Debug, Error)]
pub enum MailError {
    /// The SMTP server rejected the message or the session broke.
    #[error("SMTP error: {0}")]
    Smtp(String),

    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Reference that is neither an absolute URL nor a recognized inline payload,
    /// or one that could not be resolved.
    #[error("Invalid attachment: {0}")]
    InvalidAttachment(String),

    /// A resolved attachment file could not be attached.
    #[error("Attachment error: {0}")]
    Attachment(String),

    /// The MIME message could not be assembled.
    #[error("Message error: {0}")]
    Message(String),

    /// Transport or resolver could not be built from its settings.
    #[error("Mail setup error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The job did not have the shape of an email job.
    #[error("Malformed job: {0}")]
    Serialization(String),

    /// Remote attachment fetch failed, including non-success status codes.
    #[error("Fetch error: {0}")]
    Network(String),

    #[error("Operation timed out")]
    Timeout,
}

impl MailError {
    /// Whether the same job might succeed on a later attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Smtp(_) | Self::Network(_) | Self::Timeout | Self::Io(_))
    }
}

impl From<lettre::transport::smtp::Error> for MailError {
    fn from(err: lettre::transport::smtp::Error) -> Self {
        if err.is_timeout() {
            return Self::Timeout;
        }
        Self::Smtp(err.to_string())
    }
}

impl From<lettre::address::AddressError> for MailError {
    fn from(err: lettre::address::AddressError) -> Self {
        Self::InvalidAddress(err.to_string())
    }
}

impl From<lettre::error::Error> for MailError {
    fn from(err: lettre::error::Error) -> Self {
        Self::Message(err.to_string())
    }
}

impl From<serde_json::Error> for MailError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<reqwest::Error> for MailError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return Self::Timeout;
        }
        Self::Network(err.to_string())
    }
}
