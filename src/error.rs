//! Error types for the worker.

use courier_config::ConfigError;
use courier_mail::MailError;
use courier_messaging::MessagingError;
use thiserror::Error;

/// Errors that stop the consume loop.
#[derive(Debug, Error)]
pub enum ConsumerError {
    /// The broker could not be reached on the very first attempt.
    #[error("Cannot connect to broker: {0}")]
    FatalConnect(#[source] MessagingError),
}

/// Errors that end the worker process.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// Configuration missing or invalid
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Mail components could not be built from the configuration
    #[error("Mail setup error: {0}")]
    MailSetup(#[from] MailError),

    /// The consumer gave up
    #[error(transparent)]
    Consumer(#[from] ConsumerError),
}

impl WorkerError {
    /// Process exit status for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            WorkerError::Config(_) | WorkerError::MailSetup(_) => 2,
            WorkerError::Consumer(_) => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        let fatal = WorkerError::from(ConsumerError::FatalConnect(MessagingError::Connection(
            "connection refused".into(),
        )));
        assert_eq!(fatal.exit_code(), 1);
        assert_eq!(
            fatal.to_string(),
            "Cannot connect to broker: Connection failed: connection refused"
        );

        let config = WorkerError::from(ConfigError::KeyNotFound("RABBITMQ_HOST".into()));
        assert_eq!(config.exit_code(), 2);
    }
}
