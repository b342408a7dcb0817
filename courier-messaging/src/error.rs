//! Broker error taxonomy.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MessagingError {
    /// The broker could not be reached or refused the connection.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// The channel or its connection went away while in use.
    #[error("Channel closed: {0}")]
    ChannelClosed(String),

    #[error("Acknowledge failed: {0}")]
    Acknowledge(String),

    /// Settings that cannot form a valid broker address.
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// The broker answered a declare, qos or consume request with an error.
    #[error("Broker error: {0}")]
    Protocol(String),
}

impl MessagingError {
    /// Whether the connection itself is gone and must be re-established.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            MessagingError::Connection(_) | MessagingError::ChannelClosed(_)
        )
    }
}

#[cfg(feature = "rabbitmq")]
impl From<lapin::Error> for MessagingError {
    fn from(err: lapin::Error) -> Self {
        match &err {
            lapin::Error::IOError(_) | lapin::Error::InvalidConnectionState(_) => {
                MessagingError::Connection(err.to_string())
            }
            lapin::Error::InvalidChannelState(_) => MessagingError::ChannelClosed(err.to_string()),
            _ => MessagingError::Protocol(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_errors() {
        assert!(MessagingError::ChannelClosed("connection reset by peer".into()).is_connection_error());
        assert!(MessagingError::Connection("refused".into()).is_connection_error());
        assert!(!MessagingError::Protocol("PRECONDITION_FAILED".into()).is_connection_error());
        assert!(!MessagingError::Configuration("empty host".into()).is_connection_error());
    }

    #[cfg(feature = "rabbitmq")]
    #[test]
    fn test_lapin_errors_classified() {
        let gone = MessagingError::from(lapin::Error::InvalidConnectionState(lapin::ConnectionState::Closed));
        assert!(matches!(gone, MessagingError::Connection(_)));

        let closed = MessagingError::from(lapin::Error::InvalidChannelState(lapin::ChannelState::Closed));
        assert!(matches!(closed, MessagingError::ChannelClosed(_)));
        assert!(closed.is_connection_error());

        let limit = MessagingError::from(lapin::Error::ChannelsLimitReached);
        assert!(matches!(limit, MessagingError::Protocol(_)));
        assert!(!limit.is_connection_error());
    }
}
