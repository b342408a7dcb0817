//! Broker and queue configuration

use std::time::Duration;
use url::Url;

use crate::MessagingError;

/// RabbitMQ connection settings
#[derive(Debug, Clone, PartialEq)]
pub struct RabbitMqConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Virtual host
    pub vhost: String,
    /// Heartbeat interval negotiated with the server
    pub heartbeat: Duration,
}

impl Default for RabbitMqConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5672,
            username: "guest".to_string(),
            password: "guest".to_string(),
            vhost: "/".to_string(),
            heartbeat: Duration::from_secs(30),
        }
    }
}

impl RabbitMqConfig {
    /// Create a new RabbitMQ configuration
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    /// Set credentials
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    /// Set virtual host
    pub fn with_vhost(mut self, vhost: impl Into<String>) -> Self {
        self.vhost = vhost.into();
        self
    }

    /// Set heartbeat interval
    pub fn with_heartbeat(mut self, heartbeat: Duration) -> Self {
        self.heartbeat = heartbeat;
        self
    }

    /// AMQP URI for this configuration, with credentials and vhost escaped.
    pub fn uri(&self) -> Result<String, MessagingError> {
        let invalid = |what: &str| MessagingError::Configuration(format!("invalid {}", what));

        let mut url = Url::parse(&format!("amqp://{}:{}", self.host, self.port))
            .map_err(|_| invalid("host"))?;
        url.set_username(&self.username).map_err(|_| invalid("username"))?;
        url.set_password(Some(&self.password)).map_err(|_| invalid("password"))?;
        url.set_path(&format!(
            "/{}",
            self.vhost.replace('%', "%25").replace('/', "%2F")
        ));
        url.set_query(Some(&format!("heartbeat={}", self.heartbeat.as_secs())));

        Ok(url.to_string())
    }

    /// URI with the password masked, for logs
    pub fn redacted_uri(&self) -> String {
        format!(
            "amqp://{}:***@{}:{}/{}",
            self.username, self.host, self.port, self.vhost
        )
    }
}

/// Queue declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueConfig {
    /// Queue name
    pub name: String,
    /// Survive broker restarts
    pub durable: bool,
    /// Restrict to this connection
    pub exclusive: bool,
    /// Delete when the last consumer goes away
    pub auto_delete: bool,
}

impl QueueConfig {
    /// A durable, shared, persistent queue
    pub fn durable(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            durable: true,
            exclusive: false,
            auto_delete: false,
        }
    }
}
