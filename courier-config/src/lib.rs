//! Configuration for the courier email worker.
//!
//! All settings come from environment variables, optionally seeded from a
//! `.env` file. The variable names match the ones operators already deploy
//! with (`RABBITMQ_*`, `EMAIL_*`), plus `WORKER_*` knobs for the worker itself.
//!
//! ```rust,no_run
//! use courier_config::{AppConfig, Validate};
//!
//! courier_config::load_dotenv(None)?;
//! let config = AppConfig::from_env()?;
//! config.validate()?;
//! println!("consuming from {}", config.broker.queue);
//! # Ok::<(), courier_config::ConfigError>(())
//! ```

pub mod env;
pub mod error;
pub mod validation;

pub use env::EnvLoader;
pub use error::{ConfigError, Result};
pub use validation::{ConfigValidator, Validate};

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Load variables from a `.env` file into the process environment.
///
/// With an explicit path the file must exist. Without one, `./.env` is read
/// when present and silently skipped otherwise. Variables already set in the
/// environment are never overwritten.
pub fn load_dotenv(path: Option<&Path>) -> Result<()> {
    match path {
        Some(path) => {
            dotenvy::from_path(path).map_err(|e| {
                ConfigError::LoadError(format!("{}: {}", path.display(), e))
            })?;
        }
        None => {
            dotenvy::dotenv().ok();
        }
    }
    Ok(())
}

/// RabbitMQ connection and queue settings.
#[derive(Debug, Clone, PartialEq)]
pub struct BrokerSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub queue: String,
    pub vhost: String,
    /// Heartbeat interval negotiated with the broker, in seconds
    pub heartbeat: u16,
}

impl BrokerSettings {
    fn from_loader(env: &EnvLoader) -> Result<Self> {
        Ok(Self {
            host: env.load_var("RABBITMQ_HOST")?,
            port: env.load_parsed_or("RABBITMQ_PORT", 5672)?,
            user: env.load_var("RABBITMQ_USER")?,
            password: env.load_var("RABBITMQ_PASS")?,
            queue: env.load_var("RABBITMQ_QUEUE")?,
            vhost: env.load_var_or("RABBITMQ_VHOST", "/"),
            heartbeat: env.load_parsed_or("RABBITMQ_HEARTBEAT", 30)?,
        })
    }
}

/// How the SMTP session is secured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SmtpSecurity {
    /// Plain SMTP, no opportunistic TLS
    #[default]
    None,
    /// Upgrade with STARTTLS
    StartTls,
    /// Implicit TLS (SMTPS)
    Tls,
}

impl FromStr for SmtpSecurity {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" | "" => Ok(SmtpSecurity::None),
            "starttls" => Ok(SmtpSecurity::StartTls),
            "tls" | "ssl" | "smtps" => Ok(SmtpSecurity::Tls),
            other => Err(format!("unknown security mode '{}'", other)),
        }
    }
}

impl fmt::Display for SmtpSecurity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SmtpSecurity::None => write!(f, "none"),
            SmtpSecurity::StartTls => write!(f, "starttls"),
            SmtpSecurity::Tls => write!(f, "tls"),
        }
    }
}

/// Outbound SMTP settings.
#[derive(Debug, Clone, PartialEq)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    /// Envelope and header sender; defaults to `user`
    pub from: String,
    pub from_name: Option<String>,
    pub security: SmtpSecurity,
    pub timeout: Duration,
}

impl SmtpSettings {
    fn from_loader(env: &EnvLoader) -> Result<Self> {
        let user = env.load_var("EMAIL_USER")?;
        let from = env
            .load_optional("EMAIL_FROM")
            .filter(|from| !from.trim().is_empty())
            .unwrap_or_else(|| user.clone());

        Ok(Self {
            host: env.load_var("EMAIL_HOST")?,
            port: env.load_parsed_or("EMAIL_PORT", 587)?,
            password: env.load_var("EMAIL_PASS")?,
            from,
            from_name: env
                .load_optional("EMAIL_FROM_NAME")
                .filter(|name| !name.trim().is_empty()),
            security: env.load_parsed_or("EMAIL_SECURITY", SmtpSecurity::None)?,
            timeout: Duration::from_secs(env.load_parsed_or("EMAIL_TIMEOUT", 5)?),
            user,
        })
    }
}

/// Tuning for the worker process itself.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerSettings {
    /// Where resolved attachments are written before sending
    pub attachment_dir: PathBuf,
    pub fetch_timeout: Duration,
    pub reconnect_delay: Duration,
    pub status_interval: Duration,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            attachment_dir: std::env::temp_dir(),
            fetch_timeout: Duration::from_secs(30),
            reconnect_delay: Duration::from_secs(5),
            status_interval: Duration::from_millis(1000),
        }
    }
}

impl WorkerSettings {
    fn from_loader(env: &EnvLoader) -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            attachment_dir: env
                .load_optional("WORKER_ATTACHMENT_DIR")
                .filter(|dir| !dir.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.attachment_dir),
            fetch_timeout: Duration::from_secs(env.load_parsed_or("WORKER_FETCH_TIMEOUT", 30)?),
            reconnect_delay: Duration::from_secs(env.load_parsed_or("WORKER_RECONNECT_DELAY", 5)?),
            status_interval: Duration::from_millis(
                env.load_parsed_or("WORKER_STATUS_INTERVAL", 1000)?,
            ),
        })
    }
}

/// Complete worker configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub broker: BrokerSettings,
    pub smtp: SmtpSettings,
    pub worker: WorkerSettings,
}

impl AppConfig {
    /// Read the configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_loader(&EnvLoader::default())
    }

    /// Read the configuration through an explicit loader.
    pub fn from_loader(env: &EnvLoader) -> Result<Self> {
        Ok(Self {
            broker: BrokerSettings::from_loader(env)?,
            smtp: SmtpSettings::from_loader(env)?,
            worker: WorkerSettings::from_loader(env)?,
        })
    }

    /// Override the queue name, e.g. from a command-line flag.
    pub fn with_queue(mut self, queue: impl Into<String>) -> Self {
        self.broker.queue = queue.into();
        self
    }
}

impl Validate for AppConfig {
    fn validate(&self) -> Result<()> {
        ConfigValidator::required(&self.broker.host, "RABBITMQ_HOST")?;
        ConfigValidator::port(self.broker.port, "RABBITMQ_PORT")?;
        ConfigValidator::required(&self.broker.queue, "RABBITMQ_QUEUE")?;
        ConfigValidator::required(&self.smtp.host, "EMAIL_HOST")?;
        ConfigValidator::port(self.smtp.port, "EMAIL_PORT")?;
        ConfigValidator::sender_address(&self.smtp.from, "EMAIL_FROM")?;
        ConfigValidator::non_zero(self.smtp.timeout, "EMAIL_TIMEOUT")?;
        ConfigValidator::non_zero(self.worker.fetch_timeout, "WORKER_FETCH_TIMEOUT")?;
        ConfigValidator::non_zero(self.worker.status_interval, "WORKER_STATUS_INTERVAL")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal() -> Vec<(&'static str, &'static str)> {
        vec![
            ("RABBITMQ_HOST", "rabbit"),
            ("RABBITMQ_USER", "guest"),
            ("RABBITMQ_PASS", "guest"),
            ("RABBITMQ_QUEUE", "emails"),
            ("EMAIL_HOST", "smtp.example.com"),
            ("EMAIL_USER", "noreply@example.com"),
            ("EMAIL_PASS", "secret"),
        ]
    }

    #[test]
    fn test_defaults_applied() {
        let config = AppConfig::from_loader(&EnvLoader::from_map(minimal())).unwrap();

        assert_eq!(config.broker.port, 5672);
        assert_eq!(config.broker.vhost, "/");
        assert_eq!(config.broker.heartbeat, 30);
        assert_eq!(config.smtp.port, 587);
        assert_eq!(config.smtp.from, "noreply@example.com");
        assert_eq!(config.smtp.from_name, None);
        assert_eq!(config.smtp.security, SmtpSecurity::None);
        assert_eq!(config.smtp.timeout, Duration::from_secs(5));
        assert_eq!(config.worker, WorkerSettings::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_required_key() {
        let vars = minimal()
            .into_iter()
            .filter(|(k, _)| *k != "RABBITMQ_QUEUE");
        let err = AppConfig::from_loader(&EnvLoader::from_map(vars)).unwrap_err();

        assert!(matches!(err, ConfigError::KeyNotFound(ref key) if key == "RABBITMQ_QUEUE"));
    }

    #[test]
    fn test_overrides() {
        let mut vars = minimal();
        vars.extend([
            ("EMAIL_FROM", "mailer@example.com"),
            ("EMAIL_FROM_NAME", "TPTEC"),
            ("EMAIL_SECURITY", "STARTTLS"),
            ("WORKER_STATUS_INTERVAL", "250"),
            ("WORKER_RECONNECT_DELAY", "1"),
        ]);
        let config = AppConfig::from_loader(&EnvLoader::from_map(vars))
            .unwrap()
            .with_queue("priority-emails");

        assert_eq!(config.smtp.from, "mailer@example.com");
        assert_eq!(config.smtp.from_name.as_deref(), Some("TPTEC"));
        assert_eq!(config.smtp.security, SmtpSecurity::StartTls);
        assert_eq!(config.worker.status_interval, Duration::from_millis(250));
        assert_eq!(config.worker.reconnect_delay, Duration::from_secs(1));
        assert_eq!(config.broker.queue, "priority-emails");
    }

    #[test]
    fn test_unknown_security_mode() {
        let mut vars = minimal();
        vars.push(("EMAIL_SECURITY", "carrier-pigeon"));
        let err = AppConfig::from_loader(&EnvLoader::from_map(vars)).unwrap_err();

        assert!(matches!(err, ConfigError::ParseError { ref key, .. } if key == "EMAIL_SECURITY"));
    }

    #[test]
    fn test_validation_rejects_blank_queue_and_zero_port() {
        let config = AppConfig::from_loader(&EnvLoader::from_map(minimal())).unwrap();

        assert!(config.clone().with_queue(" ").validate().is_err());

        let mut zero_port = config;
        zero_port.smtp.port = 0;
        assert!(zero_port.validate().is_err());
    }
}
