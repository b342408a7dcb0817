//! Wiring from configuration to a running consumer.

use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use courier_config::{AppConfig, BrokerSettings, SmtpSettings, WorkerSettings};
use courier_mail::{EmailService, FileContentResolver, ResolverConfig, SmtpConfig, SmtpMailTransport, SmtpSecurity};
use courier_messaging::RabbitMqConfig;
use courier_messaging::rabbitmq::RabbitMqBroker;

use crate::consumer::{ConsumerConfig, EmailConsumer};
use crate::dispatch::Dispatcher;
use crate::error::WorkerError;
use crate::stats::WorkerStats;

pub fn smtp_config(settings: &SmtpSettings) -> SmtpConfig {
    let security = match settings.security {
        courier_config::SmtpSecurity::None => SmtpSecurity::None,
        courier_config::SmtpSecurity::StartTls => SmtpSecurity::StartTls,
        courier_config::SmtpSecurity::Tls => SmtpSecurity::Tls,
    };

    let config = SmtpConfig::new(&settings.host, &settings.from)
        .port(settings.port)
        .credentials(&settings.user, &settings.password)
        .security(security)
        .timeout(settings.timeout);
    match &settings.from_name {
        Some(name) => config.from_name(name),
        None => config,
    }
}

pub fn broker_config(settings: &BrokerSettings) -> RabbitMqConfig {
    RabbitMqConfig::new(&settings.host, settings.port)
        .with_credentials(&settings.user, &settings.password)
        .with_vhost(&settings.vhost)
        .with_heartbeat(Duration::from_secs(u64::from(settings.heartbeat)))
}

pub fn resolver_config(settings: &WorkerSettings) -> ResolverConfig {
    ResolverConfig::new(&settings.attachment_dir).with_timeout(settings.fetch_timeout)
}

pub fn consumer_config(config: &AppConfig) -> ConsumerConfig {
    ConsumerConfig::new(&config.broker.queue)
        .with_reconnect_delay(config.worker.reconnect_delay)
        .with_status_interval(config.worker.status_interval)
}

/// Build the RabbitMQ-backed consumer described by `config`.
///
/// Nothing is contacted here: the SMTP session opens on the first send and
/// the broker connection when the consumer starts running.
pub fn build_consumer(config: &AppConfig) -> Result<EmailConsumer, WorkerError> {
    let transport = SmtpMailTransport::new(&smtp_config(&config.smtp))?;
    let resolver = FileContentResolver::new(resolver_config(&config.worker))?;
    let service = EmailService::new(transport, Arc::new(resolver));

    let dispatcher = Dispatcher::new(Arc::new(service), Arc::new(WorkerStats::new()));
    let broker = RabbitMqBroker::new(broker_config(&config.broker));

    info!(
        broker = %broker_config(&config.broker).redacted_uri(),
        queue = %config.broker.queue,
        smtp_host = %config.smtp.host,
        smtp_port = config.smtp.port,
        "Worker configured"
    );

    Ok(EmailConsumer::new(Arc::new(broker), dispatcher, consumer_config(config)))
}
