// Courier - a queue-driven email dispatch worker
//
// Consumes email jobs from RabbitMQ, validates them, resolves attachments and
// delivers them over SMTP, acknowledging each message once its fate is known.

pub mod consumer;
pub mod dispatch;
pub mod error;
pub mod stats;
pub mod status;
pub mod worker;

pub use consumer::{ConsumerConfig, ConsumerState, EmailConsumer};
pub use dispatch::{Dispatch, Dispatcher};
pub use error::{ConsumerError, WorkerError};
pub use stats::{StatsSnapshot, WorkerStats};
pub use status::StatusBoard;

// Re-export the component crates
pub use courier_config;
pub use courier_log;
pub use courier_mail;
pub use courier_messaging;

// Prelude for common imports
pub mod prelude {
    pub use crate::{
        ConsumerConfig, ConsumerError, Dispatcher, EmailConsumer, StatsSnapshot, WorkerError,
        WorkerStats,
    };
    pub use courier_mail::prelude::*;
    pub use courier_messaging::prelude::*;
}
