//! Courier worker - consumes email jobs from RabbitMQ and sends them over SMTP.
//!
//! Exit status: `0` on Ctrl-C, `1` when the broker is unreachable at startup,
//! `2` on configuration errors.

use clap::Parser;
use colored::Colorize;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

use courier::WorkerError;
use courier::worker::build_consumer;
use courier_config::{AppConfig, Validate};

/// Courier - queue-driven email dispatch worker
#[derive(Parser)]
#[command(name = "courier-worker")]
#[command(author = "Pegasus Heavy Industries LLC")]
#[command(version)]
#[command(about = "Consumes email jobs from RabbitMQ and delivers them over SMTP")]
struct Cli {
    /// Read environment variables from this file instead of ./.env
    #[arg(long, value_name = "PATH")]
    env_file: Option<PathBuf>,

    /// Queue to consume, overriding RABBITMQ_QUEUE
    #[arg(long, env = "COURIER_QUEUE")]
    queue: Option<String>,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,
}

fn load_config(cli: &Cli) -> Result<AppConfig, WorkerError> {
    let mut config = AppConfig::from_env()?;
    if let Some(queue) = &cli.queue {
        config = config.with_queue(queue);
    }
    config.validate()?;
    Ok(config)
}

async fn run(cli: Cli) -> Result<(), WorkerError> {
    let config = load_config(&cli)?;
    let mut consumer = build_consumer(&config)?;

    println!(
        "{} {} {}",
        "✉".bright_cyan().bold(),
        "Courier worker listening on".bold(),
        config.broker.queue.bright_white().bold()
    );

    tokio::select! {
        result = consumer.run() => {
            let Err(e) = result;
            Err(e.into())
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown requested");
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    if cli.no_color {
        colored::control::set_override(false);
    }

    // Before logging starts, so COURIER_LOG_* from the file take effect.
    let dotenv = courier_config::load_dotenv(cli.env_file.as_deref());
    let _log_guard = courier_log::init();

    let result = match dotenv {
        Ok(()) => run(cli).await,
        Err(e) => Err(e.into()),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Worker stopped");
            eprintln!("{} {}", "✗".red().bold(), e.to_string().red());
            ExitCode::from(e.exit_code())
        }
    }
}
