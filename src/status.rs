//! Operator-facing status output.

use colored::Colorize;
use std::fmt::Display;
use tracing::info;

use crate::stats::StatsSnapshot;

/// Prints the running totals whenever they change.
#[derive(Debug)]
pub struct StatusBoard {
    queue: String,
    terminal: bool,
    last: Option<StatsSnapshot>,
}

impl StatusBoard {
    pub fn new(queue: impl Into<String>) -> Self {
        Self {
            queue: queue.into(),
            terminal: true,
            last: None,
        }
    }

    /// Turn terminal output on or off. The tracing event is always emitted.
    pub fn with_terminal(mut self, terminal: bool) -> Self {
        self.terminal = terminal;
        self
    }

    /// Report `snapshot` if it differs from the last one reported.
    /// Returns whether anything was reported.
    pub fn refresh(&mut self, snapshot: StatsSnapshot) -> bool {
        if self.last == Some(snapshot) {
            return false;
        }
        self.last = Some(snapshot);

        info!(
            queue = %self.queue,
            consumed = snapshot.consumed,
            successful = snapshot.successful,
            failed = snapshot.failed,
            total = snapshot.total,
            "Worker status"
        );
        if self.terminal {
            println!("{}", self.render(&snapshot));
        }
        true
    }

    /// Tell the operator the broker connection failed.
    pub fn broker_error(&self, error: &dyn Display) {
        if self.terminal {
            println!(
                "  {} {}",
                "✗".red().bold(),
                format!("Broker error on '{}': {}", self.queue, error).red()
            );
        }
    }

    fn render(&self, snapshot: &StatsSnapshot) -> String {
        format!(
            "  {} {}  {} {}  {} {}  {} {}",
            "Consumed:".bright_cyan().bold(),
            snapshot.consumed,
            "Sent:".green().bold(),
            snapshot.successful,
            "Failed:".red().bold(),
            snapshot.failed,
            "Total:".bright_white().bold(),
            snapshot.total,
        )
    }
}
