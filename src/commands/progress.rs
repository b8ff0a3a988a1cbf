// src/commands/progress.rs
//! Terminal progress display for installs and uninstalls
//!
//! An overall bar counts finished packages; the spinner line below it shows
//! what is currently being worked on. Without a terminal on stderr the bars
//! would be hidden, so progress goes to the log instead.

use foampm::progress::{LogProgress, ProgressTracker};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::io::IsTerminal;
use std::sync::Arc;
use std::time::Duration;

/// Progress tracker for a command run
pub fn tracker(operation: &str) -> Arc<dyn ProgressTracker> {
    tracker_for(operation, std::io::stderr().is_terminal())
}

fn tracker_for(operation: &str, interactive: bool) -> Arc<dyn ProgressTracker> {
    if interactive {
        Arc::new(CliProgress::new(operation))
    } else {
        Arc::new(LogProgress::new(operation.to_lowercase()))
    }
}

/// Progress bar tracker used by the CLI
pub struct CliProgress {
    // Keeps both bars attached to the same terminal region
    _multi: MultiProgress,
    overall: ProgressBar,
    status: ProgressBar,
}

impl CliProgress {
    pub fn new(operation: &str) -> Self {
        let multi = MultiProgress::new();

        let overall = ProgressBar::new(0);
        overall.set_style(
            ProgressStyle::default_bar()
                .template("{msg} ({pos}/{len}) [{bar:40.green/dim}] {percent}%")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("##-"),
        );
        overall.set_message(operation.to_string());

        let status = ProgressBar::new_spinner();
        status.set_style(
            ProgressStyle::default_spinner()
                .template("  {spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        status.enable_steady_tick(Duration::from_millis(100));

        let overall = multi.add(overall);
        let status = multi.add(status);

        Self {
            _multi: multi,
            overall,
            status,
        }
    }
}

impl ProgressTracker for CliProgress {
    fn set_message(&self, message: &str) {
        self.status.set_message(message.to_string());
    }

    fn set_length(&self, length: u64) {
        self.overall.set_length(length);
    }

    fn increment(&self, amount: u64) {
        self.overall.inc(amount);
    }

    fn position(&self) -> u64 {
        self.overall.position()
    }

    fn length(&self) -> u64 {
        self.overall.length().unwrap_or(0)
    }

    fn finish_with_message(&self, message: &str) {
        self.status.finish_and_clear();
        self.overall.finish_with_message(message.to_string());
    }

    fn finish_with_error(&self, message: &str) {
        self.status.finish_and_clear();
        self.overall.abandon_with_message(message.to_string());
    }

    fn is_finished(&self) -> bool {
        self.overall.is_finished()
    }
}
