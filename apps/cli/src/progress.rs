//! Progress display for a batch run

use crate::output::{format_bytes, format_elapsed};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use s3relay_types::TransferEvent;

/// Item-level progress bar driven by transfer events
pub struct BatchProgress {
    bar: ProgressBar,
}

impl BatchProgress {
    /// Create the display; a hidden bar swallows everything when not `visible`
    pub fn new(visible: bool) -> Self {
        let bar = if visible {
            ProgressBar::new(0)
        } else {
            ProgressBar::hidden()
        };

        if let Ok(bar_style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            bar.set_style(bar_style.progress_chars("█▓▒░  "));
        }

        Self { bar }
    }

    /// Update the display from an event. Returns true once the batch is over.
    pub fn handle_event(&self, event: &TransferEvent) -> bool {
        match event {
            TransferEvent::BatchStarted { total } => {
                self.bar.set_length(*total as u64);
            }

            TransferEvent::TransferStarted { key, .. } => {
                self.bar.set_message(key.clone());
            }

            TransferEvent::TransferCompleted { result } => {
                self.bar.println(format!(
                    "{} {} → {} ({}, {})",
                    style("✓").green().bold(),
                    result.task.url,
                    style(&result.task.key).cyan(),
                    format_bytes(result.bytes),
                    format_elapsed(result.elapsed_ms)
                ));
                self.bar.inc(1);
            }

            TransferEvent::TransferFailed { result } => {
                self.bar.println(format!(
                    "{} {}: {}",
                    style("✗").red().bold(),
                    result.task.url,
                    result.error.as_deref().unwrap_or("Unknown error")
                ));
                self.bar.inc(1);
            }

            TransferEvent::BatchCompleted { .. } => {
                self.bar.finish_and_clear();
                return true;
            }
        }

        false
    }
}
