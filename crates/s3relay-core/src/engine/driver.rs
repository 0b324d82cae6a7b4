//! Batch driver - runs every task through the pipeline, in order
//!
//! A failing task is logged and reported, never propagated: the remaining
//! tasks still run.

use crate::engine::pipeline::TransferPipeline;
use s3relay_types::{BatchReport, TransferEvent, TransferTask};
use std::collections::HashSet;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

/// Sequential driver over a list of tasks
pub struct BatchDriver {
    pipeline: TransferPipeline,
    /// Pause between consecutive items
    item_delay: Duration,
    event_tx: broadcast::Sender<TransferEvent>,
}

impl BatchDriver {
    pub fn new(
        pipeline: TransferPipeline,
        item_delay: Duration,
        event_tx: broadcast::Sender<TransferEvent>,
    ) -> Self {
        Self {
            pipeline,
            item_delay,
            event_tx,
        }
    }

    /// Emit an event; having no subscriber is fine
    fn emit(&self, event: TransferEvent) {
        let _ = self.event_tx.send(event);
    }

    /// Transfer every task and report the outcome
    pub async fn run(&self, tasks: &[TransferTask]) -> BatchReport {
        let total = tasks.len();
        info!(
            "Starting batch of {} task(s) into {} ({} throttling)",
            total,
            self.pipeline.store_location(),
            self.pipeline.mode()
        );
        self.emit(TransferEvent::BatchStarted { total });

        let mut results = Vec::with_capacity(total);
        let mut written_keys = HashSet::new();
        let mut overwritten_keys = Vec::new();

        for (position, task) in tasks.iter().enumerate() {
            // Courtesy pause between items, independent of their size
            if position > 0 && !self.item_delay.is_zero() {
                tokio::time::sleep(self.item_delay).await;
            }

            info!("[{}/{}] {} -> '{}'", position + 1, total, task.url, task.key);
            self.emit(TransferEvent::TransferStarted {
                index: task.index,
                url: task.url.clone(),
                key: task.key.clone(),
            });

            let result = self.pipeline.run(task).await;

            if result.is_success() {
                if !written_keys.insert(task.key.clone()) {
                    warn!(
                        "Key '{}' was already written in this batch; {} overwrote it",
                        task.key, task.url
                    );
                    if !overwritten_keys.contains(&task.key) {
                        overwritten_keys.push(task.key.clone());
                    }
                }
                self.emit(TransferEvent::TransferCompleted {
                    result: result.clone(),
                });
            } else {
                error!(
                    "Transfer failed for {}: {}",
                    task.url,
                    result.error.as_deref().unwrap_or("unknown error")
                );
                self.emit(TransferEvent::TransferFailed {
                    result: result.clone(),
                });
            }

            results.push(result);
        }

        let report = BatchReport::new(results, overwritten_keys);
        info!("Batch complete: {}", report);
        self.emit(TransferEvent::BatchCompleted {
            report: report.clone(),
        });

        report
    }
}
