//! CLI command implementations

use crate::output::print_report;
use crate::progress::BatchProgress;
use crate::OutputFormat;
use anyhow::Result;
use console::style;
use s3relay_core::{duplicate_keys, load_tasks, RelayConfig, RelayCore};
use s3relay_types::BatchReport;
use serde::Serialize;
use std::path::Path;
use tokio::sync::broadcast::error::RecvError;

// ============================================================================
// Run
// ============================================================================

pub async fn run(config: RelayConfig, manifest: &Path, format: OutputFormat) -> Result<BatchReport> {
    let core = RelayCore::new(config)?;

    // Progress display follows the event stream until the batch completes
    let mut events = core.subscribe();
    let progress = BatchProgress::new(matches!(format, OutputFormat::Human));
    let display = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    if progress.handle_event(&event) {
                        break;
                    }
                }
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    });

    let report = core.run_manifest(manifest).await;
    let _ = display.await;

    print_report(&report, format)?;
    Ok(report)
}

// ============================================================================
// Dry run
// ============================================================================

#[derive(Serialize)]
struct PlannedTransfer<'a> {
    index: usize,
    url: &'a str,
    key: &'a str,
    skipped: bool,
}

#[derive(Serialize)]
struct Plan<'a> {
    transfers: Vec<PlannedTransfer<'a>>,
    duplicate_keys: Vec<String>,
}

pub async fn plan(manifest: &Path, format: OutputFormat) -> Result<()> {
    let tasks = load_tasks(manifest).await;
    let duplicates = duplicate_keys(&tasks);

    let plan = Plan {
        transfers: tasks
            .iter()
            .map(|t| PlannedTransfer {
                index: t.index,
                url: &t.url,
                key: &t.key,
                skipped: t.key.is_empty(),
            })
            .collect(),
        duplicate_keys: duplicates,
    };

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&plan)?);
        }
        OutputFormat::Table => {
            use tabled::{Table, Tabled};

            #[derive(Tabled)]
            struct PlanRow {
                index: usize,
                key: String,
                url: String,
            }

            let rows: Vec<PlanRow> = plan
                .transfers
                .iter()
                .map(|t| PlanRow {
                    index: t.index,
                    key: if t.skipped {
                        "(none)".to_string()
                    } else {
                        t.key.to_string()
                    },
                    url: t.url.to_string(),
                })
                .collect();

            println!("{}", Table::new(rows));
        }
        OutputFormat::Human => {
            if plan.transfers.is_empty() {
                println!("{}", style("Nothing to transfer").dim());
                return Ok(());
            }

            for t in &plan.transfers {
                if t.skipped {
                    println!(
                        "{} {:>3}. {} {}",
                        style("!").yellow().bold(),
                        t.index,
                        t.url,
                        style("(no key, will fail)").yellow()
                    );
                } else {
                    println!(
                        "{} {:>3}. {} → {}",
                        style("·").dim(),
                        t.index,
                        t.url,
                        style(t.key).cyan()
                    );
                }
            }
        }
    }

    if !matches!(format, OutputFormat::Json) {
        for key in &plan.duplicate_keys {
            println!(
                "{} key {} is used more than once; the last upload wins",
                style("!").yellow().bold(),
                style(key).cyan()
            );
        }
        println!();
        println!(
            "{} transfer(s) planned",
            style(plan.transfers.len()).bold()
        );
    }

    Ok(())
}
