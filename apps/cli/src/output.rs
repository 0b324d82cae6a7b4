//! Output formatting utilities

use crate::OutputFormat;
use console::style;
use s3relay_types::{BatchReport, TransferStatus};

/// Print the batch report in the specified format
pub fn print_report(report: &BatchReport, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(report)?);
        }
        OutputFormat::Table => {
            use tabled::{Table, Tabled};

            #[derive(Tabled)]
            struct ResultRow {
                index: usize,
                key: String,
                status: String,
                size: String,
                time: String,
                error: String,
            }

            let rows: Vec<ResultRow> = report
                .results
                .iter()
                .map(|r| ResultRow {
                    index: r.task.index,
                    key: r.task.key.clone(),
                    status: match r.status {
                        TransferStatus::Succeeded => "ok".to_string(),
                        TransferStatus::Failed => "failed".to_string(),
                    },
                    size: format_bytes(r.bytes),
                    time: format_elapsed(r.elapsed_ms),
                    error: r.error.clone().unwrap_or_default(),
                })
                .collect();

            println!("{}", Table::new(rows));
            println!("{}", report);
        }
        OutputFormat::Human => {
            println!();
            println!(
                "{} transferred, {} failed, {} total ({})",
                style(report.succeeded).green().bold(),
                style(report.failed).red().bold(),
                style(report.total).bold(),
                format_bytes(report.bytes_transferred)
            );

            for failure in report.failures() {
                println!(
                    "  {} {}: {}",
                    style("✗").red(),
                    failure.task.url,
                    failure.error.as_deref().unwrap_or("unknown error")
                );
            }

            for key in &report.overwritten_keys {
                println!(
                    "  {} key {} was written more than once",
                    style("!").yellow(),
                    style(key).cyan()
                );
            }
        }
    }
    Ok(())
}

/// Format bytes as human-readable
pub fn format_bytes(bytes: u64) -> String {
    human_bytes::human_bytes(bytes as f64)
}

/// Format a duration in milliseconds as human-readable
pub fn format_elapsed(millis: u64) -> String {
    let seconds = millis / 1000;
    if seconds == 0 {
        return format!("{}ms", millis);
    }

    let minutes = seconds / 60;
    let secs = seconds % 60;

    if minutes > 0 {
        format!("{}m {}s", minutes, secs)
    } else {
        format!("{}.{}s", secs, (millis % 1000) / 100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(250), "250ms");
        assert_eq!(format_elapsed(1_500), "1.5s");
        assert_eq!(format_elapsed(125_000), "2m 5s");
    }
}
