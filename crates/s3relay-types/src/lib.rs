//! Shared types for s3relay
//!
//! This crate contains the data structures passed between the transfer
//! engine and the CLI: tasks, per-item results, batch reports and events.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Content type used when the origin server does not send one
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

// ============================================================================
// Task Types
// ============================================================================

/// One URL-to-object transfer, built from a single manifest row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferTask {
    /// 1-based position in the manifest (after skipped rows are removed)
    pub index: usize,
    pub url: String,
    /// Object key the content is stored under
    pub key: String,
}

impl TransferTask {
    pub fn new(index: usize, url: impl Into<String>) -> Self {
        let url = url.into();
        let key = derive_key(&url);

        Self { index, url, key }
    }
}

/// Derive the object key for a URL: its final path segment.
///
/// The query string and fragment never take part in the key and the segment
/// is used as it appears in the URL (no percent-decoding). A URL whose path
/// ends in `/`, or that has no path at all, yields an empty key.
///
/// ```
/// use s3relay_types::derive_key;
///
/// assert_eq!(derive_key("http://host/path/to/file.png?x=1"), "file.png");
/// assert_eq!(derive_key("http://host/path/"), "");
/// ```
pub fn derive_key(url: &str) -> String {
    let without_query = url.split(|c| c == '?' || c == '#').next().unwrap_or("");

    // Drop "scheme://authority"; what remains is the raw path
    let path = match without_query.find("://") {
        Some(pos) => {
            let after_scheme = &without_query[pos + 3..];
            after_scheme.find('/').map_or("", |slash| &after_scheme[slash..])
        }
        None => without_query,
    };

    path.rsplit('/').next().unwrap_or("").to_string()
}

// ============================================================================
// Result Types
// ============================================================================

/// Outcome of a single transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferStatus {
    Succeeded,
    Failed,
}

/// Result of a full fetch-then-store cycle for one task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferResult {
    pub task: TransferTask,
    pub status: TransferStatus,
    /// Bytes fetched (and stored, on success)
    pub bytes: u64,
    pub content_type: Option<String>,
    pub error: Option<String>,
    pub elapsed_ms: u64,
}

impl TransferResult {
    pub fn succeeded(task: TransferTask, bytes: u64, content_type: String, elapsed_ms: u64) -> Self {
        Self {
            task,
            status: TransferStatus::Succeeded,
            bytes,
            content_type: Some(content_type),
            error: None,
            elapsed_ms,
        }
    }

    pub fn failed(task: TransferTask, error: impl fmt::Display, elapsed_ms: u64) -> Self {
        Self {
            task,
            status: TransferStatus::Failed,
            bytes: 0,
            content_type: None,
            error: Some(error.to_string()),
            elapsed_ms,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == TransferStatus::Succeeded
    }
}

/// Summary of a whole manifest run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchReport {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub bytes_transferred: u64,
    pub results: Vec<TransferResult>,
    /// Keys written more than once during the run; the last write wins
    pub overwritten_keys: Vec<String>,
}

impl BatchReport {
    pub fn new(results: Vec<TransferResult>, overwritten_keys: Vec<String>) -> Self {
        let succeeded = results.iter().filter(|r| r.is_success()).count();
        let bytes_transferred = results
            .iter()
            .filter(|r| r.is_success())
            .map(|r| r.bytes)
            .sum();

        Self {
            total: results.len(),
            succeeded,
            failed: results.len() - succeeded,
            bytes_transferred,
            results,
            overwritten_keys,
        }
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    /// Results of the items that failed, in manifest order
    pub fn failures(&self) -> impl Iterator<Item = &TransferResult> {
        self.results.iter().filter(|r| !r.is_success())
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} transferred, {} failed, {} total ({} bytes)",
            self.succeeded, self.failed, self.total, self.bytes_transferred
        )
    }
}

// ============================================================================
// Settings Types
// ============================================================================

/// How the download and upload limiters pace traffic
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThrottleMode {
    /// Charge each phase as a whole and sleep after it completes
    #[default]
    Scoped,
    /// Pace every received chunk through the token bucket
    Streaming,
}

impl FromStr for ThrottleMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "scoped" => Ok(ThrottleMode::Scoped),
            "streaming" => Ok(ThrottleMode::Streaming),
            other => Err(format!(
                "unknown throttle mode '{}' (expected 'scoped' or 'streaming')",
                other
            )),
        }
    }
}

impl fmt::Display for ThrottleMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThrottleMode::Scoped => f.write_str("scoped"),
            ThrottleMode::Streaming => f.write_str("streaming"),
        }
    }
}

/// Connection settings for an S3-compatible bucket
#[derive(Clone, PartialEq, Eq)]
pub struct StoreSettings {
    pub endpoint: String,
    pub region: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub path_style: bool,
}

// Credentials stay out of logs
impl fmt::Debug for StoreSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreSettings")
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .field("bucket", &self.bucket)
            .field("access_key", &"<redacted>")
            .field("secret_key", &"<redacted>")
            .field("path_style", &self.path_style)
            .finish()
    }
}

// ============================================================================
// Event Types
// ============================================================================

/// Events emitted by the driver while a batch runs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransferEvent {
    BatchStarted {
        total: usize,
    },
    TransferStarted {
        index: usize,
        url: String,
        key: String,
    },
    TransferCompleted {
        result: TransferResult,
    },
    TransferFailed {
        result: TransferResult,
    },
    BatchCompleted {
        report: BatchReport,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_key_strips_query() {
        assert_eq!(derive_key("http://host/path/to/file.png?x=1"), "file.png");
        assert_eq!(derive_key("https://host/a/b.tar.gz#frag"), "b.tar.gz");
    }

    #[test]
    fn test_derive_key_trailing_slash_is_empty() {
        assert_eq!(derive_key("http://host/path/to/"), "");
        assert_eq!(derive_key("http://host"), "");
        assert_eq!(derive_key("http://host/"), "");
    }

    #[test]
    fn test_derive_key_relative_input() {
        assert_eq!(derive_key("files/report.pdf?sig=abc"), "report.pdf");
        assert_eq!(derive_key("report.pdf"), "report.pdf");
    }

    #[test]
    fn test_derive_key_keeps_encoding() {
        assert_eq!(derive_key("http://host/dir/a%20b.bin"), "a%20b.bin");
    }

    #[test]
    fn test_derive_key_keeps_raw_segment() {
        assert_eq!(derive_key("http://host/docs/résumé.pdf"), "résumé.pdf");
        assert_eq!(derive_key("http://host/docs/my file.pdf"), "my file.pdf");
        assert_eq!(derive_key("http://host/docs/a\\b.pdf"), "a\\b.pdf");
    }

    #[test]
    fn test_derive_key_ignores_slashes_after_path() {
        assert_eq!(derive_key("http://host?next=http://other/x.bin"), "");
        assert_eq!(derive_key("http://host/a.bin#part/2"), "a.bin");
    }

    #[test]
    fn test_task_new_derives_key() {
        let task = TransferTask::new(3, "http://x/a.bin");
        assert_eq!(task.index, 3);
        assert_eq!(task.key, "a.bin");
    }

    #[test]
    fn test_batch_report_counts() {
        let ok = TransferResult::succeeded(
            TransferTask::new(1, "http://x/a.bin"),
            10,
            DEFAULT_CONTENT_TYPE.to_string(),
            5,
        );
        let bad = TransferResult::failed(TransferTask::new(2, "http://x/b.bin"), "boom", 1);
        let report = BatchReport::new(vec![ok, bad], vec![]);

        assert_eq!(report.total, 2);
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.bytes_transferred, 10);
        assert!(report.has_failures());
        assert_eq!(report.failures().next().unwrap().task.key, "b.bin");
    }

    #[test]
    fn test_throttle_mode_parse() {
        assert_eq!("Scoped".parse::<ThrottleMode>(), Ok(ThrottleMode::Scoped));
        assert_eq!(" streaming ".parse::<ThrottleMode>(), Ok(ThrottleMode::Streaming));
        assert!("bursty".parse::<ThrottleMode>().is_err());
        assert!("stream".parse::<ThrottleMode>().is_err());
        assert!("chunked".parse::<ThrottleMode>().is_err());
    }

    #[test]
    fn test_store_settings_debug_redacts_secrets() {
        let settings = StoreSettings {
            endpoint: "https://example.r2.cloudflarestorage.com".into(),
            region: "auto".into(),
            bucket: "media".into(),
            access_key: "AKIA-SECRET".into(),
            secret_key: "very-secret".into(),
            path_style: false,
        };
        let printed = format!("{:?}", settings);
        assert!(!printed.contains("AKIA-SECRET"));
        assert!(!printed.contains("very-secret"));
        assert!(printed.contains("media"));
    }

    #[test]
    fn test_event_serializes_with_tag() {
        let event = TransferEvent::BatchStarted { total: 2 };
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"type":"batch_started","total":2}"#);
    }
}
