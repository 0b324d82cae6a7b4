//! Manifest reading: one URL per row, first column, no header

use crate::error::RelayError;
use s3relay_types::TransferTask;
use std::collections::HashMap;
use std::io;
use std::path::Path;
use tracing::{debug, error, info, warn};

/// Default manifest location, relative to the working directory
pub const DEFAULT_MANIFEST: &str = "file.csv";

/// Read the manifest at `path` into transfer tasks
pub async fn read_manifest(path: &Path) -> Result<Vec<TransferTask>, RelayError> {
    let content = match tokio::fs::read(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(RelayError::FileNotFound(path.to_path_buf()))
        }
        Err(e) => return Err(e.into()),
    };

    parse_manifest(content.as_slice())
}

/// Parse manifest rows from any reader.
///
/// Rows whose first field is empty (or only whitespace) are skipped, as are
/// rows whose URL is not valid UTF-8. Extra columns are ignored.
pub fn parse_manifest<R: io::Read>(reader: R) -> Result<Vec<TransferTask>, RelayError> {
    let mut rows = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut tasks = Vec::new();
    for (line, record) in rows.byte_records().enumerate() {
        let record = record?;
        match record.get(0).map(std::str::from_utf8) {
            Some(Ok(url)) if !url.is_empty() => {
                tasks.push(TransferTask::new(tasks.len() + 1, url));
            }
            Some(Err(e)) => warn!(
                "Skipping manifest row {}: URL is not valid UTF-8 ({})",
                line + 1,
                e
            ),
            _ => debug!("Skipping manifest row {} with empty URL", line + 1),
        }
    }

    Ok(tasks)
}

/// Load tasks, reporting any problem and falling back to an empty list.
///
/// A missing or malformed manifest is not fatal: the run simply has nothing
/// to do.
pub async fn load_tasks(path: &Path) -> Vec<TransferTask> {
    match read_manifest(path).await {
        Ok(tasks) => {
            info!("Loaded {} task(s) from {}", tasks.len(), path.display());
            tasks
        }
        Err(e) => {
            error!("{}", e);
            Vec::new()
        }
    }
}

/// Keys claimed by more than one task, in first-seen order
pub fn duplicate_keys(tasks: &[TransferTask]) -> Vec<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut order = Vec::new();
    for task in tasks {
        let count = counts.entry(task.key.as_str()).or_insert(0);
        *count += 1;
        if *count == 2 {
            order.push(task.key.clone());
        }
    }
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_empty_rows_skipped() {
        let csv = "http://x/a.bin\n\"\"\nhttp://x/b.bin\n";
        let tasks = assert_ok!(parse_manifest(csv.as_bytes()));

        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].url, "http://x/a.bin");
        assert_eq!(tasks[1].url, "http://x/b.bin");
        assert_eq!(tasks[1].index, 2);
    }

    #[test]
    fn test_blank_first_field_skipped() {
        let csv = "http://x/a.bin,first\n  ,orphan\n\nhttp://x/b.bin\n";
        let tasks = assert_ok!(parse_manifest(csv.as_bytes()));
        let keys: Vec<_> = tasks.iter().map(|t| t.key.as_str()).collect();
        assert_eq!(keys, vec!["a.bin", "b.bin"]);
    }

    #[test]
    fn test_whitespace_trimmed() {
        let tasks = assert_ok!(parse_manifest("  http://x/dir/c.png?sig=1  \n".as_bytes()));
        assert_eq!(tasks[0].url, "http://x/dir/c.png?sig=1");
        assert_eq!(tasks[0].key, "c.png");
    }

    #[test]
    fn test_invalid_utf8_row_skipped() {
        let csv: &[u8] = b"http://x/a.bin\nhttp://x/b.bin\nhttp://x/\xff\xfe.bin\nhttp://x/c.bin\n";
        let tasks = assert_ok!(parse_manifest(csv));

        let keys: Vec<_> = tasks.iter().map(|t| t.key.as_str()).collect();
        assert_eq!(keys, vec!["a.bin", "b.bin", "c.bin"]);
        assert_eq!(tasks[2].index, 3);
    }

    #[tokio::test]
    async fn test_read_manifest_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "http://x/a.bin").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "http://x/b.bin").unwrap();

        let tasks = assert_ok!(read_manifest(file.path()).await);
        assert_eq!(tasks.len(), 2);
    }

    #[tokio::test]
    async fn test_missing_manifest_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("file.csv");

        let err = assert_err!(read_manifest(&path).await);
        assert!(matches!(err, RelayError::FileNotFound(p) if p == path));

        assert!(load_tasks(&path).await.is_empty());
    }

    #[test]
    fn test_duplicate_keys() {
        let tasks = vec![
            TransferTask::new(1, "http://a/x/logo.png"),
            TransferTask::new(2, "http://b/y/logo.png"),
            TransferTask::new(3, "http://c/z/other.png"),
            TransferTask::new(4, "http://d/logo.png"),
        ];
        assert_eq!(duplicate_keys(&tasks), vec!["logo.png"]);
    }
}
