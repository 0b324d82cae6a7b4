//! Error types for s3relay core

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur in s3relay core
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Failed to fetch {url}: {cause}")]
    Fetch { url: String, cause: String },

    #[error("Failed to store object '{key}': {cause}")]
    Store { key: String, cause: String },

    #[error("Cannot derive an object key from URL: {url}")]
    InvalidKey { url: String },

    #[error("Manifest not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Manifest error: {0}")]
    Manifest(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RelayError {
    pub(crate) fn fetch(url: &str, cause: impl std::fmt::Display) -> Self {
        RelayError::Fetch {
            url: url.to_string(),
            cause: cause.to_string(),
        }
    }

    pub(crate) fn store(key: &str, cause: impl std::fmt::Display) -> Self {
        RelayError::Store {
            key: key.to_string(),
            cause: cause.to_string(),
        }
    }
}
