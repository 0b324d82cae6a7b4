//! s3relay core - throttled download-and-store engine
//!
//! Reads a manifest of URLs, downloads each resource and writes it to an
//! S3-compatible bucket, pacing the download and upload channels
//! independently.

mod config;
pub mod engine;
mod error;
mod manifest;
mod store;

pub use config::*;
pub use engine::{BatchDriver, FetchedResource, RateLimiter, ScopeMeter, TransferPipeline};
pub use error::*;
pub use manifest::*;
pub use store::*;

pub use s3relay_types::{
    derive_key, BatchReport, StoreSettings, ThrottleMode, TransferEvent, TransferResult,
    TransferStatus, TransferTask, DEFAULT_CONTENT_TYPE,
};

use std::path::Path;
use std::sync::Arc;
use tokio::sync::broadcast;

/// The main s3relay instance
pub struct RelayCore {
    driver: BatchDriver,
    /// Event broadcaster
    event_tx: broadcast::Sender<TransferEvent>,
}

impl RelayCore {
    /// Create an instance writing to the configured S3 bucket
    pub fn new(config: RelayConfig) -> Result<Self, RelayError> {
        let store = Arc::new(S3Store::new(&config.store)?);
        Self::with_store(config, store)
    }

    /// Create an instance writing to an arbitrary store
    pub fn with_store(config: RelayConfig, store: Arc<dyn ObjectStore>) -> Result<Self, RelayError> {
        config.validate()?;

        let (event_tx, _) = broadcast::channel(1000);
        let pipeline = TransferPipeline::new(&config, store)?;
        let driver = BatchDriver::new(pipeline, config.item_delay, event_tx.clone());

        Ok(Self {
            driver,
            event_tx,
        })
    }

    /// Subscribe to transfer events
    pub fn subscribe(&self) -> broadcast::Receiver<TransferEvent> {
        self.event_tx.subscribe()
    }

    /// Transfer the given tasks in order
    pub async fn run(&self, tasks: &[TransferTask]) -> BatchReport {
        self.driver.run(tasks).await
    }

    /// Load the manifest at `path` and transfer its tasks.
    ///
    /// A missing manifest is reported and yields an empty report.
    pub async fn run_manifest(&self, path: &Path) -> BatchReport {
        let tasks = load_tasks(path).await;
        self.run(&tasks).await
    }
}
