//! Transfer pipeline - fetch one resource, then store it
//!
//! The download and upload phases each go through their own limiter. How
//! they are paced depends on the configured [`ThrottleMode`]:
//! - `Scoped`: each phase is one limiter scope, the delay follows the phase
//! - `Streaming`: every received chunk is paced through the token bucket,
//!   the upload acquires its full size before the put

use crate::config::RelayConfig;
use crate::engine::rate_limiter::{RateLimiter, ScopeMeter};
use crate::error::RelayError;
use crate::store::ObjectStore;
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use reqwest::Client;
use s3relay_types::{ThrottleMode, TransferResult, TransferTask, DEFAULT_CONTENT_TYPE};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Upper bound for preallocating a body from its Content-Length
const MAX_PREALLOCATION: u64 = 64 * 1024 * 1024;

/// Body and content type of a fetched resource
#[derive(Debug, Clone)]
pub struct FetchedResource {
    pub body: Bytes,
    pub content_type: String,
}

/// How bytes received during a fetch are charged
enum Pacing<'a> {
    Scope(ScopeMeter),
    PerChunk(&'a RateLimiter),
}

impl Pacing<'_> {
    async fn charge(&self, bytes: u64) {
        match self {
            Pacing::Scope(meter) => meter.record(bytes),
            Pacing::PerChunk(limiter) => limiter.acquire(bytes).await,
        }
    }
}

/// Fetches resources over HTTP and writes them to an object store
pub struct TransferPipeline {
    client: Client,
    download_limiter: RateLimiter,
    upload_limiter: RateLimiter,
    store: Arc<dyn ObjectStore>,
    mode: ThrottleMode,
}

impl TransferPipeline {
    /// Create a pipeline with one limiter per phase
    pub fn new(config: &RelayConfig, store: Arc<dyn ObjectStore>) -> Result<Self, RelayError> {
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| RelayError::Configuration(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            download_limiter: RateLimiter::new(config.download_rate)?,
            upload_limiter: RateLimiter::new(config.upload_rate)?,
            store,
            mode: config.throttle_mode,
        })
    }

    pub fn mode(&self) -> ThrottleMode {
        self.mode
    }

    /// Where objects end up
    pub fn store_location(&self) -> String {
        self.store.location()
    }

    /// Download `url` with a single GET, paced by the download limiter
    pub async fn fetch(&self, url: &str) -> Result<FetchedResource, RelayError> {
        match self.mode {
            ThrottleMode::Scoped => {
                self.download_limiter
                    .with_scope(|meter| self.fetch_paced(url, Pacing::Scope(meter)))
                    .await
            }
            ThrottleMode::Streaming => {
                self.fetch_paced(url, Pacing::PerChunk(&self.download_limiter))
                    .await
            }
        }
    }

    async fn fetch_paced(&self, url: &str, pacing: Pacing<'_>) -> Result<FetchedResource, RelayError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| RelayError::fetch(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RelayError::fetch(url, format!("HTTP {}", status)));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());

        let capacity = response.content_length().unwrap_or(0).min(MAX_PREALLOCATION);
        let mut body = BytesMut::with_capacity(capacity as usize);

        // Stream and pace chunks
        let mut stream = response.bytes_stream();
        while let Some(chunk_result) = stream.next().await {
            let chunk = chunk_result.map_err(|e| RelayError::fetch(url, e))?;
            pacing.charge(chunk.len() as u64).await;
            body.extend_from_slice(&chunk);
        }

        debug!("Fetched {} bytes from {}", body.len(), url);

        Ok(FetchedResource {
            body: body.freeze(),
            content_type,
        })
    }

    /// Store `body` under `key`, paced by the upload limiter
    pub async fn store(&self, body: Bytes, key: &str, content_type: &str) -> Result<(), RelayError> {
        let len = body.len() as u64;

        let result = match self.mode {
            ThrottleMode::Scoped => {
                self.upload_limiter
                    .with_scope(|meter| async move {
                        meter.record(len);
                        self.store.put(key, body, content_type).await
                    })
                    .await
            }
            ThrottleMode::Streaming => {
                self.upload_limiter.acquire(len).await;
                self.store.put(key, body, content_type).await
            }
        };

        result.map_err(|e| match e {
            store_err @ RelayError::Store { .. } => store_err,
            other => RelayError::store(key, other),
        })
    }

    /// Run the full fetch-then-store cycle for one task.
    ///
    /// Never fails: errors are captured in the returned result.
    pub async fn run(&self, task: &TransferTask) -> TransferResult {
        let started = Instant::now();
        let outcome = self.transfer(task).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(done) => TransferResult::succeeded(
                task.clone(),
                done.body_len,
                done.content_type,
                elapsed_ms,
            ),
            Err(e) => TransferResult::failed(task.clone(), e, elapsed_ms),
        }
    }

    async fn transfer(&self, task: &TransferTask) -> Result<Transferred, RelayError> {
        if task.key.is_empty() {
            return Err(RelayError::InvalidKey {
                url: task.url.clone(),
            });
        }

        let fetched = self.fetch(&task.url).await?;
        let body_len = fetched.body.len() as u64;
        info!(
            "Downloaded {} ({} bytes, {})",
            task.url, body_len, fetched.content_type
        );

        // The body is dropped if the put fails; nothing is cleaned up remotely
        self.store(fetched.body, &task.key, &fetched.content_type)
            .await?;
        info!("Stored {} as '{}'", task.url, task.key);

        Ok(Transferred {
            body_len,
            content_type: fetched.content_type,
        })
    }
}

struct Transferred {
    body_len: u64,
    content_type: String,
}
