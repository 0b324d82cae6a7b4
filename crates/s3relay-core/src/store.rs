//! Object store backends
//!
//! The pipeline only needs one capability from a store: put a body under a
//! key. `S3Store` talks to any S3-compatible endpoint (AWS, Cloudflare R2,
//! MinIO), `MemoryStore` keeps objects in process.

use crate::error::RelayError;
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use s3::creds::Credentials;
use s3::region::Region;
use s3::Bucket;
use s3relay_types::StoreSettings;
use std::collections::HashMap;
use tracing::debug;

/// Destination for fetched content
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `body` under `key`, replacing any existing object
    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> Result<(), RelayError>;

    /// Human-readable location, used in logs
    fn location(&self) -> String;
}

// ============================================================================
// S3
// ============================================================================

/// Bucket on an S3-compatible service
pub struct S3Store {
    bucket: Box<Bucket>,
    endpoint: String,
}

impl S3Store {
    /// Build a client for the configured bucket. No request is made here.
    pub fn new(settings: &StoreSettings) -> Result<Self, RelayError> {
        let region = Region::Custom {
            region: settings.region.clone(),
            endpoint: settings.endpoint.clone(),
        };
        let credentials = Credentials::new(
            Some(&settings.access_key),
            Some(&settings.secret_key),
            None,
            None,
            None,
        )
        .map_err(|e| RelayError::Configuration(format!("invalid store credentials: {}", e)))?;

        let mut bucket = Bucket::new(&settings.bucket, region, credentials)
            .map_err(|e| RelayError::Configuration(format!("invalid bucket settings: {}", e)))?;
        if settings.path_style {
            bucket = bucket.with_path_style();
        }

        Ok(Self {
            bucket,
            endpoint: settings.endpoint.clone(),
        })
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> Result<(), RelayError> {
        debug!("PUT {} ({} bytes, {})", key, body.len(), content_type);

        let response = self
            .bucket
            .put_object_with_content_type(key, &body, content_type)
            .await
            .map_err(|e| RelayError::store(key, e))?;

        let status = response.status_code();
        if !(200..300).contains(&status) {
            return Err(RelayError::store(key, format!("HTTP {}", status)));
        }

        Ok(())
    }

    fn location(&self) -> String {
        format!("{}/{}", self.endpoint.trim_end_matches('/'), self.bucket.name())
    }
}

// ============================================================================
// In-memory
// ============================================================================

/// An object held by [`MemoryStore`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub body: Bytes,
    pub content_type: String,
}

/// Process-local store
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: Mutex<HashMap<String, StoredObject>>,
    puts: Mutex<Vec<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<StoredObject> {
        self.objects.lock().get(key).cloned()
    }

    /// Number of distinct keys held
    pub fn len(&self) -> usize {
        self.objects.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.lock().is_empty()
    }

    /// Keys in the order they were written, repeats included
    pub fn put_log(&self) -> Vec<String> {
        self.puts.lock().clone()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> Result<(), RelayError> {
        self.objects.lock().insert(
            key.to_string(),
            StoredObject {
                body,
                content_type: content_type.to_string(),
            },
        );
        self.puts.lock().push(key.to_string());
        Ok(())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> StoreSettings {
        StoreSettings {
            endpoint: "https://account.r2.cloudflarestorage.com".into(),
            region: "auto".into(),
            bucket: "media".into(),
            access_key: "key".into(),
            secret_key: "secret".into(),
            path_style: true,
        }
    }

    #[test]
    fn test_s3_store_location() {
        let store = S3Store::new(&settings()).unwrap();
        assert_eq!(
            store.location(),
            "https://account.r2.cloudflarestorage.com/media"
        );
    }

    #[tokio::test]
    async fn test_memory_store_overwrites() {
        let store = MemoryStore::new();
        store
            .put("a.bin", Bytes::from_static(b"one"), "text/plain")
            .await
            .unwrap();
        store
            .put("a.bin", Bytes::from_static(b"two"), "application/octet-stream")
            .await
            .unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.put_log(), vec!["a.bin", "a.bin"]);

        let object = store.get("a.bin").unwrap();
        assert_eq!(object.body, Bytes::from_static(b"two"));
        assert_eq!(object.content_type, "application/octet-stream");
    }
}
