//! Object store implementation of MergedBlocksStore.
//!
//! Supports S3, local filesystem and memory via the `object_store` crate.
//! Content is uploaded as a multipart upload while it is being produced, so
//! a merged file is never held in memory as a whole.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use object_store::{ObjectStore, WriteMultipart};

use super::{ByteStream, KeyBuilder, MergedBlocksStore, StoreError, StoreResult, StoreSpec};

/// Upper bound on parts uploading concurrently for one object.
const MAX_CONCURRENT_PARTS: usize = 4;

/// Merged file store backed by `object_store`.
///
/// Supports:
/// - S3 and S3-compatible (MinIO, R2, Wasabi)
/// - Local filesystem
/// - In-memory (for testing)
pub struct ObjectStoreMergedStore {
    inner: Arc<dyn ObjectStore>,
    keys: KeyBuilder,
}

impl ObjectStoreMergedStore {
    /// Create a store from a parsed spec.
    pub fn from_spec(spec: &StoreSpec) -> StoreResult<Self> {
        let (inner, key_prefix): (Arc<dyn ObjectStore>, &str) = match spec.scheme.as_str() {
            "memory" => {
                let memory: Arc<dyn ObjectStore> = Arc::new(object_store::memory::InMemory::new());
                (memory, spec.prefix.as_str())
            }
            "file" => {
                let path = if let Some(bucket) = &spec.bucket {
                    format!("/{}/{}", bucket, spec.prefix)
                } else if spec.prefix.is_empty() {
                    "/tmp/blockmerge-store".to_string()
                } else {
                    format!("/{}", spec.prefix)
                };
                std::fs::create_dir_all(&path).map_err(|e| StoreError::Io {
                    message: format!("failed to create store directory {}: {}", path, e),
                })?;
                let local =
                    object_store::local::LocalFileSystem::new_with_prefix(&path).map_err(|e| {
                        StoreError::Io {
                            message: format!("failed to create local store at {}: {}", path, e),
                        }
                    })?;
                let local: Arc<dyn ObjectStore> = Arc::new(local);
                // The URL path is the directory itself, keys start at its root
                (local, "")
            }
            "s3" => {
                let bucket = spec
                    .bucket
                    .as_ref()
                    .ok_or_else(|| StoreError::InvalidSpec {
                        spec: format!("s3://{:?}/{}", spec.bucket, spec.prefix),
                        reason: "S3 URL must include bucket name".to_string(),
                    })?;

                let mut builder = object_store::aws::AmazonS3Builder::from_env()
                    .with_bucket_name(bucket)
                    .with_allow_http(false);

                if let Some(region) = &spec.region {
                    builder = builder.with_region(region);
                }

                let s3 = builder.build().map_err(|e| StoreError::Io {
                    message: format!("failed to create S3 client: {}", e),
                })?;
                let s3: Arc<dyn ObjectStore> = Arc::new(s3);
                (s3, spec.prefix.as_str())
            }
            scheme => {
                return Err(StoreError::InvalidSpec {
                    spec: spec.scheme.clone(),
                    reason: format!("unsupported scheme: {}", scheme),
                })
            }
        };

        Ok(Self {
            inner,
            keys: KeyBuilder::new(key_prefix),
        })
    }

    /// Create a store from a URL string.
    pub fn from_url(url: &str) -> StoreResult<Self> {
        let spec = StoreSpec::parse(url)?;
        Self::from_spec(&spec)
    }

    /// Create an in-memory store for testing.
    pub fn memory() -> Self {
        Self::memory_with_prefix("")
    }

    /// Create an in-memory store with a prefix for testing.
    pub fn memory_with_prefix(prefix: &str) -> Self {
        Self {
            inner: Arc::new(object_store::memory::InMemory::new()),
            keys: KeyBuilder::new(prefix),
        }
    }

    /// Replace the suffix appended to every merged filename.
    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.keys = self.keys.with_suffix(suffix);
        self
    }

    pub fn keys(&self) -> &KeyBuilder {
        &self.keys
    }

    /// Fetch a previously written object.
    pub async fn read_object(&self, name: &str) -> StoreResult<Bytes> {
        let key = self.keys.object_key(name);

        let result = self
            .inner
            .get(&key)
            .await
            .map_err(|e| StoreError::from_object_store(e, name))?;

        result.bytes().await.map_err(|e| StoreError::Io {
            message: format!("failed to read object bytes: {}", e),
        })
    }

    /// Check if an object exists.
    pub async fn object_exists(&self, name: &str) -> StoreResult<bool> {
        let key = self.keys.object_key(name);
        match self.inner.head(&key).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(StoreError::Io {
                message: format!("failed to check object existence: {}", e),
            }),
        }
    }
}

#[async_trait]
impl MergedBlocksStore for ObjectStoreMergedStore {
    async fn write_object(&self, name: &str, mut content: ByteStream) -> StoreResult<()> {
        let key = self.keys.object_key(name);

        let upload = self
            .inner
            .put_multipart(&key)
            .await
            .map_err(|e| StoreError::from_object_store(e, name))?;
        let mut upload = WriteMultipart::new(upload);
        let mut written = 0u64;

        while let Some(chunk) = content.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(source) => {
                    if let Err(e) = upload.abort().await {
                        tracing::warn!(key = %key, error = %e, "failed to abort multipart upload");
                    }
                    return Err(StoreError::Source {
                        name: name.to_string(),
                        source,
                    });
                }
            };

            if let Err(e) = upload.wait_for_capacity(MAX_CONCURRENT_PARTS).await {
                if let Err(abort) = upload.abort().await {
                    tracing::warn!(key = %key, error = %abort, "failed to abort multipart upload");
                }
                return Err(StoreError::from_object_store(e, name));
            }
            upload.write(&chunk);
            written += chunk.len() as u64;
        }

        upload
            .finish()
            .await
            .map_err(|e| StoreError::from_object_store(e, name))?;

        tracing::debug!(key = %key, bytes = written, "object written");
        Ok(())
    }
}
