//! Merged file storage.
//!
//! The merger needs exactly one capability from storage: persist a byte
//! stream under a name. [`MergedBlocksStore`] is that seam; the
//! `object_store` backed implementation covers S3, local disk and memory.
//!
//! # Key Schema
//!
//! ```text
//! {prefix}/{filename}{suffix}    # one object per merged file
//! ```

pub mod error;
pub mod naming;
pub mod object_store_backend;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

pub use error::{StoreError, StoreResult};
pub use naming::KeyBuilder;
pub use object_store_backend::ObjectStoreMergedStore;

/// Content handed to a store: chunks in write order, ending either cleanly
/// or with the producer's error.
pub type ByteStream = BoxStream<'static, std::io::Result<Bytes>>;

/// Parsed store specification from CLI/config.
///
/// # Examples
///
/// ```text
/// s3://my-bucket/eth/merged?region=eu-west-1
/// file:///var/lib/blockmerge
/// memory://  (for testing)
/// ```
#[derive(Debug, Clone)]
pub struct StoreSpec {
    /// The scheme (s3, file, memory)
    pub scheme: String,
    /// Bucket name (empty for file://)
    pub bucket: Option<String>,
    /// Base prefix/path within the bucket
    pub prefix: String,
    /// Optional region (for S3)
    pub region: Option<String>,
}

impl StoreSpec {
    /// Parse a store URL like `s3://bucket/prefix` or `file:///path`.
    pub fn parse(url: &str) -> StoreResult<Self> {
        let url = url::Url::parse(url).map_err(|e| StoreError::InvalidSpec {
            spec: url.to_string(),
            reason: e.to_string(),
        })?;

        let scheme = url.scheme().to_string();
        let bucket = url
            .host_str()
            .filter(|h| !h.is_empty())
            .map(|s| s.to_string());
        let prefix = url.path().trim_start_matches('/').to_string();

        let region = url
            .query_pairs()
            .find(|(k, _)| k == "region")
            .map(|(_, v)| v.to_string());

        Ok(Self {
            scheme,
            bucket,
            prefix,
            region,
        })
    }
}

/// Durable destination for merged files.
///
/// `write_object` consumes `content` until it ends and persists the bytes
/// under `name`, replacing any previous object. An `Err` item in the stream
/// aborts the write and must surface as [`StoreError::Source`]. Deadlines,
/// if any, are the implementation's concern.
#[async_trait]
pub trait MergedBlocksStore: Send + Sync {
    async fn write_object(&self, name: &str, content: ByteStream) -> StoreResult<()>;
}
