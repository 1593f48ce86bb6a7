//! Block merger: groups an ordered stream of numbered blocks into merged
//! files of 100 consecutive block numbers and streams each one into an
//! object store while it is being encoded.
//!
//! # Modules
//!
//! - [`boundary`]: bundle boundary arithmetic and file naming
//! - [`anomaly`]: duplicate number / id diagnostics
//! - [`bundle_writer`]: concurrent encode-and-upload of one merged file
//! - [`merger`]: the accumulator state machine
//! - [`codec`]: block serializer factory and the NDJSON codec
//! - [`pipe`]: bounded in-process byte pipe
//! - [`store`]: object storage adapter

pub mod anomaly;
pub mod block;
pub mod boundary;
pub mod bundle_writer;
pub mod codec;
pub mod config;
pub mod error;
pub mod merger;
pub mod pipe;
pub mod store;

// Convenience re-exports
pub use block::Block;
pub use boundary::{bundle_filename, lower_boundary, BUNDLE_SIZE};
pub use bundle_writer::write_bundle;
pub use codec::{BlockWriter, BlockWriterFactory, CodecError, NdjsonCompression, NdjsonWriterFactory};
pub use config::{ConfigError, MergerConfig};
pub use error::MergeError;
pub use merger::{BlockOutcome, BlockTransform, MergedBlocksWriter};
pub use store::{
    ByteStream, MergedBlocksStore, ObjectStoreMergedStore, StoreError, StoreResult, StoreSpec,
};

// Re-export bytes for CLI convenience
pub use bytes::Bytes;
