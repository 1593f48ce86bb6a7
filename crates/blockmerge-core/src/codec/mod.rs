//! Block serialization contract.
//!
//! A [`BlockWriterFactory`] binds a [`BlockWriter`] to a byte sink; the
//! writer appends one encoded record per call, in call order. The merger
//! never inspects the bytes, so any framing works as long as a matching
//! reader exists on the consuming side.

pub mod ndjson;

use std::io::Write;

use thiserror::Error;

use crate::block::Block;

pub use ndjson::{read_blocks, NdjsonBlocks, NdjsonCompression, NdjsonWriterFactory};

/// Errors raised while encoding or decoding blocks.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid block at line {line}: {source}")]
    Json {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode block #{number}: {source}")]
    Encode {
        number: u64,
        #[source]
        source: serde_json::Error,
    },
}

/// Appends encoded blocks to the sink it was created with.
pub trait BlockWriter: Send {
    fn write_block(&mut self, block: &Block) -> Result<(), CodecError>;

    /// Terminate the framing (flush buffers, write trailers).
    ///
    /// Called once after the last block.
    fn finish(self: Box<Self>) -> Result<(), CodecError>;
}

/// Creates a [`BlockWriter`] bound to a sink.
pub trait BlockWriterFactory: Send + Sync {
    fn new_writer(&self, sink: Box<dyn Write + Send>) -> Result<Box<dyn BlockWriter>, CodecError>;
}
