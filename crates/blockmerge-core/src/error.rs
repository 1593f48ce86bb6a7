//! Merge failures.
//!
//! Every variant is fatal to the `process_block` call that raised it; the
//! merger never retries. Reaching the stop block is not an error, see
//! [`crate::merger::BlockOutcome::Completed`].

use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum MergeError {
    /// The first block is neither on a bundle boundary nor the chain's
    /// first streamable block.
    #[error(
        "received unexpected block #{block_number} (not a boundary, not the first streamable block {first_streamable})"
    )]
    BoundaryViolation {
        block_number: u64,
        first_streamable: u64,
    },

    /// The transform hook rejected a block.
    #[error("tweaking block #{block_number}: {source}")]
    Transform {
        block_number: u64,
        #[source]
        source: anyhow::Error,
    },

    /// A flush was attempted with nothing buffered.
    #[error("no blocks to write to bundle {low_boundary}")]
    EmptyBundle { low_boundary: u64 },

    /// A completed bundle does not hold exactly `expected` blocks. The
    /// duplicate counts come from the scans run over the buffer.
    #[error(
        "failed to check bundle size, expected {expected} blocks but got {actual} at low_block_number {low_boundary}"
    )]
    SizeMismatch {
        low_boundary: u64,
        expected: u64,
        actual: usize,
        duplicate_numbers: usize,
        duplicate_ids: usize,
    },

    /// Serializing or storing a merged file failed.
    #[error("writing merged file {filename}: {source}")]
    Downstream {
        filename: String,
        #[source]
        source: StoreError,
    },

    /// The writer already reached its stop block.
    #[error("merger already stopped")]
    Stopped,
}

impl MergeError {
    /// The bundle a failure is about, when it concerns one.
    pub fn low_boundary(&self) -> Option<u64> {
        match self {
            Self::EmptyBundle { low_boundary } | Self::SizeMismatch { low_boundary, .. } => {
                Some(*low_boundary)
            }
            _ => None,
        }
    }
}
