//! Merged blocks accumulator.
//!
//! Receives blocks one at a time, in non-decreasing number order, and cuts
//! them into bundles covering `[low, low + 99]` with `low` a multiple of 100.
//! A bundle is flushed when its last block number arrives, or earlier when
//! a block from a later bundle shows up (the closing block does not exist on
//! this chain).
//!
//! # States
//!
//! ```text
//! Uninitialized --first block--> Accumulating --stop block--> Terminated
//! ```
//!
//! The writer is driven by one caller; it is `Send` but not meant to be
//! shared. Each flush runs one serializer task that never outlives it.

use std::sync::Arc;

use crate::anomaly::{find_duplicate_ids, find_duplicate_numbers};
use crate::block::Block;
use crate::boundary::{bundle_filename, last_in_bundle, lower_boundary, BUNDLE_SIZE};
use crate::bundle_writer::write_bundle;
use crate::codec::BlockWriterFactory;
use crate::config::MergerConfig;
use crate::error::MergeError;
use crate::store::MergedBlocksStore;

/// Per-block rewrite applied before any bookkeeping.
pub type BlockTransform = Arc<dyn Fn(Block) -> anyhow::Result<Block> + Send + Sync>;

/// Result of feeding one block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockOutcome {
    /// The block was buffered (and possibly flushed with its bundle).
    Accepted,
    /// The block reached the stop block; it was not buffered and the
    /// stream is over.
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MergeState {
    Uninitialized,
    /// `first_bundle` holds until the first flush; its start offset is chain
    /// specific so its size is not checked.
    Accumulating { first_bundle: bool },
    Terminated,
}

/// Groups blocks into merged files and writes them to a store.
pub struct MergedBlocksWriter {
    store: Arc<dyn MergedBlocksStore>,
    writer_factory: Arc<dyn BlockWriterFactory>,
    config: MergerConfig,
    transform: Option<BlockTransform>,

    state: MergeState,
    low_boundary: u64,
    blocks: Vec<Block>,
}

impl MergedBlocksWriter {
    pub fn new(
        store: Arc<dyn MergedBlocksStore>,
        writer_factory: Arc<dyn BlockWriterFactory>,
        config: MergerConfig,
    ) -> Self {
        Self {
            store,
            writer_factory,
            config,
            transform: None,
            state: MergeState::Uninitialized,
            low_boundary: 0,
            blocks: Vec::with_capacity(BUNDLE_SIZE as usize),
        }
    }

    /// Install a transform run on every incoming block.
    pub fn with_transform(mut self, transform: BlockTransform) -> Self {
        self.transform = Some(transform);
        self
    }

    pub fn config(&self) -> &MergerConfig {
        &self.config
    }

    /// Floor of the bundle being accumulated (0 before the first block).
    pub fn low_boundary(&self) -> u64 {
        self.low_boundary
    }

    /// Number of blocks waiting in the current bundle.
    pub fn buffered(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_terminated(&self) -> bool {
        self.state == MergeState::Terminated
    }

    /// Feed the next block of the stream.
    pub async fn process_block(&mut self, block: Block) -> Result<BlockOutcome, MergeError> {
        if self.state == MergeState::Terminated {
            return Err(MergeError::Stopped);
        }

        let block = match &self.transform {
            Some(transform) => {
                let number = block.number;
                transform(block).map_err(|source| MergeError::Transform {
                    block_number: number,
                    source,
                })?
            }
            None => block,
        };

        if self.state == MergeState::Uninitialized {
            self.establish_boundary(&block)?;
        }

        if block.number > last_in_bundle(self.low_boundary) {
            tracing::debug!(
                blk = %block,
                last_bundle_block = last_in_bundle(self.low_boundary),
                "bundling because we saw a block from the next bundle (the last block was not seen, it must not exist on this chain)"
            );
            self.flush().await?;
        }

        if let Some(stop) = self.config.effective_stop_block() {
            if block.number >= stop {
                tracing::debug!(blk = %block, stop_block = stop, "reached stop block");
                self.state = MergeState::Terminated;
                return Ok(BlockOutcome::Completed);
            }
        }

        let number = block.number;
        self.blocks.push(block);

        if number == last_in_bundle(self.low_boundary) {
            tracing::debug!(last_bundle_block = number, "bundling on last bundle block");
            self.check_bundle_size()?;
            self.flush().await?;
        }

        Ok(BlockOutcome::Accepted)
    }

    /// Flush a trailing partial bundle and retire the writer.
    ///
    /// Returns the merged filename written, or `None` when nothing was
    /// buffered. Without this call a partial bundle at end of input is
    /// dropped.
    pub async fn finish(mut self) -> Result<Option<String>, MergeError> {
        if self.blocks.is_empty() {
            return Ok(None);
        }

        let filename = bundle_filename(self.low_boundary);
        tracing::info!(
            filename = %filename,
            blocks = self.blocks.len(),
            "flushing trailing partial bundle"
        );
        self.flush().await?;
        Ok(Some(filename))
    }

    fn establish_boundary(&mut self, block: &Block) -> Result<(), MergeError> {
        let first_streamable = self.config.first_streamable_block;
        if block.number >= BUNDLE_SIZE
            && block.number % BUNDLE_SIZE != 0
            && block.number != first_streamable
        {
            return Err(MergeError::BoundaryViolation {
                block_number: block.number,
                first_streamable,
            });
        }

        self.low_boundary = lower_boundary(block.number);
        self.state = MergeState::Accumulating { first_bundle: true };
        tracing::debug!(
            low_boundary = self.low_boundary,
            blk = %block,
            "setting initial boundary"
        );
        Ok(())
    }

    fn check_bundle_size(&self) -> Result<(), MergeError> {
        let first_bundle = matches!(self.state, MergeState::Accumulating { first_bundle: true });
        if !self.config.enforce_bundle_size
            || first_bundle
            || self.blocks.len() as u64 == BUNDLE_SIZE
        {
            return Ok(());
        }

        let duplicate_numbers = find_duplicate_numbers(&self.blocks).len();
        let duplicate_ids = find_duplicate_ids(&self.blocks).len();
        Err(MergeError::SizeMismatch {
            low_boundary: self.low_boundary,
            expected: BUNDLE_SIZE,
            actual: self.blocks.len(),
            duplicate_numbers,
            duplicate_ids,
        })
    }

    /// Write the current bundle, then advance to the next one whatever the
    /// outcome.
    async fn flush(&mut self) -> Result<(), MergeError> {
        let low_boundary = self.low_boundary;
        let blocks = std::mem::replace(&mut self.blocks, Vec::with_capacity(BUNDLE_SIZE as usize));

        self.low_boundary = self.low_boundary.saturating_add(BUNDLE_SIZE);
        if let MergeState::Accumulating { first_bundle } = &mut self.state {
            *first_bundle = false;
        }

        write_bundle(
            self.store.as_ref(),
            Arc::clone(&self.writer_factory),
            low_boundary,
            blocks,
            self.config.pipe_capacity,
        )
        .await
    }
}
