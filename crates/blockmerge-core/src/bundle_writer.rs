//! Concurrent encode-and-upload of one merged file.
//!
//! The blocks are serialized on a blocking task into a bounded [`pipe`]
//! while the store consumes the other end, so the encoded bundle is never
//! materialized in memory. The serializer stalls when the store falls
//! behind and the store waits for the serializer.
//!
//! A serializer failure closes the pipe with that error, which makes the
//! store's write fail. The call returns only after the serializer task has
//! ended.

use std::io;
use std::sync::Arc;

use futures::StreamExt;

use crate::block::Block;
use crate::boundary::bundle_filename;
use crate::codec::{BlockWriterFactory, CodecError};
use crate::error::MergeError;
use crate::pipe::{pipe, PipeWriter};
use crate::store::{MergedBlocksStore, StoreError};

/// Serialize `blocks` and persist them as the merged file for `low_boundary`.
pub async fn write_bundle(
    store: &dyn MergedBlocksStore,
    writer_factory: Arc<dyn BlockWriterFactory>,
    low_boundary: u64,
    blocks: Vec<Block>,
    pipe_capacity: usize,
) -> Result<(), MergeError> {
    let filename = bundle_filename(low_boundary);
    tracing::info!(
        filename = %filename,
        low_boundary,
        blocks = blocks.len(),
        "writing merged file to store"
    );

    if blocks.is_empty() {
        return Err(MergeError::EmptyBundle { low_boundary });
    }

    let (sink, source) = pipe(pipe_capacity);
    let producer =
        tokio::task::spawn_blocking(move || encode_into(writer_factory.as_ref(), sink, &blocks));

    let stored = store.write_object(&filename, source.boxed()).await;
    let produced = producer.await;

    let outcome = match (stored, produced) {
        (Err(e), _) => Err(e),
        (Ok(()), Ok(Ok(()))) => Ok(()),
        // The store finished without seeing the serializer's error
        (Ok(()), Ok(Err(e))) => Err(StoreError::Source {
            name: filename.clone(),
            source: io::Error::other(e),
        }),
        (Ok(()), Err(join)) => Err(StoreError::Io {
            message: format!("block serializer task failed: {}", join),
        }),
    };

    outcome.map_err(|source| {
        if source.is_source_failure() {
            tracing::error!(filename = %filename, error = %source, "serializing merged file");
        } else {
            tracing::error!(filename = %filename, error = %source, "writing to store");
        }
        MergeError::Downstream { filename, source }
    })
}

/// Runs on the blocking pool: feed every block through a fresh serializer.
fn encode_into(
    factory: &dyn BlockWriterFactory,
    sink: PipeWriter,
    blocks: &[Block],
) -> Result<(), CodecError> {
    let closer = CloseOnFailure(Some(sink.clone()));

    let result = (|| -> Result<(), CodecError> {
        let mut writer = factory.new_writer(Box::new(sink))?;
        for block in blocks {
            writer.write_block(block)?;
        }
        writer.finish()
    })();

    closer.settle(&result);
    result
}

/// Holds one end of the pipe so a failing or panicking serializer ends the
/// stream with an error instead of a clean (truncated) EOF.
struct CloseOnFailure(Option<PipeWriter>);

impl CloseOnFailure {
    fn settle(mut self, result: &Result<(), CodecError>) {
        if let (Some(writer), Err(e)) = (self.0.take(), result) {
            writer.close_with_error(io::Error::other(e.to_string()));
        }
    }
}

impl Drop for CloseOnFailure {
    fn drop(&mut self) {
        if let Some(writer) = self.0.take() {
            writer.close_with_error(io::Error::other("block serializer aborted"));
        }
    }
}
