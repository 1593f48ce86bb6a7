//! Bounded in-process byte pipe.
//!
//! Bridges a blocking producer (a [`std::io::Write`] consumer such as a
//! block serializer) to an async consumer reading a byte stream. The
//! channel is bounded, so the producer blocks once `capacity` chunks are
//! waiting and resumes as the consumer reads.
//!
//! Closing the writer with an error delivers that error as the last item
//! of the stream. Dropping the writer ends the stream cleanly.
//!
//! [`PipeWriter`] must only be used from a blocking context (a
//! `spawn_blocking` task or a plain thread): it parks the calling thread.

use std::io::{self, Write};
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::Stream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// Default number of in-flight chunks.
pub const DEFAULT_PIPE_CAPACITY: usize = 16;

/// Create a pipe holding at most `capacity` unread chunks.
pub fn pipe(capacity: usize) -> (PipeWriter, PipeReader) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        PipeWriter { tx },
        PipeReader {
            inner: ReceiverStream::new(rx),
        },
    )
}

/// Writing half. Cloning shares the same pipe; the stream ends once every
/// clone is dropped.
#[derive(Debug, Clone)]
pub struct PipeWriter {
    tx: mpsc::Sender<io::Result<Bytes>>,
}

impl PipeWriter {
    /// Terminate the stream with `err`.
    ///
    /// The reader sees every chunk written before, then `err`. Ignored if
    /// the reader is already gone.
    pub fn close_with_error(self, err: io::Error) {
        let _ = self.tx.blocking_send(Err(err));
    }
}

impl Write for PipeWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        if data.is_empty() {
            return Ok(0);
        }
        self.tx
            .blocking_send(Ok(Bytes::copy_from_slice(data)))
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "pipe reader closed"))?;
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Reading half, a stream of byte chunks in write order.
#[derive(Debug)]
pub struct PipeReader {
    inner: ReceiverStream<io::Result<Bytes>>,
}

impl Stream for PipeReader {
    type Item = io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
