//! In-memory byte pipe connecting a download to an upload.
//!
//! The buffer is bounded in chunks: the writer waits while it is full and
//! the reader waits while it is empty. A writer that hits an error closes
//! the pipe with that error instead of simply dropping, so the reading side
//! fails rather than seeing a truncated body as a clean end of input.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::Stream;
use tokio::sync::mpsc;

/// Chunks buffered between producer and consumer before the producer waits.
pub const DEFAULT_PIPE_CAPACITY: usize = 16;

/// Create a pipe holding at most `capacity` chunks in flight.
pub fn pipe(capacity: usize) -> (PipeWriter, PipeReader) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (PipeWriter { tx }, PipeReader { rx })
}

/// Producing half of a [`pipe`]. Dropping it ends the stream cleanly.
#[derive(Debug)]
pub struct PipeWriter {
    tx: mpsc::Sender<io::Result<Bytes>>,
}

impl PipeWriter {
    /// Push a chunk, waiting while the buffer is full.
    ///
    /// Fails with `BrokenPipe` once the reader has gone away.
    pub async fn write(&self, chunk: Bytes) -> io::Result<()> {
        if chunk.is_empty() {
            return Ok(());
        }
        self.tx
            .send(Ok(chunk))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "pipe reader closed"))
    }

    /// Close the pipe with an error the reader observes after any chunks
    /// already buffered.
    pub async fn fail(self, error: io::Error) {
        // A missing reader has nobody left to tell.
        let _ = self.tx.send(Err(error)).await;
    }

    /// Close the pipe; the reader sees end of input.
    pub fn close(self) {}
}

/// Consuming half of a [`pipe`], usable as a streaming request body.
#[derive(Debug)]
pub struct PipeReader {
    rx: mpsc::Receiver<io::Result<Bytes>>,
}

impl Stream for PipeReader {
    type Item = io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}
