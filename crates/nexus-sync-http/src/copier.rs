use std::io;

use futures::StreamExt;
use nexus_sync::{
    ArtifactCopier, DEFAULT_PIPE_CAPACITY, PipeWriter, PlannedTransfer, SyncError, pipe,
};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::client::{NexusClient, cancellable, ensure_success, send};

/// Streams an artifact from the source endpoint straight into an upload
/// to the destination, without holding the whole file in memory.
///
/// Each call builds a fresh pipe and fresh requests, so attempts share no
/// state.
pub struct StreamCopier {
    source: NexusClient,
    destination: NexusClient,
    pipe_capacity: usize,
}

impl StreamCopier {
    pub fn new(source: NexusClient, destination: NexusClient) -> Self {
        Self {
            source,
            destination,
            pipe_capacity: DEFAULT_PIPE_CAPACITY,
        }
    }

    /// Number of body chunks buffered between download and upload.
    pub fn with_pipe_capacity(mut self, capacity: usize) -> Self {
        self.pipe_capacity = capacity.max(1);
        self
    }
}

#[async_trait::async_trait]
impl ArtifactCopier for StreamCopier {
    async fn copy(
        &self,
        transfer: &PlannedTransfer,
        cancel: &CancellationToken,
    ) -> Result<(), SyncError> {
        // Cancelling the attempt token stops the download whichever way the
        // upload ends.
        let attempt = cancel.child_token();
        let _stop_download = attempt.clone().drop_guard();

        let (writer, reader) = pipe(self.pipe_capacity);
        let download = self.source.get(&transfer.item.download_url);
        let producer_cancel = attempt.clone();
        let producer = tokio::spawn(
            async move { produce(download, writer, &producer_cancel).await }.in_current_span(),
        );

        let upload = self
            .destination
            .put(&transfer.destination_url, reqwest::Body::wrap_stream(reader));
        let uploaded = match send(upload, &attempt).await {
            Ok(response) => ensure_success(response, "upload", &attempt).await.map(|_| ()),
            Err(e) => Err(e),
        };

        attempt.cancel();
        let downloaded = producer
            .await
            .unwrap_or_else(|e| Err(SyncError::Transfer(format!("download task failed: {e}"))));

        match uploaded {
            Ok(()) => Ok(()),
            Err(SyncError::Cancelled) if cancel.is_cancelled() => Err(SyncError::Cancelled),
            Err(upload_err) => match downloaded {
                Err(download_err) if !download_err.is_cancelled() => {
                    Err(SyncError::Transfer(format!(
                        "upload to {} failed: {upload_err} (download: {download_err})",
                        transfer.destination_url
                    )))
                }
                _ => Err(SyncError::Transfer(format!(
                    "upload to {} failed: {upload_err}",
                    transfer.destination_url
                ))),
            },
        }
    }
}

/// Download into the pipe, closing it with an error if anything fails so
/// the upload cannot complete with a truncated body.
async fn produce(
    request: reqwest::RequestBuilder,
    writer: PipeWriter,
    cancel: &CancellationToken,
) -> Result<(), SyncError> {
    match forward(request, &writer, cancel).await {
        Ok(()) => {
            writer.close();
            Ok(())
        }
        Err(e) => {
            // Once the attempt is over nothing is reading the pipe any more.
            tokio::select! {
                _ = writer.fail(io::Error::other(e.to_string())) => {}
                _ = cancel.cancelled() => {}
            }
            Err(e)
        }
    }
}

async fn forward(
    request: reqwest::RequestBuilder,
    writer: &PipeWriter,
    cancel: &CancellationToken,
) -> Result<(), SyncError> {
    let response = send(request, cancel).await?;
    let response = ensure_success(response, "download", cancel).await?;
    let mut body = response.bytes_stream();

    while let Some(chunk) = cancellable(cancel, body.next()).await? {
        let chunk = chunk
            .map_err(|e| SyncError::Transport(format!("failed to read download body: {e}")))?;
        cancellable(cancel, writer.write(chunk))
            .await?
            .map_err(|e| SyncError::Transfer(format!("upload stopped reading: {e}")))?;
    }

    Ok(())
}
