use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::endpoint::Endpoint;
use crate::error::SyncError;
use crate::item::PlannedTransfer;
use crate::snapshot::RepositorySnapshot;

/// A repository whose full artifact listing can be retrieved.
#[async_trait::async_trait]
pub trait MetadataSource: Send + Sync {
    /// The endpoint this source lists.
    fn endpoint(&self) -> &Endpoint;

    /// Drain every page of the listing into a snapshot.
    ///
    /// Any failure aborts the whole fetch; a partial snapshot is never
    /// returned.
    async fn fetch_all(&self, cancel: &CancellationToken) -> Result<RepositorySnapshot, SyncError>;
}

/// Copies a single artifact from its source locator to its destination.
#[async_trait::async_trait]
pub trait ArtifactCopier: Send + Sync {
    /// Perform one transfer attempt. Retrying is the caller's concern.
    async fn copy(
        &self,
        transfer: &PlannedTransfer,
        cancel: &CancellationToken,
    ) -> Result<(), SyncError>;
}

#[async_trait::async_trait]
impl<T: MetadataSource + ?Sized> MetadataSource for Arc<T> {
    fn endpoint(&self) -> &Endpoint {
        (**self).endpoint()
    }

    async fn fetch_all(&self, cancel: &CancellationToken) -> Result<RepositorySnapshot, SyncError> {
        (**self).fetch_all(cancel).await
    }
}

#[async_trait::async_trait]
impl<T: ArtifactCopier + ?Sized> ArtifactCopier for Arc<T> {
    async fn copy(
        &self,
        transfer: &PlannedTransfer,
        cancel: &CancellationToken,
    ) -> Result<(), SyncError> {
        (**self).copy(transfer, cancel).await
    }
}
