pub mod coordinator;
pub mod diff;
pub mod endpoint;
pub mod error;
pub mod item;
pub mod pipe;
pub mod pool;
pub mod snapshot;
pub mod source;
pub mod transfer;

pub use coordinator::{RunCoordinator, RunPhase, RunReport};
pub use diff::{DiffSet, diff};
pub use endpoint::{Endpoint, validate_pair};
pub use error::SyncError;
pub use item::{Checksum, PlannedTransfer, RepositoryItem};
pub use pipe::{DEFAULT_PIPE_CAPACITY, PipeReader, PipeWriter, pipe};
pub use pool::{DEFAULT_POOL_CAPACITY, WorkerPool};
pub use snapshot::RepositorySnapshot;
pub use source::{ArtifactCopier, MetadataSource};
pub use transfer::{MAX_ATTEMPTS, OutcomeSet, TransferOutcome, transfer_with_retry};

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
