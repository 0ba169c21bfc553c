/// Errors that can occur while mirroring a repository.
///
/// Fetch-phase errors of any kind are fatal to a run. `Transfer` errors are
/// retried per item and end up in the run report instead of failing the run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    /// Rejected before any network call is made.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Connection, TLS, or DNS failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// Non-success status or a body that could not be parsed.
    #[error("response error: {0}")]
    Response(String),

    #[error("run canceled")]
    Cancelled,

    /// Download or upload failure during a single transfer attempt.
    #[error("transfer error: {0}")]
    Transfer(String),

    #[error("worker pool error: {0}")]
    Pool(String),
}

impl SyncError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
