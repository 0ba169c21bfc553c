use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::{
    ArtifactCopier, Checksum, Endpoint, MetadataSource, PlannedTransfer, RepositoryItem,
    RepositorySnapshot, SyncError,
};

/// Build an item with a predictable download URL and the given strong hash.
pub fn sample_item(path: &str, sha1: &str) -> RepositoryItem {
    RepositoryItem {
        path: path.to_owned(),
        download_url: format!("http://source:8081/repository/releases/{path}"),
        id: format!("id-{path}"),
        repository: "releases".to_owned(),
        format: "maven2".to_owned(),
        checksum: Checksum::sha1(sha1),
    }
}

/// In-memory listing that returns a fixed snapshot or error.
pub struct InMemorySource {
    endpoint: Endpoint,
    result: Result<RepositorySnapshot, SyncError>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl InMemorySource {
    pub fn new(endpoint: Endpoint, items: impl IntoIterator<Item = RepositoryItem>) -> Self {
        Self {
            endpoint,
            result: Ok(items.into_iter().collect()),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(endpoint: Endpoint, error: SyncError) -> Self {
        Self {
            endpoint,
            result: Err(error),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Delay the answer; a cancelled token cuts the delay short.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl MetadataSource for InMemorySource {
    fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    async fn fetch_all(&self, cancel: &CancellationToken) -> Result<RepositorySnapshot, SyncError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::select! {
                _ = cancel.cancelled() => return Err(SyncError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }

        self.result.clone()
    }
}

/// Copier whose per-path failures are scripted in advance.
///
/// Tracks every attempt and the peak number of concurrent copies.
#[derive(Default)]
pub struct ScriptedCopier {
    failures: HashMap<String, u32>,
    delay: Option<Duration>,
    attempts: Mutex<Vec<PlannedTransfer>>,
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedCopier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the first `times` attempts for `path`.
    pub fn fail(mut self, path: &str, times: u32) -> Self {
        self.failures.insert(path.to_owned(), times);
        self
    }

    /// Fail every attempt for `path`.
    pub fn always_fail(self, path: &str) -> Self {
        self.fail(path, u32::MAX)
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn attempts(&self) -> Vec<PlannedTransfer> {
        self.attempts.lock().map(|a| a.clone()).unwrap_or_default()
    }

    pub fn attempts_for(&self, path: &str) -> usize {
        self.attempts().iter().filter(|t| t.path() == path).count()
    }

    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ArtifactCopier for ScriptedCopier {
    async fn copy(
        &self,
        transfer: &PlannedTransfer,
        _cancel: &CancellationToken,
    ) -> Result<(), SyncError> {
        let previous = {
            let mut attempts = self
                .attempts
                .lock()
                .map_err(|_| SyncError::Transfer("attempt log poisoned".into()))?;
            let previous = attempts.iter().filter(|t| t.path() == transfer.path()).count();
            attempts.push(transfer.clone());
            previous
        };

        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.active.fetch_sub(1, Ordering::SeqCst);

        let allowed_failures = self.failures.get(transfer.path()).copied().unwrap_or(0);
        if (previous as u64) < u64::from(allowed_failures) {
            return Err(SyncError::Transfer(format!(
                "upload of {} failed (attempt {})",
                transfer.path(),
                previous + 1
            )));
        }
        Ok(())
    }
}
