use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::diff::diff;
use crate::error::SyncError;
use crate::item::PlannedTransfer;
use crate::pool::WorkerPool;
use crate::snapshot::RepositorySnapshot;
use crate::source::{ArtifactCopier, MetadataSource};
use crate::transfer::{MAX_ATTEMPTS, OutcomeSet, TransferOutcome, transfer_with_retry};

/// Stages of a mirror run, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    FetchingBoth,
    Diffing,
    Transferring,
    Reporting,
    Done,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FetchingBoth => write!(f, "fetching"),
            Self::Diffing => write!(f, "diffing"),
            Self::Transferring => write!(f, "transferring"),
            Self::Reporting => write!(f, "reporting"),
            Self::Done => write!(f, "done"),
        }
    }
}

/// Summary of a completed run.
///
/// Item failures live here rather than in the run's `Err`: a run that
/// completes with failed items is still a successful run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Items that differed and were scheduled for transfer.
    pub planned: usize,
    pub transferred: usize,
    /// Last error per path for items that exhausted their attempts.
    pub failures: BTreeMap<String, SyncError>,
}

impl RunReport {
    /// True when no item failed.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// True when there was nothing to mirror.
    pub fn is_noop(&self) -> bool {
        self.planned == 0
    }
}

type FetchHandle = JoinHandle<Result<RepositorySnapshot, SyncError>>;

/// Drives one mirror run from the two listings to the final report.
pub struct RunCoordinator {
    source: Arc<dyn MetadataSource>,
    destination: Arc<dyn MetadataSource>,
    copier: Arc<dyn ArtifactCopier>,
    pool: WorkerPool,
    max_attempts: u32,
}

impl RunCoordinator {
    pub fn new(
        source: Arc<dyn MetadataSource>,
        destination: Arc<dyn MetadataSource>,
        copier: Arc<dyn ArtifactCopier>,
        pool: WorkerPool,
    ) -> Self {
        Self {
            source,
            destination,
            copier,
            pool,
            max_attempts: MAX_ATTEMPTS,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Mirror every new or changed source item to the destination.
    ///
    /// Returns `Err` only for run-level failures: a failed listing on either
    /// side, or cancellation of `cancel`. The worker pool is released before
    /// returning on every path.
    pub async fn run(self, cancel: &CancellationToken) -> Result<RunReport, SyncError> {
        let run_cancel = cancel.child_token();
        let result = self.execute(&run_cancel).await;
        self.pool.release().await;
        tracing::debug!(phase = %RunPhase::Done, ok = result.is_ok(), "run finished");
        result
    }

    async fn execute(&self, cancel: &CancellationToken) -> Result<RunReport, SyncError> {
        tracing::info!(phase = %RunPhase::FetchingBoth, "fetching repo metadata ...");
        let (source, destination) = self.fetch_both(cancel).await?;
        tracing::info!(
            source_items = source.len(),
            destination_items = destination.len(),
            "fetched repo metadata"
        );

        let diff_set = diff(&source, &destination);
        tracing::info!(phase = %RunPhase::Diffing, changed = diff_set.len(), "computed diff");
        if diff_set.is_empty() {
            tracing::info!("synced no-op");
            return Ok(RunReport::default());
        }

        let destination_endpoint = self.destination.endpoint();
        let planned = diff_set
            .into_iter()
            .map(|item| {
                tracing::debug!(path = %item.path, "diff");
                let destination_url = destination_endpoint.artifact_url(&item.path)?;
                Ok(PlannedTransfer {
                    item,
                    destination_url,
                })
            })
            .collect::<Result<Vec<_>, SyncError>>()?;

        let planned_count = planned.len();
        let outcomes = self.transfer_all(planned, cancel).await?;
        let report = Self::report(planned_count, &outcomes);

        if cancel.is_cancelled() {
            return Err(SyncError::Cancelled);
        }
        Ok(report)
    }

    /// Run both listings concurrently on the pool.
    ///
    /// The first failure cancels the run token so the sibling fetch stops
    /// early. Its error is what the run returns.
    async fn fetch_both(
        &self,
        cancel: &CancellationToken,
    ) -> Result<(RepositorySnapshot, RepositorySnapshot), SyncError> {
        let source_task = self
            .submit_fetch(Arc::clone(&self.source), "source", cancel)
            .await?;
        let destination_task = match self
            .submit_fetch(Arc::clone(&self.destination), "destination", cancel)
            .await
        {
            Ok(task) => task,
            Err(e) => {
                cancel.cancel();
                let _ = source_task.await;
                return Err(e);
            }
        };

        let source = Self::join_fetch(source_task, cancel).await;
        let destination = Self::join_fetch(destination_task, cancel).await;

        match (source, destination) {
            (Ok(source), Ok(destination)) if !cancel.is_cancelled() => Ok((source, destination)),
            (Ok(_), Ok(_)) => Err(SyncError::Cancelled),
            // Prefer the error that caused the cancellation over the one it induced.
            (Err(e), Err(SyncError::Cancelled)) | (Err(SyncError::Cancelled), Err(e)) => Err(e),
            (Err(e), _) | (_, Err(e)) => Err(e),
        }
    }

    async fn submit_fetch(
        &self,
        source: Arc<dyn MetadataSource>,
        side: &'static str,
        cancel: &CancellationToken,
    ) -> Result<FetchHandle, SyncError> {
        let cancel = cancel.clone();
        let span = tracing::info_span!("fetch", side);

        self.pool
            .submit(
                async move {
                    let endpoint = source.endpoint();
                    tracing::info!("fetching {side} repo metadata {endpoint}");
                    match source.fetch_all(&cancel).await {
                        Ok(snapshot) => {
                            tracing::info!(
                                items = snapshot.len(),
                                "fetched {side} repo metadata {endpoint}"
                            );
                            Ok(snapshot)
                        }
                        Err(e) => {
                            if !e.is_cancelled() {
                                tracing::error!(error = %e, "fetch '{side}' failed");
                            }
                            cancel.cancel();
                            Err(e)
                        }
                    }
                }
                .instrument(span),
            )
            .await
    }

    async fn join_fetch(
        task: FetchHandle,
        cancel: &CancellationToken,
    ) -> Result<RepositorySnapshot, SyncError> {
        match task.await {
            Ok(result) => result,
            Err(e) => {
                cancel.cancel();
                Err(SyncError::Pool(format!("fetch task did not complete: {e}")))
            }
        }
    }

    /// Submit one retrying transfer task per planned item and wait for all.
    ///
    /// Items not yet submitted when the run is cancelled are recorded as
    /// cancelled without being attempted.
    async fn transfer_all(
        &self,
        planned: Vec<PlannedTransfer>,
        cancel: &CancellationToken,
    ) -> Result<Arc<OutcomeSet>, SyncError> {
        tracing::info!(
            phase = %RunPhase::Transferring,
            items = planned.len(),
            workers = self.pool.capacity(),
            "transferring"
        );

        let outcomes = Arc::new(OutcomeSet::new());
        let mut handles = Vec::with_capacity(planned.len());

        for transfer in planned {
            let path = transfer.path().to_owned();
            if cancel.is_cancelled() {
                outcomes.record(
                    path,
                    TransferOutcome::Failed {
                        attempts: 0,
                        error: SyncError::Cancelled,
                    },
                );
                continue;
            }

            let copier = Arc::clone(&self.copier);
            let task_outcomes = Arc::clone(&outcomes);
            let task_cancel = cancel.clone();
            let max_attempts = self.max_attempts;
            let span = tracing::info_span!("transfer", path = %path);

            let handle = self
                .pool
                .submit(
                    async move {
                        tracing::debug!("process");
                        let outcome = transfer_with_retry(
                            copier.as_ref(),
                            &transfer,
                            &task_cancel,
                            max_attempts,
                        )
                        .await;
                        task_outcomes.record(transfer.item.path, outcome);
                    }
                    .instrument(span),
                )
                .await?;
            handles.push((path, handle));
        }

        for (path, handle) in handles {
            if let Err(e) = handle.await {
                outcomes.record(
                    path,
                    TransferOutcome::Failed {
                        attempts: 0,
                        error: SyncError::Transfer(format!("transfer task did not complete: {e}")),
                    },
                );
            }
        }

        Ok(outcomes)
    }

    fn report(planned: usize, outcomes: &OutcomeSet) -> RunReport {
        tracing::info!(phase = %RunPhase::Reporting, "nexus-sync finished");

        let mut report = RunReport {
            planned,
            ..RunReport::default()
        };

        for (path, outcome) in outcomes.to_map() {
            match outcome {
                TransferOutcome::Transferred { .. } => report.transferred += 1,
                TransferOutcome::Failed { attempts, error } => {
                    tracing::warn!(path = %path, attempts, error = %error, "nexus-sync failed");
                    report.failures.insert(path, error);
                }
            }
        }

        tracing::info!(
            planned = report.planned,
            transferred = report.transferred,
            failed = report.failures.len(),
            "transfer summary"
        );
        report
    }
}
