use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use tokio_util::sync::CancellationToken;

use crate::error::SyncError;
use crate::item::PlannedTransfer;
use crate::source::ArtifactCopier;

/// Attempts made per item before its failure becomes permanent.
pub const MAX_ATTEMPTS: u32 = 3;

/// Final result of mirroring one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    Transferred { attempts: u32 },
    /// Every attempt failed; `error` is the last one observed.
    Failed { attempts: u32, error: SyncError },
}

impl TransferOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Transferred { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            Self::Transferred { attempts } | Self::Failed { attempts, .. } => *attempts,
        }
    }

    pub fn error(&self) -> Option<&SyncError> {
        match self {
            Self::Transferred { .. } => None,
            Self::Failed { error, .. } => Some(error),
        }
    }
}

/// Copy one item, retrying immediately on failure.
///
/// The first success ends the loop. No more than `max_attempts` attempts are
/// made, and none are started once `cancel` has fired.
pub async fn transfer_with_retry(
    copier: &dyn ArtifactCopier,
    transfer: &PlannedTransfer,
    cancel: &CancellationToken,
    max_attempts: u32,
) -> TransferOutcome {
    let max_attempts = max_attempts.max(1);
    let mut attempts = 0;
    let mut last_error = SyncError::Cancelled;

    while attempts < max_attempts {
        if cancel.is_cancelled() {
            return TransferOutcome::Failed {
                attempts,
                error: SyncError::Cancelled,
            };
        }

        attempts += 1;
        match copier.copy(transfer, cancel).await {
            Ok(()) => {
                tracing::debug!(attempts, "transferred");
                return TransferOutcome::Transferred { attempts };
            }
            Err(e) => {
                tracing::debug!(attempt = attempts, error = %e, "transfer attempt failed");
                last_error = e;
            }
        }
    }

    TransferOutcome::Failed {
        attempts,
        error: last_error,
    }
}

/// Outcomes of a run's transfers, keyed by path.
///
/// Written concurrently by transfer tasks, once per path.
#[derive(Debug, Default)]
pub struct OutcomeSet {
    outcomes: Mutex<BTreeMap<String, TransferOutcome>>,
}

impl OutcomeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, path: impl Into<String>, outcome: TransferOutcome) {
        let path = path.into();
        let mut outcomes = self.outcomes.lock().unwrap_or_else(PoisonError::into_inner);
        let previous = outcomes.insert(path, outcome);
        debug_assert!(previous.is_none(), "outcome recorded twice");
    }

    pub fn len(&self) -> usize {
        self.outcomes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of every outcome recorded so far.
    pub fn to_map(&self) -> BTreeMap<String, TransferOutcome> {
        self.outcomes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
