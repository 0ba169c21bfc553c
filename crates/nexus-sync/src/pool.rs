use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::error::SyncError;

/// Pool capacity used when none is configured.
pub const DEFAULT_POOL_CAPACITY: usize = 16;

/// Fixed-capacity executor for fetch and transfer work.
///
/// Each submitted task holds one permit for as long as it runs. When every
/// permit is taken, `submit` waits for a running task to finish; there is no
/// unbounded queue behind it. Permits are released on every exit path of a
/// task, including panics.
#[derive(Debug)]
pub struct WorkerPool {
    capacity: usize,
    permits: Arc<Semaphore>,
    span: tracing::Span,
}

impl WorkerPool {
    /// Create a pool running at most `capacity` tasks at once.
    ///
    /// Tasks run inside `span`, so their events carry the pool's context.
    pub fn new(capacity: usize, span: tracing::Span) -> Result<Self, SyncError> {
        if capacity == 0 {
            return Err(SyncError::Pool("capacity must be at least 1".into()));
        }
        if capacity > Semaphore::MAX_PERMITS || u32::try_from(capacity).is_err() {
            return Err(SyncError::Pool(format!("capacity {capacity} is too large")));
        }

        Ok(Self {
            capacity,
            permits: Arc::new(Semaphore::new(capacity)),
            span,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of workers currently free.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Run `task` on the pool, waiting for a free worker first.
    ///
    /// Completion order among submitted tasks is unspecified.
    pub async fn submit<F, T>(&self, task: F) -> Result<JoinHandle<T>, SyncError>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| SyncError::Pool("pool is closed".into()))?;

        let work = async move {
            let _permit = permit;
            task.await
        };

        Ok(tokio::spawn(work.instrument(self.span.clone())))
    }

    /// Wait for every in-flight task to finish, then shut the pool down.
    pub async fn release(self) {
        // Holding every permit means no task is still running.
        let drained = self.permits.acquire_many(self.capacity as u32).await;
        if drained.is_err() {
            tracing::debug!(parent: &self.span, "worker pool was already closed");
        }
        self.permits.close();
        tracing::debug!(parent: &self.span, capacity = self.capacity, "worker pool released");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    use tokio::sync::oneshot;

    use super::*;

    fn pool(capacity: usize) -> WorkerPool {
        WorkerPool::new(capacity, tracing::Span::none()).unwrap()
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let result = WorkerPool::new(0, tracing::Span::none());
        assert!(matches!(result, Err(SyncError::Pool(_))));
    }

    #[tokio::test]
    async fn never_runs_more_than_capacity_tasks() {
        let pool = pool(3);
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let finished = Arc::new(AtomicUsize::new(0));

        for _ in 0..20 {
            let active = Arc::clone(&active);
            let peak = Arc::clone(&peak);
            let finished = Arc::clone(&finished);
            pool.submit(async move {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                active.fetch_sub(1, Ordering::SeqCst);
                finished.fetch_add(1, Ordering::SeqCst);
            })
            .await
            .unwrap();
        }

        pool.release().await;

        assert_eq!(finished.load(Ordering::SeqCst), 20);
        assert!(peak.load(Ordering::SeqCst) <= 3, "peak was {}", peak.load(Ordering::SeqCst));
        assert!(peak.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn submit_waits_while_pool_is_full() {
        let pool = pool(1);
        let (release_tx, release_rx) = oneshot::channel::<()>();

        pool.submit(async move {
            let _ = release_rx.await;
        })
        .await
        .unwrap();
        assert_eq!(pool.available(), 0);

        let blocked = tokio::time::timeout(Duration::from_millis(50), pool.submit(async {})).await;
        assert!(blocked.is_err(), "submit should wait for a free worker");

        release_tx.send(()).unwrap();
        let handle = pool.submit(async { 7 }).await.unwrap();
        assert_eq!(handle.await.unwrap(), 7);
    }

    #[tokio::test]
    async fn release_waits_for_in_flight_tasks() {
        let pool = pool(2);
        let done = Arc::new(AtomicBool::new(false));

        let flag = Arc::clone(&done);
        pool.submit(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            flag.store(true, Ordering::SeqCst);
        })
        .await
        .unwrap();

        pool.release().await;
        assert!(done.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn panicking_task_frees_its_worker() {
        let pool = pool(1);

        let handle = pool
            .submit(async {
                if true {
                    panic!("task failed");
                }
            })
            .await
            .unwrap();
        assert!(handle.await.is_err());
        assert_eq!(pool.available(), 1);

        pool.release().await;
    }

    #[tokio::test]
    async fn release_of_idle_pool_returns_immediately() {
        let pool = pool(4);
        tokio::time::timeout(Duration::from_millis(100), pool.release())
            .await
            .unwrap();
    }
}
