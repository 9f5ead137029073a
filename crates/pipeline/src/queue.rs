//! Bounded job queue and worker pool.
//!
//! Admission happens before a job row exists: [`JobQueue::try_reserve`]
//! takes a queue slot, and only then is the row inserted and the id sent.
//! A single dispatcher task pulls ids and runs each under a concurrency
//! permit, tracked so shutdown can drain in-flight jobs.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use genbroker_core::types::JobId;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::mpsc::{self, OwnedPermit};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::error::QueueError;
use crate::orchestrator::Orchestrator;

/// Producer side of the job queue.
#[derive(Clone)]
pub struct JobQueue {
    tx: mpsc::Sender<JobId>,
}

impl JobQueue {
    /// Take a slot without waiting. The slot is released if the permit is
    /// dropped unsent.
    pub fn try_reserve(&self) -> Result<OwnedPermit<JobId>, QueueError> {
        self.tx.clone().try_reserve_owned().map_err(|e| match e {
            TrySendError::Full(_) => QueueError::Full,
            TrySendError::Closed(_) => QueueError::Closed,
        })
    }

    /// Enqueue an existing job, waiting for space.
    pub async fn enqueue(&self, id: JobId) -> Result<(), QueueError> {
        self.tx.send(id).await.map_err(|_| QueueError::Closed)
    }

    /// Free slots right now.
    pub fn available(&self) -> usize {
        self.tx.capacity()
    }
}

/// Ids of jobs with a live worker in this process.
#[derive(Clone, Default)]
struct ActiveJobs(Arc<Mutex<HashSet<JobId>>>);

impl ActiveJobs {
    fn lock(&self) -> std::sync::MutexGuard<'_, HashSet<JobId>> {
        self.0.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register `id`, or `None` if a worker already holds it.
    fn acquire(&self, id: JobId) -> Option<ActiveGuard> {
        if self.lock().insert(id) {
            Some(ActiveGuard {
                jobs: self.clone(),
                id,
            })
        } else {
            None
        }
    }

    fn len(&self) -> usize {
        self.lock().len()
    }
}

/// Removes the id from the active set when the worker ends, including on
/// panic.
struct ActiveGuard {
    jobs: ActiveJobs,
    id: JobId,
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.jobs.lock().remove(&self.id);
    }
}

pub struct WorkerPool {
    dispatcher: JoinHandle<()>,
    tracker: TaskTracker,
    cancel: CancellationToken,
    active: ActiveJobs,
}

impl WorkerPool {
    /// Spawn the dispatcher. Returns the producer handle and the pool.
    pub fn start(
        orchestrator: Arc<Orchestrator>,
        capacity: usize,
        concurrency: usize,
        cancel: CancellationToken,
    ) -> (JobQueue, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let tracker = TaskTracker::new();
        let active = ActiveJobs::default();

        let dispatcher = tokio::spawn(dispatch(
            rx,
            orchestrator,
            Arc::new(Semaphore::new(concurrency.max(1))),
            tracker.clone(),
            active.clone(),
            cancel.clone(),
        ));

        tracing::info!(capacity, concurrency, "Worker pool started");
        (
            JobQueue { tx },
            Self {
                dispatcher,
                tracker,
                cancel,
                active,
            },
        )
    }

    /// Jobs currently running in this process.
    pub fn active_jobs(&self) -> usize {
        self.active.len()
    }

    /// Stop dispatching and wait up to `timeout` for in-flight jobs.
    ///
    /// Returns `true` if every in-flight job finished. Ids still queued
    /// stay `pending` in the store and are picked up by the reconciler on
    /// the next start.
    pub async fn shutdown(self, timeout: Duration) -> bool {
        self.cancel.cancel();
        if let Err(e) = self.dispatcher.await {
            tracing::error!(error = %e, "Job dispatcher panicked");
        }
        self.tracker.close();

        let in_flight = self.tracker.len();
        let drained = tokio::time::timeout(timeout, self.tracker.wait())
            .await
            .is_ok();
        if drained {
            tracing::info!(in_flight, "Worker pool drained");
        } else {
            tracing::warn!(
                remaining = self.tracker.len(),
                timeout_secs = timeout.as_secs(),
                "Worker pool shutdown timed out with jobs in flight",
            );
        }
        drained
    }
}

async fn dispatch(
    mut rx: mpsc::Receiver<JobId>,
    orchestrator: Arc<Orchestrator>,
    semaphore: Arc<Semaphore>,
    tracker: TaskTracker,
    active: ActiveJobs,
    cancel: CancellationToken,
) {
    loop {
        let id = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            msg = rx.recv() => match msg {
                Some(id) => id,
                None => break,
            },
        };

        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            permit = semaphore.clone().acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };

        let Some(guard) = active.acquire(id) else {
            tracing::warn!(job_id = %id, "Job already has an active worker, dropping duplicate");
            continue;
        };

        let orchestrator = Arc::clone(&orchestrator);
        tracker.spawn(async move {
            let _permit = permit;
            let _guard = guard;
            orchestrator.run_job(id).await;
        });
    }

    rx.close();
    tracing::info!("Job dispatcher stopped");
}
