//! Startup recovery for jobs left behind by a previous process.

use std::sync::Arc;

use genbroker_core::clock::Clock;
use genbroker_core::job::{Job, JobStatus};
use genbroker_core::ports::{ArtifactStore, JobCursor, JobStore, StoreError};

use crate::orchestrator::INTERRUPTED_MESSAGE;
use crate::queue::JobQueue;

/// Counts of what [`Reconciler::recover`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    pub requeued: usize,
    pub completed: usize,
    pub failed: usize,
}

pub struct Reconciler {
    jobs: Arc<dyn JobStore>,
    artifacts: Arc<dyn ArtifactStore>,
    queue: JobQueue,
    clock: Arc<dyn Clock>,
    /// Page size for both sweeps.
    limit: i64,
}

impl Reconciler {
    pub fn new(
        jobs: Arc<dyn JobStore>,
        artifacts: Arc<dyn ArtifactStore>,
        queue: JobQueue,
        clock: Arc<dyn Clock>,
        limit: i64,
    ) -> Self {
        Self {
            jobs,
            artifacts,
            queue,
            clock,
            limit,
        }
    }

    /// Settle `processing` jobs, then re-enqueue `pending` ones.
    ///
    /// A `processing` job whose artifact exists crashed between the artifact
    /// insert and the job update, so it is completed with the backlink.
    /// Without an artifact it is failed: its provider task cannot be
    /// resumed.
    ///
    /// Must finish before new jobs are accepted: any `processing` row is
    /// assumed to belong to a dead process. Both sweeps page through every
    /// matching job, `limit` at a time.
    pub async fn recover(&self) -> Result<RecoveryReport, StoreError> {
        let mut report = RecoveryReport::default();

        let mut after = None;
        loop {
            let page = self
                .jobs
                .list_by_status_after(JobStatus::Processing, after, self.limit)
                .await?;
            let Some(last) = page.last() else { break };
            after = Some(JobCursor::of(last));

            for job in &page {
                self.settle(job, &mut report).await?;
            }
        }

        let mut after = None;
        'pending: loop {
            let page = self
                .jobs
                .list_by_status_after(JobStatus::Pending, after, self.limit)
                .await?;
            let Some(last) = page.last() else { break };
            after = Some(JobCursor::of(last));

            for job in &page {
                if let Err(e) = self.queue.enqueue(job.id).await {
                    tracing::error!(job_id = %job.id, error = %e, "Failed to re-enqueue pending job");
                    break 'pending;
                }
                report.requeued += 1;
            }
        }

        tracing::info!(
            requeued = report.requeued,
            completed = report.completed,
            failed = report.failed,
            "Startup reconciliation finished",
        );
        Ok(report)
    }

    async fn settle(&self, job: &Job, report: &mut RecoveryReport) -> Result<(), StoreError> {
        let now = self.clock.now();
        match self.artifacts.find_by_job(job.id).await? {
            Some(artifact) => {
                if self.jobs.mark_completed(job.id, artifact.id, now).await? {
                    tracing::info!(job_id = %job.id, artifact_id = %artifact.id, "Recovered completed job");
                    report.completed += 1;
                }
            }
            None => {
                if self.jobs.mark_failed(job.id, INTERRUPTED_MESSAGE, now).await? {
                    tracing::warn!(job_id = %job.id, "Failed job interrupted mid-flight");
                    report.failed += 1;
                }
            }
        }
        Ok(())
    }
}
