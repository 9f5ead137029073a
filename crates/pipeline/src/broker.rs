//! Caller-facing facade over the orchestrator and the job queue.

use std::sync::Arc;

use genbroker_core::job::{Job, JobStatus, JobView};
use genbroker_core::ports::StoreError;
use genbroker_core::request::GenerationRequest;
use genbroker_core::types::JobId;

use crate::error::PipelineError;
use crate::orchestrator::Orchestrator;
use crate::queue::JobQueue;

#[derive(Clone)]
pub struct Broker {
    orchestrator: Arc<Orchestrator>,
    queue: JobQueue,
}

impl Broker {
    pub fn new(orchestrator: Arc<Orchestrator>, queue: JobQueue) -> Self {
        Self {
            orchestrator,
            queue,
        }
    }

    /// Accept a request and queue its job. Returns as soon as the `pending`
    /// row exists; no provider call has been made yet.
    ///
    /// Validation runs first, then admission: an invalid request or a full
    /// queue creates no row.
    pub async fn submit(&self, request: GenerationRequest) -> Result<Job, PipelineError> {
        let job = self.orchestrator.prepare(request)?;
        let permit = self.queue.try_reserve()?;
        self.orchestrator.record(&job).await?;
        permit.send(job.id);
        Ok(job)
    }

    pub async fn job_view(&self, id: JobId) -> Result<Option<JobView>, StoreError> {
        self.orchestrator.job_view(id).await
    }

    pub async fn list_jobs(&self, status: JobStatus, limit: i64) -> Result<Vec<Job>, StoreError> {
        self.orchestrator.list_jobs(status, limit).await
    }

    pub async fn store_health(&self) -> Result<(), StoreError> {
        self.orchestrator.store_health().await
    }

    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.orchestrator
    }

    pub fn queue(&self) -> &JobQueue {
        &self.queue
    }
}
