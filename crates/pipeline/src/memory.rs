//! In-memory stores with the same conditional-transition semantics as the
//! PostgreSQL ones. Used by tests and `STORE_BACKEND=memory`.

use std::collections::HashMap;

use async_trait::async_trait;
use genbroker_core::artifact::Artifact;
use genbroker_core::job::{Job, JobStatus};
use genbroker_core::ports::{ArtifactStore, JobCursor, JobStore, StoreError};
use genbroker_core::types::{ArtifactId, JobId, Timestamp};
use tokio::sync::RwLock;

/// Upper bound on a status listing page, matching the Postgres repository.
const MAX_LIST_LIMIT: i64 = 500;

#[derive(Debug, Default)]
pub struct MemoryJobStore {
    jobs: RwLock<HashMap<JobId, Job>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply `update` if the job exists and may move to `next`.
    async fn transition(
        &self,
        id: JobId,
        next: JobStatus,
        at: Timestamp,
        update: impl FnOnce(&mut Job),
    ) -> bool {
        let mut jobs = self.jobs.write().await;
        match jobs.get_mut(&id) {
            Some(job) if job.status.can_transition_to(next) => {
                job.status = next;
                job.updated_at = at;
                update(job);
                true
            }
            _ => false,
        }
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn insert(&self, job: &Job) -> Result<(), StoreError> {
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&job.id) {
            return Err(StoreError::Conflict(format!("job {} already exists", job.id)));
        }
        jobs.insert(job.id, job.clone());
        Ok(())
    }

    async fn find(&self, id: JobId) -> Result<Option<Job>, StoreError> {
        Ok(self.jobs.read().await.get(&id).cloned())
    }

    async fn list_by_status_after(
        &self,
        status: JobStatus,
        after: Option<JobCursor>,
        limit: i64,
    ) -> Result<Vec<Job>, StoreError> {
        let jobs = self.jobs.read().await;
        let mut matching: Vec<Job> = jobs
            .values()
            .filter(|j| j.status == status)
            .filter(|j| after.map_or(true, |c| (j.created_at, j.id) > (c.created_at, c.id)))
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        matching.truncate(usize::try_from(limit.clamp(1, MAX_LIST_LIMIT)).unwrap_or(1));
        Ok(matching)
    }

    async fn mark_processing(&self, id: JobId, at: Timestamp) -> Result<bool, StoreError> {
        Ok(self.transition(id, JobStatus::Processing, at, |_| {}).await)
    }

    async fn mark_completed(
        &self,
        id: JobId,
        artifact_id: ArtifactId,
        at: Timestamp,
    ) -> Result<bool, StoreError> {
        Ok(self
            .transition(id, JobStatus::Completed, at, |job| {
                job.media_generation_id = Some(artifact_id);
                job.error_message = None;
            })
            .await)
    }

    async fn mark_failed(&self, id: JobId, error: &str, at: Timestamp) -> Result<bool, StoreError> {
        Ok(self
            .transition(id, JobStatus::Failed, at, |job| {
                job.error_message = Some(error.to_string());
            })
            .await)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Artifacts keyed by id, unique on `job_id`.
#[derive(Debug, Default)]
pub struct MemoryArtifactStore {
    artifacts: RwLock<HashMap<ArtifactId, Artifact>>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.artifacts.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.artifacts.read().await.is_empty()
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    async fn insert(&self, artifact: &Artifact) -> Result<(), StoreError> {
        let mut artifacts = self.artifacts.write().await;
        if artifacts.values().any(|a| a.job_id == artifact.job_id) {
            return Err(StoreError::Conflict(format!(
                "job {} already has an artifact",
                artifact.job_id
            )));
        }
        artifacts.insert(artifact.id, artifact.clone());
        Ok(())
    }

    async fn find(&self, id: ArtifactId) -> Result<Option<Artifact>, StoreError> {
        Ok(self.artifacts.read().await.get(&id).cloned())
    }

    async fn find_by_job(&self, job_id: JobId) -> Result<Option<Artifact>, StoreError> {
        Ok(self
            .artifacts
            .read()
            .await
            .values()
            .find(|a| a.job_id == job_id)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use genbroker_core::artifact::{ArtifactQuality, ARTIFACT_STATUS_READY};
    use genbroker_core::ids::{IdGenerator, SequentialIdGenerator};
    use genbroker_core::job::MediaMode;
    use serde_json::json;

    use super::*;

    fn job(ids: &SequentialIdGenerator, created_at: Timestamp) -> Job {
        Job {
            id: ids.job_id(),
            persona_id: "ava".into(),
            mode: MediaMode::Image,
            platform: "pinterest".into(),
            source_url: "https://x/img.png".into(),
            shot_type: None,
            settings: json!({}),
            status: JobStatus::Pending,
            error_message: None,
            media_generation_id: None,
            created_at,
            updated_at: created_at,
        }
    }

    fn artifact(ids: &SequentialIdGenerator, job_id: JobId) -> Artifact {
        Artifact {
            id: ids.artifact_id(),
            job_id,
            kind: MediaMode::Image,
            url: "https://cdn/x.png".into(),
            model: "m".into(),
            prompt: "p".into(),
            settings: json!({}),
            quality: ArtifactQuality::Standard,
            status: ARTIFACT_STATUS_READY.into(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn transitions_only_move_forward() {
        let ids = SequentialIdGenerator::new();
        let store = MemoryJobStore::new();
        let job = job(&ids, Utc::now());
        store.insert(&job).await.unwrap();
        let now = Utc::now();

        assert!(!store.mark_completed(job.id, ids.artifact_id(), now).await.unwrap());
        assert!(store.mark_processing(job.id, now).await.unwrap());
        assert!(!store.mark_processing(job.id, now).await.unwrap());
        assert!(store.mark_failed(job.id, "boom", now).await.unwrap());
        assert!(!store.mark_processing(job.id, now).await.unwrap());

        let found = store.find(job.id).await.unwrap().unwrap();
        assert_eq!(found.status, JobStatus::Failed);
        assert_eq!(found.error_message.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn duplicate_job_insert_conflicts() {
        let ids = SequentialIdGenerator::new();
        let store = MemoryJobStore::new();
        let job = job(&ids, Utc::now());
        store.insert(&job).await.unwrap();
        assert!(matches!(store.insert(&job).await, Err(StoreError::Conflict(_))));
    }

    #[tokio::test]
    async fn list_by_status_is_oldest_first_and_limited() {
        let ids = SequentialIdGenerator::new();
        let store = MemoryJobStore::new();
        let now = Utc::now();
        let newer = job(&ids, now);
        let older = job(&ids, now - Duration::minutes(1));
        store.insert(&newer).await.unwrap();
        store.insert(&older).await.unwrap();

        let listed = store.list_by_status(JobStatus::Pending, 10).await.unwrap();
        assert_eq!(listed.iter().map(|j| j.id).collect::<Vec<_>>(), vec![older.id, newer.id]);
        assert_eq!(store.list_by_status(JobStatus::Pending, 1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn list_after_cursor_resumes_past_equal_timestamps() {
        let ids = SequentialIdGenerator::new();
        let store = MemoryJobStore::new();
        let now = Utc::now();
        let mut inserted = Vec::new();
        for _ in 0..3 {
            let job = job(&ids, now);
            store.insert(&job).await.unwrap();
            inserted.push(job.id);
        }

        let first = store.list_by_status(JobStatus::Pending, 2).await.unwrap();
        let cursor = JobCursor::of(first.last().unwrap());
        let rest = store
            .list_by_status_after(JobStatus::Pending, Some(cursor), 2)
            .await
            .unwrap();

        let mut seen: Vec<_> = first.iter().chain(&rest).map(|j| j.id).collect();
        assert_eq!(seen.len(), 3);
        seen.sort();
        inserted.sort();
        assert_eq!(seen, inserted);
    }

    #[tokio::test]
    async fn one_artifact_per_job() {
        let ids = SequentialIdGenerator::new();
        let store = MemoryArtifactStore::new();
        let job_id = ids.job_id();
        let first = artifact(&ids, job_id);
        store.insert(&first).await.unwrap();

        let err = store.insert(&artifact(&ids, job_id)).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        assert_eq!(store.find_by_job(job_id).await.unwrap().unwrap().id, first.id);
        assert_eq!(store.len().await, 1);
    }
}
