//! PostgreSQL-backed implementations of the `genbroker_core::ports` store
//! traits.

use async_trait::async_trait;
use genbroker_core::artifact::Artifact;
use genbroker_core::job::{Job, JobStatus};
use genbroker_core::ports::{
    ArtifactStore, CollaboratorError, JobCursor, JobStore, ReferenceResolver, StoreError,
};
use genbroker_core::reference::ReferenceImage;
use genbroker_core::types::{ArtifactId, JobId, Timestamp};

use crate::repositories::{ArtifactRepo, JobRepo, ReferenceRepo};
use crate::DbPool;

/// Map a sqlx error onto the store error taxonomy.
///
/// PostgreSQL unique violations (23505) on a `uq_` constraint become
/// [`StoreError::Conflict`]; everything else is `Unavailable`.
pub fn classify_sqlx_error(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some("23505") {
            let constraint = db_err.constraint().unwrap_or("unknown");
            if constraint.starts_with("uq_") {
                return StoreError::Conflict(format!(
                    "Duplicate value violates unique constraint: {constraint}"
                ));
            }
        }
    }
    StoreError::Unavailable(err.to_string())
}

// ---------------------------------------------------------------------------
// Jobs
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct PgJobStore {
    pool: DbPool,
}

impl PgJobStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn insert(&self, job: &Job) -> Result<(), StoreError> {
        JobRepo::insert(&self.pool, job)
            .await
            .map_err(classify_sqlx_error)
    }

    async fn find(&self, id: JobId) -> Result<Option<Job>, StoreError> {
        JobRepo::find_by_id(&self.pool, id)
            .await
            .map_err(classify_sqlx_error)?
            .map(Job::try_from)
            .transpose()
    }

    async fn list_by_status_after(
        &self,
        status: JobStatus,
        after: Option<JobCursor>,
        limit: i64,
    ) -> Result<Vec<Job>, StoreError> {
        let after = after.map(|c| (c.created_at, c.id));
        JobRepo::list_by_status(&self.pool, status, after, limit)
            .await
            .map_err(classify_sqlx_error)?
            .into_iter()
            .map(Job::try_from)
            .collect()
    }

    async fn mark_processing(&self, id: JobId, at: Timestamp) -> Result<bool, StoreError> {
        JobRepo::mark_processing(&self.pool, id, at)
            .await
            .map_err(classify_sqlx_error)
    }

    async fn mark_completed(
        &self,
        id: JobId,
        artifact_id: ArtifactId,
        at: Timestamp,
    ) -> Result<bool, StoreError> {
        JobRepo::mark_completed(&self.pool, id, artifact_id, at)
            .await
            .map_err(classify_sqlx_error)
    }

    async fn mark_failed(&self, id: JobId, error: &str, at: Timestamp) -> Result<bool, StoreError> {
        JobRepo::mark_failed(&self.pool, id, error, at)
            .await
            .map_err(classify_sqlx_error)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        crate::health_check(&self.pool)
            .await
            .map_err(classify_sqlx_error)
    }
}

// ---------------------------------------------------------------------------
// Artifacts
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct PgArtifactStore {
    pool: DbPool,
}

impl PgArtifactStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ArtifactStore for PgArtifactStore {
    async fn insert(&self, artifact: &Artifact) -> Result<(), StoreError> {
        ArtifactRepo::insert(&self.pool, artifact)
            .await
            .map_err(classify_sqlx_error)
    }

    async fn find(&self, id: ArtifactId) -> Result<Option<Artifact>, StoreError> {
        ArtifactRepo::find_by_id(&self.pool, id)
            .await
            .map_err(classify_sqlx_error)?
            .map(Artifact::try_from)
            .transpose()
    }

    async fn find_by_job(&self, job_id: JobId) -> Result<Option<Artifact>, StoreError> {
        ArtifactRepo::find_by_job(&self.pool, job_id)
            .await
            .map_err(classify_sqlx_error)?
            .map(Artifact::try_from)
            .transpose()
    }
}

// ---------------------------------------------------------------------------
// Persona references
// ---------------------------------------------------------------------------

/// Reads persona reference images from `persona_references`.
#[derive(Clone)]
pub struct PgReferenceResolver {
    pool: DbPool,
}

impl PgReferenceResolver {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReferenceResolver for PgReferenceResolver {
    async fn resolve(&self, persona_id: &str) -> Result<Vec<ReferenceImage>, CollaboratorError> {
        let rows = ReferenceRepo::list_for_persona(&self.pool, persona_id)
            .await
            .map_err(|e| CollaboratorError::new("reference lookup", e.to_string()))?;
        rows.into_iter()
            .map(|row| {
                ReferenceImage::try_from(row)
                    .map_err(|e| CollaboratorError::new("reference lookup", e.to_string()))
            })
            .collect()
    }
}
