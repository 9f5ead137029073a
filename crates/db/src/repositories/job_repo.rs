//! Repository for the `jobs` table.
//!
//! Status transitions are conditional updates keyed on the allowed
//! predecessor statuses from `JobStatus::allowed_predecessors`, so a row can
//! never move backwards or leave a terminal state.

use genbroker_core::job::{Job, JobStatus, StatusId};
use genbroker_core::types::{ArtifactId, JobId, Timestamp};
use sqlx::PgPool;

use crate::models::job::JobRow;

/// Column list for `jobs` queries.
const COLUMNS: &str = "\
    id, persona_id, mode, platform, source_url, shot_type, settings, \
    status_id, error_message, media_generation_id, created_at, updated_at";

/// Maximum page size for status listings.
pub const MAX_LIMIT: i64 = 500;

fn predecessor_ids(status: JobStatus) -> Vec<StatusId> {
    status.allowed_predecessors().iter().map(|s| s.id()).collect()
}

/// Provides persistence for generation jobs.
pub struct JobRepo;

impl JobRepo {
    /// Insert a freshly accepted job.
    pub async fn insert(pool: &PgPool, job: &Job) -> Result<(), sqlx::Error> {
        let query = format!(
            "INSERT INTO jobs ({COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)"
        );
        sqlx::query(&query)
            .bind(job.id.as_uuid())
            .bind(&job.persona_id)
            .bind(job.mode.as_str())
            .bind(&job.platform)
            .bind(&job.source_url)
            .bind(&job.shot_type)
            .bind(&job.settings)
            .bind(job.status.id())
            .bind(&job.error_message)
            .bind(job.media_generation_id.map(|a| a.as_uuid()))
            .bind(job.created_at)
            .bind(job.updated_at)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Find a job by its ID.
    pub async fn find_by_id(pool: &PgPool, id: JobId) -> Result<Option<JobRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM jobs WHERE id = $1");
        sqlx::query_as::<_, JobRow>(&query)
            .bind(id.as_uuid())
            .fetch_optional(pool)
            .await
    }

    /// List jobs in a status, oldest first, optionally after a
    /// `(created_at, id)` keyset position. `limit` is clamped to
    /// `1..=MAX_LIMIT`.
    pub async fn list_by_status(
        pool: &PgPool,
        status: JobStatus,
        after: Option<(Timestamp, JobId)>,
        limit: i64,
    ) -> Result<Vec<JobRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM jobs \
             WHERE status_id = $1 \
               AND ($2::timestamptz IS NULL OR (created_at, id) > ($2, $3)) \
             ORDER BY created_at ASC, id ASC \
             LIMIT $4"
        );
        sqlx::query_as::<_, JobRow>(&query)
            .bind(status.id())
            .bind(after.map(|(at, _)| at))
            .bind(after.map(|(_, id)| id.as_uuid()))
            .bind(limit.clamp(1, MAX_LIMIT))
            .fetch_all(pool)
            .await
    }

    /// Move a pending job to `processing`. Returns `false` if another caller
    /// already claimed it or it is no longer pending.
    pub async fn mark_processing(
        pool: &PgPool,
        id: JobId,
        at: Timestamp,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE jobs SET status_id = $2, updated_at = $3 \
             WHERE id = $1 AND status_id = ANY($4)",
        )
        .bind(id.as_uuid())
        .bind(JobStatus::Processing.id())
        .bind(at)
        .bind(predecessor_ids(JobStatus::Processing))
        .execute(pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Move a processing job to `completed` and set the artifact backlink
    /// in the same statement.
    pub async fn mark_completed(
        pool: &PgPool,
        id: JobId,
        artifact_id: ArtifactId,
        at: Timestamp,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE jobs SET status_id = $2, media_generation_id = $3, \
                 error_message = NULL, updated_at = $4 \
             WHERE id = $1 AND status_id = ANY($5)",
        )
        .bind(id.as_uuid())
        .bind(JobStatus::Completed.id())
        .bind(artifact_id.as_uuid())
        .bind(at)
        .bind(predecessor_ids(JobStatus::Completed))
        .execute(pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Move a job to `failed` with an error message.
    pub async fn mark_failed(
        pool: &PgPool,
        id: JobId,
        error: &str,
        at: Timestamp,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE jobs SET status_id = $2, error_message = $3, updated_at = $4 \
             WHERE id = $1 AND status_id = ANY($5)",
        )
        .bind(id.as_uuid())
        .bind(JobStatus::Failed.id())
        .bind(error)
        .bind(at)
        .bind(predecessor_ids(JobStatus::Failed))
        .execute(pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}
