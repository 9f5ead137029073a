//! Repository for the `media_generations` table.

use genbroker_core::artifact::Artifact;
use genbroker_core::types::{ArtifactId, JobId};
use sqlx::PgPool;

use crate::models::artifact::ArtifactRow;

const COLUMNS: &str = "\
    id, job_id, kind, url, model, prompt, settings, quality, status, created_at";

/// Name of the unique constraint that limits a job to one artifact.
pub const JOB_UNIQUE_CONSTRAINT: &str = "uq_media_generations_job_id";

pub struct ArtifactRepo;

impl ArtifactRepo {
    /// Insert an artifact. Fails with a unique violation on
    /// [`JOB_UNIQUE_CONSTRAINT`] if the job already has one.
    pub async fn insert(pool: &PgPool, artifact: &Artifact) -> Result<(), sqlx::Error> {
        let query = format!(
            "INSERT INTO media_generations ({COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)"
        );
        sqlx::query(&query)
            .bind(artifact.id.as_uuid())
            .bind(artifact.job_id.as_uuid())
            .bind(artifact.kind.as_str())
            .bind(&artifact.url)
            .bind(&artifact.model)
            .bind(&artifact.prompt)
            .bind(&artifact.settings)
            .bind(artifact.quality.as_str())
            .bind(&artifact.status)
            .bind(artifact.created_at)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn find_by_id(
        pool: &PgPool,
        id: ArtifactId,
    ) -> Result<Option<ArtifactRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM media_generations WHERE id = $1");
        sqlx::query_as::<_, ArtifactRow>(&query)
            .bind(id.as_uuid())
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_job(
        pool: &PgPool,
        job_id: JobId,
    ) -> Result<Option<ArtifactRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM media_generations WHERE job_id = $1");
        sqlx::query_as::<_, ArtifactRow>(&query)
            .bind(job_id.as_uuid())
            .fetch_optional(pool)
            .await
    }
}
