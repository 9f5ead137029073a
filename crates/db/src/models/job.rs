use genbroker_core::job::{Job, JobStatus};
use genbroker_core::ports::StoreError;
use genbroker_core::types::{ArtifactId, JobId, Timestamp};
use sqlx::FromRow;
use uuid::Uuid;

/// A row from the `jobs` table.
#[derive(Debug, Clone, FromRow)]
pub struct JobRow {
    pub id: Uuid,
    pub persona_id: String,
    pub mode: String,
    pub platform: String,
    pub source_url: String,
    pub shot_type: Option<String>,
    pub settings: serde_json::Value,
    pub status_id: i16,
    pub error_message: Option<String>,
    pub media_generation_id: Option<Uuid>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl TryFrom<JobRow> for Job {
    type Error = StoreError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let mode = row
            .mode
            .parse()
            .map_err(|_| StoreError::Corrupt(format!("job {} has mode '{}'", row.id, row.mode)))?;
        let status = JobStatus::from_id(row.status_id).ok_or_else(|| {
            StoreError::Corrupt(format!("job {} has status_id {}", row.id, row.status_id))
        })?;

        Ok(Job {
            id: JobId::from_uuid(row.id),
            persona_id: row.persona_id,
            mode,
            platform: row.platform,
            source_url: row.source_url,
            shot_type: row.shot_type,
            settings: row.settings,
            status,
            error_message: row.error_message,
            media_generation_id: row.media_generation_id.map(ArtifactId::from_uuid),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
