use genbroker_core::artifact::{Artifact, ArtifactQuality};
use genbroker_core::ports::StoreError;
use genbroker_core::types::{ArtifactId, JobId, Timestamp};
use sqlx::FromRow;
use uuid::Uuid;

/// A row from the `media_generations` table.
#[derive(Debug, Clone, FromRow)]
pub struct ArtifactRow {
    pub id: Uuid,
    pub job_id: Uuid,
    pub kind: String,
    pub url: String,
    pub model: String,
    pub prompt: String,
    pub settings: serde_json::Value,
    pub quality: String,
    pub status: String,
    pub created_at: Timestamp,
}

impl TryFrom<ArtifactRow> for Artifact {
    type Error = StoreError;

    fn try_from(row: ArtifactRow) -> Result<Self, Self::Error> {
        let kind = row.kind.parse().map_err(|_| {
            StoreError::Corrupt(format!("media generation {} has kind '{}'", row.id, row.kind))
        })?;

        Ok(Artifact {
            id: ArtifactId::from_uuid(row.id),
            job_id: JobId::from_uuid(row.job_id),
            kind,
            url: row.url,
            model: row.model,
            prompt: row.prompt,
            settings: row.settings,
            quality: ArtifactQuality::from_name(&row.quality),
            status: row.status,
            created_at: row.created_at,
        })
    }
}
