use genbroker_core::reference::ReferenceImage;
use genbroker_core::ports::StoreError;
use sqlx::FromRow;

/// A row from the `persona_references` table (projection used for lookup).
#[derive(Debug, Clone, FromRow)]
pub struct ReferenceRow {
    pub role: String,
    pub url: String,
}

impl TryFrom<ReferenceRow> for ReferenceImage {
    type Error = StoreError;

    fn try_from(row: ReferenceRow) -> Result<Self, Self::Error> {
        let role = row
            .role
            .parse()
            .map_err(|_| StoreError::Corrupt(format!("reference role '{}'", row.role)))?;
        Ok(ReferenceImage::new(role, row.url))
    }
}
