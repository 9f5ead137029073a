//! Repository for the `persona_references` table.

use sqlx::PgPool;

use crate::models::reference::ReferenceRow;

pub struct ReferenceRepo;

impl ReferenceRepo {
    /// All reference images for a persona in display order.
    pub async fn list_for_persona(
        pool: &PgPool,
        persona_id: &str,
    ) -> Result<Vec<ReferenceRow>, sqlx::Error> {
        sqlx::query_as::<_, ReferenceRow>(
            "SELECT role, url FROM persona_references \
             WHERE persona_id = $1 \
             ORDER BY sort_order ASC, id ASC",
        )
        .bind(persona_id)
        .fetch_all(pool)
        .await
    }

    /// Register a reference image for a persona.
    pub async fn insert(
        pool: &PgPool,
        persona_id: &str,
        role: &str,
        url: &str,
        sort_order: i32,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO persona_references (persona_id, role, url, sort_order) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(persona_id)
        .bind(role)
        .bind(url)
        .bind(sort_order)
        .execute(pool)
        .await?;
        Ok(())
    }
}
