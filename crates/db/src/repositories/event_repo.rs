//! Repository for the `platform_events` table.

use sqlx::PgPool;
use testrun_core::types::DbId;

use crate::models::event::EventRow;

/// Column list for `platform_events` queries.
const COLUMNS: &str =
    "id, event_type, source_entity_type, source_entity_id, payload, created_at";

pub struct EventRepo;

impl EventRepo {
    /// Insert a new event row, returning the generated ID.
    pub async fn insert(
        pool: &PgPool,
        event_type: &str,
        source_entity_type: Option<&str>,
        source_entity_id: Option<DbId>,
        payload: &serde_json::Value,
    ) -> Result<DbId, sqlx::Error> {
        sqlx::query_scalar(
            "INSERT INTO platform_events \
                 (event_type, source_entity_type, source_entity_id, payload) \
             VALUES ($1, $2, $3, $4) \
             RETURNING id",
        )
        .bind(event_type)
        .bind(source_entity_type)
        .bind(source_entity_id)
        .bind(payload)
        .fetch_one(pool)
        .await
    }

    /// Events recorded for one entity, oldest first.
    pub async fn list_for_entity(
        pool: &PgPool,
        entity_type: &str,
        entity_id: DbId,
    ) -> Result<Vec<EventRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM platform_events \
             WHERE source_entity_type = $1 AND source_entity_id = $2 \
             ORDER BY created_at, id"
        );
        sqlx::query_as::<_, EventRow>(&query)
            .bind(entity_type)
            .bind(entity_id)
            .fetch_all(pool)
            .await
    }
}
