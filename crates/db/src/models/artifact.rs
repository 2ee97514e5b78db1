//! Rows of the `artifacts` table.

use sqlx::FromRow;
use testrun_core::artifact::Artifact;
use testrun_core::types::{DbId, Timestamp};

/// A row from the `artifacts` table.
#[derive(Debug, Clone, FromRow)]
pub struct ArtifactRow {
    pub id: DbId,
    pub path: String,
    pub created_at: Timestamp,
}

impl From<ArtifactRow> for Artifact {
    fn from(row: ArtifactRow) -> Self {
        Artifact {
            id: row.id,
            path: row.path,
            created_at: row.created_at,
        }
    }
}
