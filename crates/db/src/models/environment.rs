//! Rows of the `environments` table.

use sqlx::FromRow;
use testrun_core::environment::Environment;
use testrun_core::types::{DbId, Timestamp};

/// A row from the `environments` table.
#[derive(Debug, Clone, FromRow)]
pub struct EnvironmentRow {
    pub id: DbId,
    pub name: String,
    pub created_at: Timestamp,
}

impl From<EnvironmentRow> for Environment {
    fn from(row: EnvironmentRow) -> Self {
        Environment {
            id: row.id,
            name: row.name,
            created_at: row.created_at,
        }
    }
}
