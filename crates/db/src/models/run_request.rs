//! Rows of the `run_requests` table joined with its environment name and
//! ordered artifact ids.

use sqlx::FromRow;
use testrun_core::error::CoreError;
use testrun_core::run_request::RunRequest;
use testrun_core::status::{RunStatus, StatusId};
use testrun_core::types::{DbId, Timestamp};

/// A run request as read by `RunRequestRepo`.
#[derive(Debug, Clone, FromRow)]
pub struct RunRequestRow {
    pub id: DbId,
    pub requested_by: String,
    pub env_id: DbId,
    pub env_name: String,
    pub status_id: StatusId,
    /// Artifact ids ordered by `run_request_artifacts.position`.
    pub path: Vec<DbId>,
    pub logs: String,
    pub created_at: Timestamp,
}

impl TryFrom<RunRequestRow> for RunRequest {
    type Error = CoreError;

    fn try_from(row: RunRequestRow) -> Result<Self, Self::Error> {
        let status = RunStatus::from_id(row.status_id).ok_or_else(|| {
            CoreError::Internal(format!(
                "run request {} has unknown status_id {}",
                row.id, row.status_id
            ))
        })?;
        Ok(RunRequest {
            id: row.id,
            requested_by: row.requested_by,
            env: row.env_id,
            env_name: row.env_name,
            path: row.path,
            status,
            created_at: row.created_at,
            logs: row.logs,
        })
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::Utc;

    use super::*;

    fn row(status_id: StatusId) -> RunRequestRow {
        RunRequestRow {
            id: 1,
            requested_by: "Ramadan".into(),
            env_id: 2,
            env_name: "my_env".into(),
            status_id,
            path: vec![5, 3],
            logs: String::new(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn row_converts_with_ordered_path() {
        let run = RunRequest::try_from(row(RunStatus::Running.id())).unwrap();
        assert_eq!(run.status, RunStatus::Running);
        assert_eq!(run.path, vec![5, 3]);
        assert_eq!(run.env, 2);
    }

    #[test]
    fn unknown_status_id_is_internal_error() {
        assert_matches!(RunRequest::try_from(row(42)), Err(CoreError::Internal(_)));
    }
}
