//! [`PgStore`]: the `testrun_core` storage traits over PostgreSQL.

use async_trait::async_trait;
use sqlx::PgPool;
use testrun_core::artifact::Artifact;
use testrun_core::environment::Environment;
use testrun_core::error::CoreError;
use testrun_core::pagination::Page;
use testrun_core::run_request::{NewRunRequest, RunRequest, RunRequestSummary};
use testrun_core::status::RunStatus;
use testrun_core::store::{ArtifactStore, EnvironmentStore, RunRequestStore, StoreHealth};
use testrun_core::types::DbId;

use crate::repositories::{ArtifactRepo, EnvironmentRepo, RunRequestRepo};

/// PostgreSQL unique-violation SQLSTATE.
const UNIQUE_VIOLATION: &str = "23505";
/// PostgreSQL foreign-key-violation SQLSTATE.
const FOREIGN_KEY_VIOLATION: &str = "23503";

/// Store backed by a shared connection pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Classify a sqlx error into a domain error.
///
/// Unique violations on `uq_*` constraints become `Conflict`; foreign-key
/// violations become `Validation`. Anything else is logged and reported
/// as `Internal` with a sanitized message.
pub(crate) fn map_db_error(err: sqlx::Error) -> CoreError {
    if let sqlx::Error::Database(db_err) = &err {
        let code = db_err.code();
        let constraint = db_err.constraint().unwrap_or("unknown");
        if code.as_deref() == Some(UNIQUE_VIOLATION) && constraint.starts_with("uq_") {
            return CoreError::Conflict(format!(
                "Duplicate value violates unique constraint: {constraint}"
            ));
        }
        if code.as_deref() == Some(FOREIGN_KEY_VIOLATION) {
            return CoreError::Validation(format!(
                "Referenced row does not exist: {constraint}"
            ));
        }
    }
    tracing::error!(error = %err, "Database error");
    CoreError::Internal("An internal error occurred".into())
}

#[async_trait]
impl ArtifactStore for PgStore {
    async fn find_artifact_by_path(&self, path: &str) -> Result<Option<Artifact>, CoreError> {
        let row = ArtifactRepo::find_by_path(&self.pool, path)
            .await
            .map_err(map_db_error)?;
        Ok(row.map(Artifact::from))
    }

    async fn insert_artifact(&self, path: &str) -> Result<Artifact, CoreError> {
        ArtifactRepo::create(&self.pool, path)
            .await
            .map(Artifact::from)
            .map_err(map_db_error)
    }

    async fn find_artifacts(&self, ids: &[DbId]) -> Result<Vec<Artifact>, CoreError> {
        let rows = ArtifactRepo::find_by_ids(&self.pool, ids)
            .await
            .map_err(map_db_error)?;
        Ok(rows.into_iter().map(Artifact::from).collect())
    }

    async fn list_artifacts(&self, page: Page) -> Result<Vec<Artifact>, CoreError> {
        let rows = ArtifactRepo::list(&self.pool, page.limit, page.offset)
            .await
            .map_err(map_db_error)?;
        Ok(rows.into_iter().map(Artifact::from).collect())
    }
}

#[async_trait]
impl EnvironmentStore for PgStore {
    async fn find_environment(&self, id: DbId) -> Result<Option<Environment>, CoreError> {
        let row = EnvironmentRepo::find_by_id(&self.pool, id)
            .await
            .map_err(map_db_error)?;
        Ok(row.map(Environment::from))
    }

    async fn list_environments(&self) -> Result<Vec<Environment>, CoreError> {
        let rows = EnvironmentRepo::list(&self.pool).await.map_err(map_db_error)?;
        Ok(rows.into_iter().map(Environment::from).collect())
    }
}

#[async_trait]
impl RunRequestStore for PgStore {
    async fn insert_run_request(&self, input: &NewRunRequest) -> Result<RunRequest, CoreError> {
        let row = RunRequestRepo::create(&self.pool, input)
            .await
            .map_err(map_db_error)?;
        RunRequest::try_from(row)
    }

    async fn find_run_request(&self, id: DbId) -> Result<Option<RunRequest>, CoreError> {
        RunRequestRepo::find_by_id(&self.pool, id)
            .await
            .map_err(map_db_error)?
            .map(RunRequest::try_from)
            .transpose()
    }

    async fn list_run_requests(&self, page: Page) -> Result<Vec<RunRequestSummary>, CoreError> {
        RunRequestRepo::list(&self.pool, page.limit, page.offset)
            .await
            .map_err(map_db_error)?
            .into_iter()
            .map(|row| RunRequest::try_from(row).map(RunRequestSummary::from))
            .collect()
    }

    async fn compare_and_set_status(
        &self,
        id: DbId,
        expected: RunStatus,
        next: RunStatus,
        logs: Option<&str>,
    ) -> Result<Option<RunRequest>, CoreError> {
        RunRequestRepo::compare_and_set_status(&self.pool, id, expected.id(), next.id(), logs)
            .await
            .map_err(map_db_error)?
            .map(RunRequest::try_from)
            .transpose()
    }
}

#[async_trait]
impl StoreHealth for PgStore {
    async fn ping(&self) -> Result<(), CoreError> {
        crate::health_check(&self.pool).await.map_err(map_db_error)
    }
}
