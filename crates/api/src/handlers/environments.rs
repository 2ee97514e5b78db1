//! Handlers for the `/environments` resource (read-only reference data).

use axum::extract::State;
use axum::Json;
use testrun_core::environment::Environment;

use crate::error::AppResult;
use crate::state::AppState;

/// GET /api/v1/environments
pub async fn list(State(state): State<AppState>) -> AppResult<Json<Vec<Environment>>> {
    let environments = state.catalog.list().await?;
    Ok(Json(environments))
}
