//! Handlers for the `/run-requests` resource.
//!
//! Submission goes through [`IntakeService`](testrun_core::intake::IntakeService);
//! the status callback is the executor's only way to move a run request.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::json;
use testrun_core::intake::RawSubmission;
use testrun_core::pagination::{Page, PaginationParams};
use testrun_core::run_request::{RunRequest, RunRequestSummary, StatusUpdate};
use testrun_core::types::DbId;
use testrun_events::{event_types, PlatformEvent};

use crate::error::AppResult;
use crate::state::AppState;

/// GET /api/v1/run-requests?limit=&offset=
///
/// Newest first.
pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> AppResult<Json<Vec<RunRequestSummary>>> {
    let runs = state.lifecycle.list(Page::from(&params)).await?;
    Ok(Json(runs))
}

/// POST /api/v1/run-requests
///
/// Returns 201 even when the dispatch gateway refused the command; the
/// failure is logged by the intake service and published here as
/// `run_request.dispatch_failed`.
pub async fn submit(
    State(state): State<AppState>,
    body: Result<Json<RawSubmission>, JsonRejection>,
) -> AppResult<(StatusCode, Json<RunRequestSummary>)> {
    let Json(raw) = body?;
    let admission = state.intake.submit(raw).await?;
    let run = admission.run_request;

    state.event_bus.publish(
        PlatformEvent::new(event_types::RUN_REQUEST_CREATED)
            .with_source(event_types::ENTITY_RUN_REQUEST, run.id)
            .with_payload(json!({
                "env": run.env,
                "path": run.path,
                "requested_by": run.requested_by,
            })),
    );
    if !admission.dispatched {
        state.event_bus.publish(
            PlatformEvent::new(event_types::RUN_REQUEST_DISPATCH_FAILED)
                .with_source(event_types::ENTITY_RUN_REQUEST, run.id),
        );
    }

    Ok((StatusCode::CREATED, Json(run.into())))
}

/// GET /api/v1/run-requests/{id}
pub async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<RunRequest>> {
    let run = state.lifecycle.get(id).await?;
    Ok(Json(run))
}

/// POST /api/v1/run-requests/{id}/status
///
/// Executor callback. 404 for unknown ids, 409 `INVALID_TRANSITION` when
/// the lifecycle forbids the move.
pub async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    body: Result<Json<StatusUpdate>, JsonRejection>,
) -> AppResult<Json<RunRequest>> {
    let Json(update) = body?;
    let change = state.lifecycle.transition(id, update).await?;

    state.event_bus.publish(
        PlatformEvent::new(event_types::RUN_REQUEST_STATUS_CHANGED)
            .with_source(event_types::ENTITY_RUN_REQUEST, id)
            .with_payload(json!({ "from": change.from, "to": change.run.status })),
    );

    Ok(Json(change.run))
}
