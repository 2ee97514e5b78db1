use axum::routing::{get, post};
use axum::Router;

use crate::handlers::run_requests;
use crate::state::AppState;

/// Routes mounted at `/run-requests`.
///
/// ```text
/// GET    /               -> list
/// POST   /               -> submit
/// GET    /{id}           -> get_by_id
/// POST   /{id}/status    -> update_status
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(run_requests::list).post(run_requests::submit))
        .route("/{id}", get(run_requests::get_by_id))
        .route("/{id}/status", post(run_requests::update_status))
}
