pub mod environments;
pub mod health;
pub mod run_requests;
pub mod test_files;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /run-requests                 list, submit
/// /run-requests/{id}            get (with logs)
/// /run-requests/{id}/status     executor status callback (POST)
///
/// /test-files                   list, upload (multipart)
///
/// /environments                 list
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/run-requests", run_requests::router())
        .nest("/test-files", test_files::router())
        .nest("/environments", environments::router())
}
