use axum::routing::get;
use axum::Router;

use crate::handlers::test_files;
use crate::state::AppState;

/// Routes mounted at `/test-files`.
///
/// ```text
/// GET    /   -> list
/// POST   /   -> upload (multipart: upload_dir, test_file)
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/", get(test_files::list).post(test_files::upload))
}
