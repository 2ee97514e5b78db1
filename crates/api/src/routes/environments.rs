use axum::routing::get;
use axum::Router;

use crate::handlers::environments;
use crate::state::AppState;

/// Routes mounted at `/environments`.
pub fn router() -> Router<AppState> {
    Router::new().route("/", get(environments::list))
}
