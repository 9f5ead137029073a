pub mod health;

use axum::routing::{get, post};
use axum::Router;

use crate::handlers;
use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /generations                 submit (POST)
/// /jobs                        list by status (GET)
/// /jobs/{id}                   status lookup (GET)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/generations", post(handlers::generations::submit_generation))
        .route("/jobs", get(handlers::jobs::list_jobs))
        .route("/jobs/{id}", get(handlers::jobs::get_job))
}
