//! Handlers for the `/jobs` resource.
//!
//! A failed or missing job is a normal answer here, never a `500`.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use genbroker_core::error::CoreError;
use genbroker_core::job::JobStatus;
use genbroker_core::types::JobId;
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Page size when `limit` is omitted.
pub const DEFAULT_LIST_LIMIT: i64 = 50;

/// GET /api/v1/jobs/{id}
pub async fn get_job(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let id: JobId = raw_id
        .parse()
        .map_err(|_| AppError::BadRequest(format!("'{raw_id}' is not a valid job id")))?;

    let view = state
        .broker
        .job_view(id)
        .await?
        .ok_or_else(|| {
            AppError::Core(CoreError::NotFound {
                entity: "Job",
                id: id.to_string(),
            })
        })?;

    Ok(Json(DataResponse { data: view }))
}

#[derive(Debug, Deserialize)]
pub struct ListJobsParams {
    pub status: Option<String>,
    pub limit: Option<i64>,
}

/// GET /api/v1/jobs?status=&limit=
///
/// Oldest first. `status` defaults to `pending`; `limit` is clamped by the
/// store.
pub async fn list_jobs(
    State(state): State<AppState>,
    Query(params): Query<ListJobsParams>,
) -> AppResult<impl IntoResponse> {
    let status = match params.status.as_deref() {
        Some(raw) => raw.parse::<JobStatus>()?,
        None => JobStatus::Pending,
    };
    let limit = params.limit.unwrap_or(DEFAULT_LIST_LIMIT);

    let jobs = state.broker.list_jobs(status, limit).await?;
    tracing::debug!(%status, count = jobs.len(), "Listed jobs");
    Ok(Json(DataResponse { data: jobs }))
}
