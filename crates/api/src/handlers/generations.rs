//! Handlers for the `/generations` resource.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use genbroker_core::job::JobStatus;
use genbroker_core::request::GenerationRequest;
use genbroker_core::types::JobId;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Body of `POST /api/v1/generations`.
///
/// Field shapes are checked here; mode, style, and framing rules are
/// enforced by [`GenerationRequest::validate`].
#[derive(Debug, Deserialize, Validate)]
pub struct SubmitGeneration {
    #[validate(length(min = 1, message = "mode is required"))]
    pub mode: String,

    #[validate(length(
        min = 1,
        max = 64,
        message = "platform must be 1-64 characters"
    ))]
    pub platform: String,

    #[serde(alias = "sourceUrl")]
    #[validate(url(message = "source_url must be an absolute URL"))]
    pub source_url: String,

    #[serde(default, alias = "personaId")]
    #[validate(length(
        min = 1,
        max = 128,
        message = "persona_id must be 1-128 characters"
    ))]
    pub persona_id: Option<String>,

    #[serde(default, alias = "shotType")]
    pub shot_type: Option<String>,

    #[serde(default)]
    pub settings: Option<serde_json::Value>,
}

impl From<SubmitGeneration> for GenerationRequest {
    fn from(input: SubmitGeneration) -> Self {
        Self {
            mode: input.mode,
            platform: input.platform,
            source_url: input.source_url,
            persona_id: input.persona_id,
            shot_type: input.shot_type,
            settings: input.settings,
        }
    }
}

/// Body of the `202 Accepted` response.
#[derive(Debug, Serialize)]
pub struct SubmittedJob {
    pub job_id: JobId,
    pub status: JobStatus,
}

/// POST /api/v1/generations
///
/// Validate and queue a generation. Returns `202` once the `pending` job
/// exists; generation runs in the background.
pub async fn submit_generation(
    State(state): State<AppState>,
    body: Result<Json<SubmitGeneration>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let Json(input) = body.map_err(|e| AppError::BadRequest(e.body_text()))?;
    input.validate()?;

    let job = state.broker.submit(input.into()).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(DataResponse {
            data: SubmittedJob {
                job_id: job.id,
                status: job.status,
            },
        }),
    ))
}
