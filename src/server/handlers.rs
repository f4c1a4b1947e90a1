use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::jobs::{JobId, JobRecord};
use crate::server::error::{ApiError, ApiResult};
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct ProcessRequest {
    #[serde(default)]
    pub video_url: Option<String>,
    #[serde(default)]
    pub filter: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProcessResponse {
    pub job_id: JobId,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub vision_backend: String,
}

/// POST /process
pub async fn submit_job(
    State(state): State<AppState>,
    payload: Result<Json<ProcessRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<ProcessResponse>)> {
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let filter = request.filter.unwrap_or_default();
    let video_url = request.video_url.unwrap_or_default();
    let job_id = state.jobs.submit(&video_url, &filter).await?;

    info!(job_id = %job_id, "Accepted job");
    Ok((StatusCode::ACCEPTED, Json(ProcessResponse { job_id })))
}

/// GET /status/:job_id
pub async fn job_status(State(state): State<AppState>, Path(job_id): Path<String>) -> ApiResult<Json<JobRecord>> {
    let record = state.jobs.status(&JobId::new(job_id)).await?;
    Ok(Json(record))
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        vision_backend: state.vision_backend.clone(),
    })
}
