//! Generation job endpoints.
//!
//! Submission returns as soon as the job is recorded; clients poll
//! `/status/{job_id}` and fetch the WAV from `/download/{job_id}` once the
//! job is completed.

use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use cadence_core::{GenerationRequest, JobId, JobPage, JobStatus};
use tracing::{debug, info};
use utoipa::OpenApi;

use crate::error::ServerError;
use crate::schemas::v1::generation::{
    DEFAULT_LIST_LIMIT, GenerationRequestBody, GenerationResponse, GenerationStatusResponse,
    JobListQuery, JobListResponse, JobSummaryResponse, MessageResponse,
};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(generate, get_status, download, cancel_job, list_jobs),
    components(schemas(
        GenerationRequestBody,
        GenerationResponse,
        GenerationStatusResponse,
        JobListQuery,
        JobListResponse,
        JobSummaryResponse,
        MessageResponse
    ))
)]
pub struct GenerationApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/generate", post(generate))
        .route("/status/{job_id}", get(get_status))
        .route("/download/{job_id}", get(download))
        .route("/jobs", get(list_jobs))
        .route("/jobs/{job_id}", delete(cancel_job))
}

#[utoipa::path(
    post,
    path = "/api/v1/generate",
    tag = "generation",
    request_body = GenerationRequestBody,
    responses(
        (status = 200, description = "Job queued", body = GenerationResponse),
        (status = 422, description = "Invalid parameters"),
        (status = 500, description = "Job could not be created"),
    )
)]
pub async fn generate(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<GenerationRequestBody>, JsonRejection>,
) -> Result<Json<GenerationResponse>, ServerError> {
    let Json(body) = payload.map_err(|rejection| ServerError::InvalidBody(rejection.body_text()))?;
    let ticket = state.jobs.submit_job(GenerationRequest::from(body)).await?;
    info!(job_id = %ticket.job_id, "generation job accepted");
    Ok(Json(ticket.into()))
}

#[utoipa::path(
    get,
    path = "/api/v1/status/{job_id}",
    tag = "generation",
    params(
        ("job_id" = String, Path, description = "ID returned by /generate")
    ),
    responses(
        (status = 200, description = "Current job state", body = GenerationStatusResponse),
        (status = 404, description = "Job not found"),
    )
)]
pub async fn get_status(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> Result<Json<GenerationStatusResponse>, ServerError> {
    let view = state.jobs.get_status(&JobId::from(job_id)).await?;
    Ok(Json(view.into()))
}

#[utoipa::path(
    get,
    path = "/api/v1/download/{job_id}",
    tag = "generation",
    params(
        ("job_id" = String, Path, description = "ID of a completed job")
    ),
    responses(
        (status = 200, description = "WAV file", content_type = "audio/wav", body = Vec<u8>),
        (status = 404, description = "Job or artifact not found"),
        (status = 409, description = "Job is not completed"),
    )
)]
pub async fn download(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> Result<impl IntoResponse, ServerError> {
    let job_id = JobId::from(job_id);
    let bytes = state.jobs.download_result(&job_id).await?;
    debug!(job_id = %job_id, bytes = bytes.len(), "serving artifact");
    let headers = [
        (header::CONTENT_TYPE, "audio/wav".to_owned()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{job_id}.wav\""),
        ),
    ];
    Ok((headers, bytes))
}

#[utoipa::path(
    delete,
    path = "/api/v1/jobs/{job_id}",
    tag = "generation",
    params(
        ("job_id" = String, Path, description = "ID of the job to cancel")
    ),
    responses(
        (status = 200, description = "Job cancelled", body = MessageResponse),
        (status = 404, description = "Job not found"),
        (status = 409, description = "Job already finished"),
    )
)]
pub async fn cancel_job(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> Result<Json<MessageResponse>, ServerError> {
    state.jobs.cancel_job(&JobId::from(job_id)).await?;
    Ok(Json(MessageResponse {
        message: "Job cancelled successfully".to_owned(),
    }))
}

#[utoipa::path(
    get,
    path = "/api/v1/jobs",
    tag = "generation",
    params(JobListQuery),
    responses(
        (status = 200, description = "Jobs, newest first", body = JobListResponse),
        (status = 422, description = "Malformed query string"),
    )
)]
pub async fn list_jobs(
    State(state): State<Arc<AppState>>,
    query: Result<Query<JobListQuery>, QueryRejection>,
) -> Result<Json<JobListResponse>, ServerError> {
    let Query(q) = query.map_err(|rejection| ServerError::InvalidBody(rejection.body_text()))?;
    let limit = q.limit.unwrap_or(DEFAULT_LIST_LIMIT);
    let page = match q.status.as_deref().map(str::parse::<JobStatus>) {
        None => state.jobs.list_jobs(None, limit).await,
        Some(Ok(status)) => state.jobs.list_jobs(Some(status), limit).await,
        // An unknown status matches nothing.
        Some(Err(_)) => JobPage::default(),
    };
    Ok(Json(page.into()))
}

// ── Tests ──────────────────────────────────────────────────────────────────────
