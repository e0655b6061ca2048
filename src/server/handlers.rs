//! HTTP request handlers for the job API.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use uuid::Uuid;

use super::AppState;
use crate::models::SearchRequest;
use crate::services::SearchError;

/// JSON error body with a status derived from the service error.
pub struct ApiError(SearchError);

impl From<SearchError> for ApiError {
    fn from(e: SearchError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0 {
            SearchError::NotFound(_) => StatusCode::NOT_FOUND,
            SearchError::InvalidCap(_) => StatusCode::BAD_REQUEST,
            SearchError::NoSites => StatusCode::SERVICE_UNAVAILABLE,
            SearchError::OrchestratorFault(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = serde_json::json!({ "error": self.0.to_string() });
        (status, Json(body)).into_response()
    }
}

/// Health check endpoint for container orchestration.
pub async fn health() -> impl IntoResponse {
    StatusCode::OK
}

pub async fn list_sites(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.registry.sites())
}

/// Start a search job. Responds immediately with the job id.
pub async fn start_search(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let started = state.search.start_search(request)?;
    Ok((StatusCode::ACCEPTED, Json(started)))
}

pub async fn job_progress(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.search.get_progress(&job_id).await?))
}

pub async fn job_result(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.search.get_result(&job_id).await?))
}

pub async fn cancel_job(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.search.cancel(&job_id).await?))
}

pub async fn remove_job(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.search.remove(&job_id).await?))
}
