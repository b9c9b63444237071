//! Export job read endpoints.

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};
use domain::models::{ExportJob, ExportJobStatusView, IntegrationLogEntry};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::UserAuth;

#[derive(Debug, Deserialize)]
pub struct ListExportsQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ListExportsResponse {
    pub exports: Vec<ExportJob>,
    pub total: usize,
}

/// List the caller's export jobs, newest first.
///
/// GET /exportacoes
pub async fn list_exports(
    State(state): State<AppState>,
    user: UserAuth,
    Query(query): Query<ListExportsQuery>,
) -> Result<Json<ListExportsResponse>, ApiError> {
    let exports = state.exports.list_jobs(user.user_id, query.limit).await?;
    let total = exports.len();
    Ok(Json(ListExportsResponse { exports, total }))
}

/// GET /exportacoes/:id
pub async fn get_export(
    State(state): State<AppState>,
    user: UserAuth,
    Path(id): Path<Uuid>,
) -> Result<Json<ExportJob>, ApiError> {
    Ok(Json(state.exports.get_job(user.user_id, id).await?))
}

/// Status snapshot for polling.
///
/// GET /exportacoes/:id/status
pub async fn get_export_status(
    State(state): State<AppState>,
    user: UserAuth,
    Path(id): Path<Uuid>,
) -> Result<Json<ExportJobStatusView>, ApiError> {
    Ok(Json(state.exports.get_status(user.user_id, id).await?))
}

#[derive(Debug, Serialize)]
pub struct ExportLogsResponse {
    pub logs: Vec<IntegrationLogEntry>,
}

/// GET /exportacoes/:id/logs
pub async fn get_export_logs(
    State(state): State<AppState>,
    user: UserAuth,
    Path(id): Path<Uuid>,
) -> Result<Json<ExportLogsResponse>, ApiError> {
    let logs = state.exports.job_logs(user.user_id, id).await?;
    Ok(Json(ExportLogsResponse { logs }))
}

/// Download the CSV produced by a completed spreadsheet export.
///
/// GET /exportacoes/:id/download
pub async fn download_export(
    State(state): State<AppState>,
    user: UserAuth,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let (file_name, contents) = state.exports.download(user.user_id, id).await?;

    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", file_name))
        .map_err(|e| ApiError::Internal(format!("Invalid artifact name: {}", e)))?;

    Ok((
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/csv; charset=utf-8"),
            ),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        contents,
    )
        .into_response())
}
