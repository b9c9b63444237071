//! Saved filter endpoint handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use domain::models::{NewSavedFilter, SaveFilterRequest, SavedFilter};
use domain::services::compile_json;
use serde::Serialize;
use serde_json::json;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::UserAuth;

#[derive(Debug, Serialize)]
pub struct ListFiltersResponse {
    pub filters: Vec<SavedFilter>,
    pub total: usize,
}

/// Validates the request and its conditions.
fn new_filter(owner_id: Uuid, request: SaveFilterRequest) -> Result<NewSavedFilter, ApiError> {
    request.validate()?;
    compile_json(&request.conditions)?;

    let conditions = if request.conditions.is_null() {
        json!({})
    } else {
        request.conditions
    };

    Ok(NewSavedFilter {
        owner_id,
        name: request.name.trim().to_string(),
        description: request
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty()),
        conditions,
    })
}

fn filter_not_found(id: Uuid) -> ApiError {
    ApiError::NotFound(format!("Filter not found: {}", id))
}

/// POST /filtros
pub async fn create_filter(
    State(state): State<AppState>,
    user: UserAuth,
    Json(request): Json<SaveFilterRequest>,
) -> Result<(StatusCode, Json<SavedFilter>), ApiError> {
    let filter = state
        .filters
        .create(new_filter(user.user_id, request)?)
        .await?;

    info!(filter_id = %filter.id, owner_id = %user.user_id, "Filter created");

    Ok((StatusCode::CREATED, Json(filter)))
}

/// GET /filtros
pub async fn list_filters(
    State(state): State<AppState>,
    user: UserAuth,
) -> Result<Json<ListFiltersResponse>, ApiError> {
    let filters = state.filters.list(user.user_id).await?;
    let total = filters.len();
    Ok(Json(ListFiltersResponse { filters, total }))
}

/// GET /filtros/:id
pub async fn get_filter(
    State(state): State<AppState>,
    user: UserAuth,
    Path(id): Path<Uuid>,
) -> Result<Json<SavedFilter>, ApiError> {
    state
        .filters
        .find(user.user_id, id)
        .await?
        .map(Json)
        .ok_or_else(|| filter_not_found(id))
}

/// PUT /filtros/:id
pub async fn update_filter(
    State(state): State<AppState>,
    user: UserAuth,
    Path(id): Path<Uuid>,
    Json(request): Json<SaveFilterRequest>,
) -> Result<Json<SavedFilter>, ApiError> {
    let filter = state
        .filters
        .update(user.user_id, id, new_filter(user.user_id, request)?)
        .await?
        .ok_or_else(|| filter_not_found(id))?;

    info!(filter_id = %id, "Filter updated");

    Ok(Json(filter))
}

/// DELETE /filtros/:id
pub async fn delete_filter(
    State(state): State<AppState>,
    user: UserAuth,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if !state.filters.delete(user.user_id, id).await? {
        return Err(filter_not_found(id));
    }

    info!(filter_id = %id, "Filter deleted");

    Ok(StatusCode::NO_CONTENT)
}
