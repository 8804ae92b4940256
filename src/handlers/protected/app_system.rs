use axum::{
    extract::{rejection::JsonRejection, Extension, State},
    Json,
};
use serde_json::Value;

use super::tree::service;
use crate::database::models::AppSystem;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, TenantPool};
use crate::server::AppState;
use crate::services::{create_multiple as create_batch, BatchReport, CategoryGroup};

/// POST /api/app-system/create-multiple - `[{category, systems: [...]}]`,
/// each system created independently
pub async fn create_multiple(
    State(state): State<AppState>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<BatchReport> {
    let Json(body) = body.map_err(|e| ApiError::invalid_json(e.body_text()))?;
    let groups: Vec<CategoryGroup> =
        serde_json::from_value(body).map_err(|e| ApiError::invalid_json(e.to_string()))?;
    if groups.is_empty() {
        return Err(ApiError::bad_request("Request body is empty"));
    }

    let cancel = state.shutdown.child_token();
    let report = create_batch(&service::<AppSystem>(pool), groups, &cancel).await?;
    Ok(ApiResponse::created(report))
}
