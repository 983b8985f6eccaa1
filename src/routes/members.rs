//! Member directory: one row per member/dog pair.

use axum::Json;
use axum::extract::{Path, State};
use serde_json::Value;

use super::catalog_rows;
use crate::db::SqlParam;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// `GET /members`
pub async fn list_members(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    Ok(Json(catalog_rows(&state, "members", &[]).await?))
}

/// `GET /members/{id}`: same shape as the list, restricted to one member.
pub async fn get_member(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Json<Value>> {
    let rows = catalog_rows(&state, "member", &[SqlParam::Int(id)]).await?;
    if rows.as_array().is_none_or(Vec::is_empty) {
        return Err(ApiError::not_found("member not found"));
    }
    Ok(Json(rows))
}
