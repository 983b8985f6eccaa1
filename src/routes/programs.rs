//! Training program routes.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum_extra::extract::WithRejection;
use serde_json::Value;

use super::auth::AuthMember;
use super::{DogIdBody, JsonBody, catalog_row, catalog_rows};
use crate::db::SqlParam;
use crate::error::ApiResult;
use crate::services::programs::{self as program_svc, ProgramRequest};
use crate::state::AppState;

async fn program_view(state: &AppState, program_id: i64) -> ApiResult<Value> {
    catalog_row(state, "program", program_id, "program not found").await
}

pub async fn list_programs(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    Ok(Json(catalog_rows(&state, "programs", &[]).await?))
}

pub async fn get_program(State(state): State<AppState>, Path(program_id): Path<i64>) -> ApiResult<Json<Value>> {
    Ok(Json(program_view(&state, program_id).await?))
}

/// `GET /programs/{id}/dogs`
pub async fn list_dogs(State(state): State<AppState>, Path(program_id): Path<i64>) -> ApiResult<Json<Value>> {
    Ok(Json(catalog_rows(&state, "program_dogs", &[SqlParam::Int(program_id)]).await?))
}

/// `POST /programs`: trainer or admin.
pub async fn create_program(
    State(state): State<AppState>,
    auth: AuthMember,
    WithRejection(Json(body), _): JsonBody<ProgramRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let program_id = program_svc::create_program(&state.pool, &auth.actor, body).await?;
    Ok((StatusCode::CREATED, Json(program_view(&state, program_id).await?)))
}

pub async fn update_program(
    State(state): State<AppState>,
    auth: AuthMember,
    Path(program_id): Path<i64>,
    WithRejection(Json(body), _): JsonBody<ProgramRequest>,
) -> ApiResult<Json<Value>> {
    program_svc::update_program(&state.pool, &auth.actor, program_id, body).await?;
    Ok(Json(program_view(&state, program_id).await?))
}

/// `DELETE /programs/{id}`: admin only.
pub async fn delete_program(
    State(state): State<AppState>,
    auth: AuthMember,
    Path(program_id): Path<i64>,
) -> ApiResult<StatusCode> {
    program_svc::delete_program(&state.pool, &auth.actor, program_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /programs/{id}/dogs` `{dogId}`
pub async fn enroll_dog(
    State(state): State<AppState>,
    auth: AuthMember,
    Path(program_id): Path<i64>,
    WithRejection(Json(body), _): JsonBody<DogIdBody>,
) -> ApiResult<StatusCode> {
    let dog_id = body.dog_id()?;
    program_svc::enroll_dog(&state.pool, &auth.actor, program_id, dog_id).await?;
    tracing::info!(program_id, dog_id, "dog enrolled");
    Ok(StatusCode::CREATED)
}

pub async fn withdraw_dog(
    State(state): State<AppState>,
    auth: AuthMember,
    Path((program_id, dog_id)): Path<(i64, i64)>,
) -> ApiResult<StatusCode> {
    program_svc::withdraw_dog(&state.pool, &auth.actor, program_id, dog_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
#[path = "programs_test.rs"]
mod tests;
