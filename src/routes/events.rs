//! Event routes: schedule reads, trainer/admin edits and registrations.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum_extra::extract::WithRejection;
use serde_json::Value;

use super::auth::AuthMember;
use super::{DogIdBody, JsonBody, catalog_row, catalog_rows};
use crate::db::SqlParam;
use crate::error::ApiResult;
use crate::services::events::{self as event_svc, EventRequest};
use crate::state::AppState;

async fn event_view(state: &AppState, event_id: i64) -> ApiResult<Value> {
    catalog_row(state, "event", event_id, "event not found").await
}

/// `GET /events`: everything except education events.
pub async fn list_events(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    Ok(Json(catalog_rows(&state, "events", &[]).await?))
}

/// `GET /events/education`
pub async fn list_education(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    Ok(Json(catalog_rows(&state, "education_events", &[]).await?))
}

/// `GET /events/{id}`
pub async fn get_event(State(state): State<AppState>, Path(event_id): Path<i64>) -> ApiResult<Json<Value>> {
    Ok(Json(event_view(&state, event_id).await?))
}

/// `GET /events/{id}/dogs`
pub async fn list_dogs(State(state): State<AppState>, Path(event_id): Path<i64>) -> ApiResult<Json<Value>> {
    Ok(Json(catalog_rows(&state, "event_dogs", &[SqlParam::Int(event_id)]).await?))
}

/// `GET /events/{id}/members`
pub async fn list_members(State(state): State<AppState>, Path(event_id): Path<i64>) -> ApiResult<Json<Value>> {
    Ok(Json(catalog_rows(&state, "event_members", &[SqlParam::Int(event_id)]).await?))
}

/// `POST /events`: trainer or admin.
pub async fn create_event(
    State(state): State<AppState>,
    auth: AuthMember,
    WithRejection(Json(body), _): JsonBody<EventRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let event_id = event_svc::create_event(&state.pool, &auth.actor, body).await?;
    Ok((StatusCode::CREATED, Json(event_view(&state, event_id).await?)))
}

/// `PUT /events/{id}`: trainer or admin; absent fields keep their value.
pub async fn update_event(
    State(state): State<AppState>,
    auth: AuthMember,
    Path(event_id): Path<i64>,
    WithRejection(Json(body), _): JsonBody<EventRequest>,
) -> ApiResult<Json<Value>> {
    event_svc::update_event(&state.pool, &auth.actor, event_id, body).await?;
    Ok(Json(event_view(&state, event_id).await?))
}

/// `DELETE /events/{id}`: admin only.
pub async fn delete_event(
    State(state): State<AppState>,
    auth: AuthMember,
    Path(event_id): Path<i64>,
) -> ApiResult<StatusCode> {
    event_svc::delete_event(&state.pool, &auth.actor, event_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /events/{id}/dogs` `{dogId}`
pub async fn add_dog(
    State(state): State<AppState>,
    auth: AuthMember,
    Path(event_id): Path<i64>,
    WithRejection(Json(body), _): JsonBody<DogIdBody>,
) -> ApiResult<StatusCode> {
    let dog_id = body.dog_id()?;
    event_svc::register_dog(&state.pool, &auth.actor, event_id, dog_id).await?;
    tracing::info!(event_id, dog_id, "dog registered for event");
    Ok(StatusCode::CREATED)
}

/// `DELETE /events/{id}/dogs/{dog_id}`
pub async fn remove_dog(
    State(state): State<AppState>,
    auth: AuthMember,
    Path((event_id, dog_id)): Path<(i64, i64)>,
) -> ApiResult<StatusCode> {
    event_svc::unregister_dog(&state.pool, &auth.actor, event_id, dog_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /events/{id}/register`: the caller signs up for an education event.
pub async fn register(State(state): State<AppState>, auth: AuthMember, Path(event_id): Path<i64>) -> ApiResult<StatusCode> {
    event_svc::register_member(&state.pool, auth.member_id(), event_id).await?;
    tracing::info!(event_id, member_id = auth.member_id(), "member registered for education event");
    Ok(StatusCode::CREATED)
}

/// `DELETE /events/{id}/register`
pub async fn unregister(
    State(state): State<AppState>,
    auth: AuthMember,
    Path(event_id): Path<i64>,
) -> ApiResult<StatusCode> {
    event_svc::unregister_member(&state.pool, auth.member_id(), event_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
#[path = "events_test.rs"]
mod tests;
