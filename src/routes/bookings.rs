//! Dog service bookings, nested under `/services`.
//!
//! Members book grooming, vet checks and similar services for their own
//! dogs; trainers and admins move bookings through the status lifecycle.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, patch, post};
use axum::{Json, Router};
use axum_extra::extract::WithRejection;
use serde::Deserialize;
use serde_json::{Value, json};

use super::auth::AuthMember;
use super::{JsonBody, catalog_row, catalog_rows, object_body};
use crate::db::SqlParam;
use crate::error::ApiResult;
use crate::services::booking::{self, BookRequest};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/types", get(list_types))
        .route("/my", get(my_services))
        .route("/book", post(book))
        .route("/{id}", delete(cancel))
        .route("/{id}/status", patch(set_status))
}

#[derive(Debug, Deserialize)]
pub struct StatusBody {
    pub status: Option<String>,
}

async fn booking_view(state: &AppState, booking_id: i64) -> ApiResult<Value> {
    catalog_row(state, "dog_service", booking_id, "booking not found").await
}

/// `GET /services/types`
pub async fn list_types(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    Ok(Json(catalog_rows(&state, "service_types", &[]).await?))
}

/// `GET /services/my`: admins see every booking, everyone else their own dogs'.
pub async fn my_services(State(state): State<AppState>, auth: AuthMember) -> ApiResult<Json<Value>> {
    let owner = if auth.actor.role.is_admin() { SqlParam::NullInt } else { SqlParam::Int(auth.member_id()) };
    let services = catalog_rows(&state, "dog_services_by_member", &[owner]).await?;
    Ok(Json(json!({ "services": services, "statusLabels": booking::status_labels() })))
}

/// `POST /services/book` `{dogId, serviceTypeId, requestedAt}`
pub async fn book(
    State(state): State<AppState>,
    auth: AuthMember,
    WithRejection(Json(body), _): JsonBody<Value>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let body = object_body(body)?;
    let request = BookRequest::from_body(&body)?;
    let booking_id = booking::book(&state.pool, &auth.actor, &request).await?;
    Ok((StatusCode::CREATED, Json(booking_view(&state, booking_id).await?)))
}

/// `DELETE /services/{id}`: marks the booking canceled.
pub async fn cancel(State(state): State<AppState>, auth: AuthMember, Path(booking_id): Path<i64>) -> ApiResult<StatusCode> {
    booking::cancel(&state.pool, &auth.actor, booking_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `PATCH /services/{id}/status` `{status}`: trainer or admin.
pub async fn set_status(
    State(state): State<AppState>,
    auth: AuthMember,
    Path(booking_id): Path<i64>,
    WithRejection(Json(body), _): JsonBody<StatusBody>,
) -> ApiResult<Json<Value>> {
    let status = body.status.unwrap_or_default();
    booking::set_status(&state.pool, &auth.actor, booking_id, &status).await?;
    Ok(Json(booking_view(&state, booking_id).await?))
}

#[cfg(test)]
#[path = "bookings_test.rs"]
mod tests;
