//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! One Axum router serves the whole JSON API. The React client is hosted on
//! another origin, so CORS is wide open; authentication rides on bearer
//! tokens rather than ambient cookies (the refresh cookie is only read by
//! `/auth/refresh` and `/auth/logout`).

pub mod auth;
pub mod bookings;
pub mod dogs;
pub mod events;
pub mod me;
pub mod members;
pub mod programs;

use axum::extract::DefaultBodyLimit;
use axum::extract::multipart::Multipart;
use axum::http::StatusCode;
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use axum_extra::extract::WithRejection;
use serde::Deserialize;
use serde_json::{Map, Value};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::db::{self, SqlParam};
use crate::error::{ApiError, ApiResult};
use crate::services::storage::{ImageUpload, MAX_IMAGE_BYTES};
use crate::state::AppState;

/// Request body ceiling for image uploads: the image plus multipart framing.
pub const UPLOAD_BODY_LIMIT: usize = MAX_IMAGE_BYTES + 1024 * 1024;

/// JSON request body whose parse failures answer `{"error": ...}`.
pub type JsonBody<T> = WithRejection<Json<T>, ApiError>;

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let uploads = Router::new()
        .route("/me/avatar", post(me::upload_avatar))
        .route("/dogs/{id}/photo", post(dogs::upload_photo))
        .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT));

    Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/logout-all", post(auth::logout_all))
        .route("/me", get(me::get_me).put(me::update_me))
        .route("/members", get(members::list_members))
        .route("/members/{id}", get(members::get_member))
        .route("/dogs", get(dogs::list_dogs).post(dogs::create_dog))
        .route("/dogs/chipped", get(dogs::list_chipped))
        .route("/dogs/chiped", get(dogs::list_chipped))
        .route("/dogs/report/{id}", get(dogs::report))
        .route("/dogs/{id}", put(dogs::update_dog).delete(dogs::delete_dog))
        .route("/events", get(events::list_events).post(events::create_event))
        .route("/events/education", get(events::list_education))
        .route(
            "/events/{id}",
            get(events::get_event)
                .put(events::update_event)
                .delete(events::delete_event),
        )
        .route("/events/{id}/dogs", get(events::list_dogs).post(events::add_dog))
        .route("/events/{id}/dogs/{dog_id}", delete(events::remove_dog))
        .route("/events/{id}/members", get(events::list_members))
        .route("/events/{id}/register", post(events::register).delete(events::unregister))
        .route("/programs", get(programs::list_programs).post(programs::create_program))
        .route(
            "/programs/{id}",
            get(programs::get_program)
                .put(programs::update_program)
                .delete(programs::delete_program),
        )
        .route("/programs/{id}/dogs", get(programs::list_dogs).post(programs::enroll_dog))
        .route("/programs/{id}/dogs/{dog_id}", delete(programs::withdraw_dog))
        .nest("/services", bookings::router())
        .merge(uploads)
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

// =============================================================================
// SHARED HANDLER HELPERS
// =============================================================================

/// `{dogId}` body used to attach a dog to an event or program.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DogIdBody {
    pub dog_id: Option<i64>,
}

impl DogIdBody {
    pub(crate) fn dog_id(self) -> ApiResult<i64> {
        self.dog_id.ok_or_else(|| ApiError::bad_request("dogId is required"))
    }
}

/// Run a catalog query and return its rows as a JSON array.
pub(crate) async fn catalog_rows(state: &AppState, name: &str, params: &[SqlParam]) -> ApiResult<Value> {
    let sql = state.queries.get(name)?;
    Ok(db::query_json(&state.pool, sql, params).await?)
}

/// First row of a catalog query, or 404 with `missing` as the message.
pub(crate) async fn catalog_row(state: &AppState, name: &str, id: i64, missing: &str) -> ApiResult<Value> {
    let rows = catalog_rows(state, name, &[SqlParam::Int(id)]).await?;
    db::first_row(rows).ok_or_else(|| ApiError::not_found(missing))
}

/// Partial-update bodies must be JSON objects.
pub(crate) fn object_body(body: Value) -> ApiResult<Map<String, Value>> {
    match body {
        Value::Object(map) => Ok(map),
        _ => Err(ApiError::bad_request("request body must be a JSON object")),
    }
}

/// Pull the file named `field` out of a multipart body.
pub(crate) async fn read_image_field(multipart: &mut Multipart, field: &str) -> ApiResult<ImageUpload> {
    while let Some(part) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::new(e.status(), e.body_text()))?
    {
        if part.name() != Some(field) {
            continue;
        }
        let file_name = part.file_name().map(str::to_owned);
        let content_type = part.content_type().map(str::to_owned);
        let bytes = part
            .bytes()
            .await
            .map_err(|e| ApiError::new(e.status(), e.body_text()))?;
        return Ok(ImageUpload { file_name, content_type, bytes: bytes.to_vec() });
    }
    Err(ApiError::bad_request(format!("multipart field '{field}' is missing")))
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
