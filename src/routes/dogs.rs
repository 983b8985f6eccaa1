//! Dog routes: listings, owner edits, photo upload and the PDF report.

use axum::Json;
use axum::extract::multipart::Multipart;
use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use axum_extra::extract::WithRejection;
use serde::Deserialize;
use serde_json::{Value, json};

use super::auth::AuthMember;
use super::{JsonBody, catalog_row, catalog_rows, object_body, read_image_field};
use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::services::dogs::{self as dog_svc, DogError, DogRequest};
use crate::services::report;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct DogListQuery {
    pub sort: Option<String>,
}

async fn dog_view(state: &AppState, dog_id: i64) -> ApiResult<Value> {
    catalog_row(state, "dog", dog_id, "dog not found").await
}

/// `GET /dogs?sort=name|breed|birth_date|owner`
pub async fn list_dogs(State(state): State<AppState>, Query(query): Query<DogListQuery>) -> ApiResult<Json<Value>> {
    let order = dog_svc::sort_column(query.sort.as_deref())?;
    let sql = state.queries.render("dogs", &[("order", order)])?;
    Ok(Json(db::query_json(&state.pool, &sql, &[]).await?))
}

/// `GET /dogs/chipped` (also served as `/dogs/chiped`)
pub async fn list_chipped(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    Ok(Json(catalog_rows(&state, "chipped_dogs", &[]).await?))
}

/// `POST /dogs`: the caller becomes the owner.
pub async fn create_dog(
    State(state): State<AppState>,
    auth: AuthMember,
    WithRejection(Json(body), _): JsonBody<DogRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let dog = body.validate()?;
    let dog_id = dog_svc::create(&state.pool, auth.member_id(), &dog).await?;
    tracing::info!(dog_id, owner_id = auth.member_id(), "dog created");
    Ok((StatusCode::CREATED, Json(dog_view(&state, dog_id).await?)))
}

/// `PUT /dogs/{id}`: owner or admin.
pub async fn update_dog(
    State(state): State<AppState>,
    auth: AuthMember,
    Path(dog_id): Path<i64>,
    WithRejection(Json(body), _): JsonBody<Value>,
) -> ApiResult<Json<Value>> {
    let body = object_body(body)?;
    dog_svc::update(&state.pool, &auth.actor, dog_id, &body).await?;
    Ok(Json(dog_view(&state, dog_id).await?))
}

/// `DELETE /dogs/{id}`: owner or admin.
pub async fn delete_dog(State(state): State<AppState>, auth: AuthMember, Path(dog_id): Path<i64>) -> ApiResult<StatusCode> {
    dog_svc::delete(&state.pool, &auth.actor, dog_id).await?;
    tracing::info!(dog_id, actor = auth.member_id(), "dog deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /dogs/{id}/photo`: multipart field `photo`, owner or admin.
pub async fn upload_photo(
    State(state): State<AppState>,
    auth: AuthMember,
    Path(dog_id): Path<i64>,
    mut multipart: Multipart,
) -> ApiResult<Json<Value>> {
    let store = state
        .dog_photos
        .clone()
        .ok_or_else(|| ApiError::unavailable("image uploads are not configured"))?;
    let owner_id = dog_svc::owner_of(&state.pool, dog_id).await?;
    if !auth.actor.can_act_for(owner_id) {
        return Err(DogError::Forbidden.into());
    }
    let image = read_image_field(&mut multipart, "photo").await?;

    let url = store.upload(owner_id, image).await?;
    let previous = match dog_svc::set_photo(&state.pool, dog_id, &url).await {
        Ok(previous) => previous,
        Err(e) => {
            store.delete_by_url(owner_id, &url).await;
            return Err(e.into());
        }
    };
    if let Some(previous) = previous.filter(|p| *p != url) {
        store.delete_by_url(owner_id, &previous).await;
    }

    tracing::info!(dog_id, "dog photo updated");
    Ok(Json(json!({ "photoUrl": url })))
}

/// `GET /dogs/report/{id}`: inline PDF.
pub async fn report(State(state): State<AppState>, Path(dog_id): Path<i64>) -> ApiResult<impl IntoResponse> {
    let pdf = report::build(&state.pool, &state.queries, state.report_fonts.clone(), dog_id).await?;
    let headers = [
        (header::CONTENT_TYPE, "application/pdf".to_owned()),
        (header::CONTENT_DISPOSITION, format!("inline; filename=\"dog-{dog_id}-report.pdf\"")),
    ];
    Ok((headers, pdf))
}

#[cfg(test)]
#[path = "dogs_test.rs"]
mod tests;
