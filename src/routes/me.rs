//! Routes for the signed-in member's own profile.

use axum::Json;
use axum::extract::State;
use axum::extract::multipart::Multipart;
use axum_extra::extract::WithRejection;
use serde_json::{Value, json};

use super::auth::AuthMember;
use super::{JsonBody, catalog_row, catalog_rows, object_body, read_image_field};
use crate::db::SqlParam;
use crate::error::{ApiError, ApiResult};
use crate::services::members;
use crate::state::AppState;

/// Profile row of `member_id` with a `dogs` array attached.
async fn profile_with_dogs(state: &AppState, member_id: i64) -> ApiResult<Value> {
    let mut profile = catalog_row(state, "me_profile", member_id, "member not found").await?;
    let dogs = catalog_rows(state, "member_dogs", &[SqlParam::Int(member_id)]).await?;
    if let Some(fields) = profile.as_object_mut() {
        fields.insert("dogs".into(), dogs);
    }
    Ok(profile)
}

/// `GET /me`
pub async fn get_me(State(state): State<AppState>, auth: AuthMember) -> ApiResult<Json<Value>> {
    Ok(Json(profile_with_dogs(&state, auth.member_id()).await?))
}

/// `PUT /me`: partial profile update, returns the fresh profile.
pub async fn update_me(
    State(state): State<AppState>,
    auth: AuthMember,
    WithRejection(Json(body), _): JsonBody<Value>,
) -> ApiResult<Json<Value>> {
    let body = object_body(body)?;
    members::update_profile(&state.pool, auth.member_id(), &body).await?;
    Ok(Json(profile_with_dogs(&state, auth.member_id()).await?))
}

/// `POST /me/avatar`: multipart field `avatar`.
pub async fn upload_avatar(
    State(state): State<AppState>,
    auth: AuthMember,
    mut multipart: Multipart,
) -> ApiResult<Json<Value>> {
    let store = state
        .avatars
        .clone()
        .ok_or_else(|| ApiError::unavailable("image uploads are not configured"))?;
    let image = read_image_field(&mut multipart, "avatar").await?;
    let member_id = auth.member_id();

    let url = store.upload(member_id, image).await?;
    let previous = match members::replace_avatar(&state.pool, member_id, &url).await {
        Ok(previous) => previous,
        Err(e) => {
            store.delete_by_url(member_id, &url).await;
            return Err(e.into());
        }
    };
    if let Some(previous) = previous.filter(|p| *p != url) {
        store.delete_by_url(member_id, &previous).await;
    }

    tracing::info!(member_id, "avatar updated");
    Ok(Json(json!({ "avatarUrl": url })))
}

#[cfg(test)]
#[path = "me_test.rs"]
mod tests;
