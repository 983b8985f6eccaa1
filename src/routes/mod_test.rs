use axum::body::Body;
use axum::extract::FromRequest;
use axum::http::Request;
use axum::response::IntoResponse;
use serde::de::DeserializeOwned;
use serde_json::json;

use super::*;
use crate::services::events::EventRequest;
use crate::state::test_helpers::multipart_file;

#[test]
fn object_body_accepts_objects_only() {
    let map = object_body(json!({"name": "Rex"})).unwrap();
    assert_eq!(map.get("name"), Some(&json!("Rex")));

    for body in [json!(null), json!([1]), json!("name"), json!(3)] {
        let err = object_body(body).unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }
}

#[test]
fn dog_id_body_reads_camel_case() {
    let body: DogIdBody = serde_json::from_value(json!({"dogId": 12})).unwrap();
    assert_eq!(body.dog_id().unwrap(), 12);

    let body: DogIdBody = serde_json::from_value(json!({"dog_id": 12})).unwrap();
    assert_eq!(body.dog_id().unwrap_err().status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn read_image_field_returns_the_named_part() {
    let mut multipart = multipart_file("photo", "rex.png", "image/png", b"\x89PNG").await;
    let image = read_image_field(&mut multipart, "photo").await.unwrap();
    assert_eq!(image.file_name.as_deref(), Some("rex.png"));
    assert_eq!(image.content_type.as_deref(), Some("image/png"));
    assert_eq!(image.bytes, b"\x89PNG");
}

#[tokio::test]
async fn read_image_field_reports_missing_field() {
    let mut multipart = multipart_file("avatar", "me.png", "image/png", b"png").await;
    let err = read_image_field(&mut multipart, "photo").await.unwrap_err();
    assert_eq!(err.status, StatusCode::BAD_REQUEST);
    assert!(err.message.contains("photo"));
}

#[test]
fn upload_limit_leaves_room_for_framing() {
    assert!(UPLOAD_BODY_LIMIT > MAX_IMAGE_BYTES);
}

// =============================================================================
// JsonBody
// =============================================================================

async fn extract<T: DeserializeOwned>(content_type: Option<&str>, body: &'static str) -> Result<T, ApiError> {
    let mut builder = Request::builder().method("POST").uri("/");
    if let Some(content_type) = content_type {
        builder = builder.header("content-type", content_type);
    }
    let request = builder.body(Body::from(body)).unwrap();
    JsonBody::<T>::from_request(request, &()).await.map(|WithRejection(Json(value), _)| value)
}

#[tokio::test]
async fn json_body_parses_valid_bodies() {
    let body: DogIdBody = extract(Some("application/json"), r#"{"dogId": 4}"#).await.unwrap();
    assert_eq!(body.dog_id().unwrap(), 4);
}

#[tokio::test]
async fn mistyped_field_is_a_json_400() {
    let err = extract::<DogIdBody>(Some("application/json"), r#"{"dogId": "four"}"#).await.unwrap_err();
    assert_eq!(err.status, StatusCode::BAD_REQUEST);
    assert!(!err.message.is_empty());

    let err = extract::<EventRequest>(Some("application/json"), r#"{"title": 12}"#).await.unwrap_err();
    assert_eq!(err.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn malformed_json_is_a_json_400() {
    let err = extract::<Value>(Some("application/json"), "{\"name\": ").await.unwrap_err();
    assert_eq!(err.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn missing_content_type_is_a_json_400() {
    let err = extract::<Value>(None, "{}").await.unwrap_err();
    assert_eq!(err.status, StatusCode::BAD_REQUEST);
    assert!(err.message.contains("Content-Type"));
}

#[tokio::test]
async fn json_rejection_renders_the_error_envelope() {
    let err = extract::<DogIdBody>(Some("application/json"), "[").await.unwrap_err();
    let response = err.into_response();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        response.headers().get("content-type").and_then(|v| v.to_str().ok()),
        Some("application/json")
    );
}
