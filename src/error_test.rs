use super::*;

async fn body_json(response: Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn renders_error_object() {
    let response = ApiError::conflict("already registered").into_response();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await, json!({"error": "already registered"}));
}

#[tokio::test]
async fn internal_errors_hide_details() {
    let err: ApiError = sqlx::Error::PoolTimedOut.into();
    assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(err.into_response()).await, json!({"error": "internal server error"}));
}

#[test]
fn auth_error_statuses() {
    assert_eq!(ApiError::from(AuthError::InvalidInput("email is required")).status, StatusCode::BAD_REQUEST);
    assert_eq!(ApiError::from(AuthError::EmailTaken).status, StatusCode::CONFLICT);
    let err = ApiError::from(AuthError::InvalidCredentials);
    assert_eq!(err.status, StatusCode::UNAUTHORIZED);
    assert_eq!(err.message, "invalid email or password");
    assert_eq!(ApiError::from(AuthError::Worker("x".into())).status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[test]
fn token_errors_are_unauthorized() {
    assert_eq!(ApiError::from(TokenError::Invalid("expired".into())).status, StatusCode::UNAUTHORIZED);
    assert_eq!(ApiError::from(TokenError::BadSubject).status, StatusCode::UNAUTHORIZED);
    assert_eq!(ApiError::from(TokenError::Sign("bad key".into())).status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[test]
fn dog_and_profile_statuses() {
    assert_eq!(ApiError::from(DogError::NotFound).status, StatusCode::NOT_FOUND);
    assert_eq!(ApiError::from(DogError::Forbidden).status, StatusCode::FORBIDDEN);
    assert_eq!(ApiError::from(DogError::ChipTaken).status, StatusCode::CONFLICT);
    assert_eq!(ApiError::from(DogError::InvalidInput("sex".into())).status, StatusCode::BAD_REQUEST);
    assert_eq!(ApiError::from(ProfileError::EmailTaken).status, StatusCode::CONFLICT);
    assert_eq!(ApiError::from(ProfileError::NotFound).status, StatusCode::NOT_FOUND);
}

#[test]
fn schedule_statuses() {
    assert_eq!(ApiError::from(ScheduleError::NotFound("event")).status, StatusCode::NOT_FOUND);
    assert_eq!(ApiError::from(ScheduleError::NotRegistered).status, StatusCode::NOT_FOUND);
    assert_eq!(ApiError::from(ScheduleError::AlreadyRegistered).status, StatusCode::CONFLICT);
    assert_eq!(ApiError::from(ScheduleError::WrongEventKind("not education")).status, StatusCode::BAD_REQUEST);
    assert_eq!(ApiError::from(ScheduleError::Forbidden("admins only")).status, StatusCode::FORBIDDEN);
    assert_eq!(ApiError::from(ScheduleError::Dog(DogError::Forbidden)).status, StatusCode::FORBIDDEN);
}

#[test]
fn booking_statuses() {
    assert_eq!(ApiError::from(BookingError::ServiceTypeNotFound).status, StatusCode::NOT_FOUND);
    assert_eq!(ApiError::from(BookingError::AlreadyDone).status, StatusCode::CONFLICT);
    let err = ApiError::from(BookingError::InvalidTransition { from: "REQUESTED", to: "DONE" });
    assert_eq!(err.status, StatusCode::CONFLICT);
    assert_eq!(err.message, "cannot change status from REQUESTED to DONE");
}

#[test]
fn storage_statuses() {
    assert_eq!(ApiError::from(StorageError::TooLarge).status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(ApiError::from(StorageError::UnsupportedType).status, StatusCode::BAD_REQUEST);
    assert_eq!(ApiError::from(StorageError::Empty).status, StatusCode::BAD_REQUEST);
    assert_eq!(ApiError::from(StorageError::NoRemoteDir).status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[test]
fn report_statuses() {
    assert_eq!(ApiError::from(ReportError::NotFound).status, StatusCode::NOT_FOUND);
    assert_eq!(ApiError::from(ReportError::Render("boom".into())).status, StatusCode::INTERNAL_SERVER_ERROR);
}
