use super::*;
use crate::services::access::Role;
use crate::state::test_helpers;
use serde_json::json;
use time::macros::datetime;

fn body(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

// =============================================================================
// BookingStatus
// =============================================================================

#[test]
fn parse_is_case_insensitive() {
    assert_eq!(BookingStatus::parse("scheduled"), Some(BookingStatus::Scheduled));
    assert_eq!(BookingStatus::parse(" DONE "), Some(BookingStatus::Done));
    assert_eq!(BookingStatus::parse("CANCELLED"), None);
    assert_eq!(BookingStatus::parse(""), None);
}

#[test]
fn allowed_transitions() {
    use BookingStatus::*;
    assert!(Requested.can_transition_to(Scheduled));
    assert!(Requested.can_transition_to(Canceled));
    assert!(Scheduled.can_transition_to(Done));
    assert!(Scheduled.can_transition_to(Canceled));
}

#[test]
fn forbidden_transitions() {
    use BookingStatus::*;
    assert!(!Requested.can_transition_to(Done));
    assert!(!Requested.can_transition_to(Requested));
    assert!(!Scheduled.can_transition_to(Requested));
    for next in BookingStatus::ALL {
        assert!(!Done.can_transition_to(next));
        assert!(!Canceled.can_transition_to(next));
    }
}

#[test]
fn labels_cover_every_status() {
    let labels = status_labels();
    for status in BookingStatus::ALL {
        assert_eq!(labels[status.as_str()], status.label());
    }
    assert_eq!(labels.as_object().map(Map::len), Some(4));
}

#[test]
fn label_wording() {
    use BookingStatus::*;
    assert_eq!(Requested.label(), "Request sent");
    assert_eq!(Scheduled.label(), "Scheduled");
    assert_eq!(Done.label(), "Done");
    assert_eq!(Canceled.label(), "Canceled");
}

// =============================================================================
// BookRequest
// =============================================================================

#[test]
fn book_request_accepts_numbers_and_numeric_strings() {
    let request = BookRequest::from_body(&body(json!({
        "dogId": 3,
        "serviceTypeId": "2",
        "requestedAt": "2025-05-20T14:00"
    })))
    .unwrap();
    assert_eq!(request.dog_id, 3);
    assert_eq!(request.service_type_id, 2);
    assert_eq!(request.requested_at, datetime!(2025-05-20 14:00 UTC));
}

#[test]
fn book_request_rejects_non_integer_ids() {
    let err = BookRequest::from_body(&body(json!({"dogId": 1.5, "serviceTypeId": 2, "requestedAt": "2025-05-20T14:00"})))
        .unwrap_err();
    assert_eq!(err.to_string(), "dogId must be an integer");

    let err = BookRequest::from_body(&body(json!({"dogId": 1, "requestedAt": "2025-05-20T14:00"}))).unwrap_err();
    assert_eq!(err.to_string(), "serviceTypeId must be an integer");
}

#[test]
fn book_request_rejects_bad_date() {
    let err = BookRequest::from_body(&body(json!({"dogId": 1, "serviceTypeId": 2, "requestedAt": "soon"}))).unwrap_err();
    assert!(matches!(err, BookingError::InvalidInput(_)));
    let err = BookRequest::from_body(&body(json!({"dogId": 1, "serviceTypeId": 2, "requestedAt": 5}))).unwrap_err();
    assert!(matches!(err, BookingError::InvalidInput(_)));
}

// =============================================================================
// set_status guards (no database needed)
// =============================================================================

#[tokio::test]
async fn member_cannot_change_status() {
    let state = test_helpers::test_app_state();
    let err = set_status(&state.pool, &Actor::new(1, Role::Member), 1, "DONE").await.unwrap_err();
    assert!(matches!(err, BookingError::Forbidden(_)));
}

#[tokio::test]
async fn unknown_status_is_invalid_input() {
    let state = test_helpers::test_app_state();
    let err = set_status(&state.pool, &Actor::new(1, Role::Trainer), 1, "LOST").await.unwrap_err();
    assert!(matches!(err, BookingError::InvalidInput(_)));
}

// =============================================================================
// database (requires Postgres)
// =============================================================================

#[cfg(feature = "live-db-tests")]
#[tokio::test]
async fn booking_lifecycle() {
    use crate::state::test_helpers::{live_pool, seed_member};

    let pool = live_pool().await;
    let owner_id = seed_member(&pool, "owner@example.com", "member").await;
    let owner = Actor::new(owner_id, Role::Member);
    let stranger = Actor::new(seed_member(&pool, "other@example.com", "member").await, Role::Member);
    let trainer = Actor::new(seed_member(&pool, "trainer@example.com", "trainer").await, Role::Trainer);

    let dog: i64 = sqlx::query_scalar("INSERT INTO dog (member_id, name, breed, sex) VALUES ($1, 'Rex', 'Pug', 'M') RETURNING id")
        .bind(owner_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    let service_type: i64 = sqlx::query_scalar("SELECT id FROM service_type ORDER BY id LIMIT 1")
        .fetch_one(&pool)
        .await
        .unwrap();

    let request = BookRequest { dog_id: dog, service_type_id: service_type, requested_at: datetime!(2025-05-20 14:00 UTC) };
    assert!(matches!(book(&pool, &stranger, &request).await, Err(BookingError::Forbidden(_))));
    let missing_type = BookRequest { service_type_id: 999_999, ..request.clone() };
    assert!(matches!(book(&pool, &owner, &missing_type).await, Err(BookingError::ServiceTypeNotFound)));

    let id = book(&pool, &owner, &request).await.unwrap();
    assert!(matches!(
        set_status(&pool, &trainer, id, "DONE").await,
        Err(BookingError::InvalidTransition { from: "REQUESTED", to: "DONE" })
    ));
    set_status(&pool, &trainer, id, "SCHEDULED").await.unwrap();
    set_status(&pool, &trainer, id, "done").await.unwrap();
    let performed: Option<OffsetDateTime> = sqlx::query_scalar("SELECT performed_at FROM dog_service WHERE id = $1")
        .bind(id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert!(performed.is_some());
    assert!(matches!(cancel(&pool, &owner, id).await, Err(BookingError::AlreadyDone)));

    let second = book(&pool, &owner, &request).await.unwrap();
    cancel(&pool, &owner, second).await.unwrap();
    assert!(matches!(cancel(&pool, &owner, second).await, Err(BookingError::AlreadyCanceled)));
    assert!(matches!(cancel(&pool, &owner, 999_999).await, Err(BookingError::BookingNotFound)));
}
