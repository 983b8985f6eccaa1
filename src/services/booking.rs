//! Bookable club services and their status lifecycle.
//!
//! ARCHITECTURE
//! ============
//! A booking (`dog_service` row) snapshots the service name and price at the
//! time it was requested, so later price changes do not rewrite history.
//! Status moves forward only:
//!
//! ```text
//! REQUESTED -> SCHEDULED -> DONE
//!     |            |
//!     +------------+-----> CANCELED
//! ```
//!
//! Status writes are conditional on the status that was read, so two staff
//! members racing on the same booking cannot both win.

use serde_json::{Map, Value};
use sqlx::{PgPool, Row};
use time::OffsetDateTime;

use super::access::Actor;
use super::timefmt::parse_timestamp;

#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("dog not found")]
    DogNotFound,
    #[error("service type not found")]
    ServiceTypeNotFound,
    #[error("booking not found")]
    BookingNotFound,
    #[error("{0}")]
    Forbidden(&'static str),
    #[error("a completed service cannot be canceled")]
    AlreadyDone,
    #[error("booking is already canceled")]
    AlreadyCanceled,
    #[error("cannot change status from {from} to {to}")]
    InvalidTransition { from: &'static str, to: &'static str },
    #[error("booking was changed concurrently, retry")]
    Conflict,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

// =============================================================================
// STATUS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingStatus {
    Requested,
    Scheduled,
    Done,
    Canceled,
}

impl BookingStatus {
    pub const ALL: [Self; 4] = [Self::Requested, Self::Scheduled, Self::Done, Self::Canceled];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Requested => "REQUESTED",
            Self::Scheduled => "SCHEDULED",
            Self::Done => "DONE",
            Self::Canceled => "CANCELED",
        }
    }

    /// Human-readable label shown by the client.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Requested => "Request sent",
            Self::Scheduled => "Scheduled",
            Self::Done => "Done",
            Self::Canceled => "Canceled",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        Self::ALL.into_iter().find(|s| s.as_str().eq_ignore_ascii_case(raw))
    }

    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Requested, Self::Scheduled | Self::Canceled) | (Self::Scheduled, Self::Done | Self::Canceled)
        )
    }
}

/// `{"REQUESTED": "Request sent", ...}` for `GET /services/my`.
#[must_use]
pub fn status_labels() -> Value {
    let labels: Map<String, Value> = BookingStatus::ALL
        .into_iter()
        .map(|s| (s.as_str().to_owned(), Value::String(s.label().to_owned())))
        .collect();
    Value::Object(labels)
}

// =============================================================================
// BOOK REQUEST
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookRequest {
    pub dog_id: i64,
    pub service_type_id: i64,
    pub requested_at: OffsetDateTime,
}

fn read_id(body: &Map<String, Value>, key: &str) -> Result<i64, BookingError> {
    let parsed = match body.get(key) {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| BookingError::InvalidInput(format!("{key} must be an integer")))
}

impl BookRequest {
    /// # Errors
    ///
    /// Returns [`BookingError::InvalidInput`] when an id is not an integer or
    /// `requestedAt` is not a recognised timestamp.
    pub fn from_body(body: &Map<String, Value>) -> Result<Self, BookingError> {
        let dog_id = read_id(body, "dogId")?;
        let service_type_id = read_id(body, "serviceTypeId")?;
        let requested_at = body
            .get("requestedAt")
            .and_then(Value::as_str)
            .and_then(parse_timestamp)
            .ok_or_else(|| BookingError::InvalidInput("requestedAt must be a valid date and time".into()))?;
        Ok(Self { dog_id, service_type_id, requested_at })
    }
}

// =============================================================================
// WRITES
// =============================================================================

/// Book a service for a dog, returning the booking id.
///
/// # Errors
///
/// Returns [`BookingError::DogNotFound`], [`BookingError::Forbidden`] or
/// [`BookingError::ServiceTypeNotFound`].
pub async fn book(pool: &PgPool, actor: &Actor, request: &BookRequest) -> Result<i64, BookingError> {
    let owner: i64 = sqlx::query_scalar("SELECT member_id FROM dog WHERE id = $1")
        .bind(request.dog_id)
        .fetch_optional(pool)
        .await?
        .ok_or(BookingError::DogNotFound)?;
    if !actor.can_act_for(owner) {
        return Err(BookingError::Forbidden("you can only book services for your own dogs"));
    }

    let service_name: String = sqlx::query_scalar("SELECT name FROM service_type WHERE id = $1")
        .bind(request.service_type_id)
        .fetch_optional(pool)
        .await?
        .ok_or(BookingError::ServiceTypeNotFound)?;

    let id: i64 = sqlx::query_scalar(
        "INSERT INTO dog_service (dog_id, service_type_id, requested_at, performed_at, price, status, service_name) \
         SELECT $1, st.id, $3, NULL, st.price, 'REQUESTED'::service_status, $4 \
         FROM service_type st WHERE st.id = $2 RETURNING id",
    )
    .bind(request.dog_id)
    .bind(request.service_type_id)
    .bind(request.requested_at)
    .bind(&service_name)
    .fetch_one(pool)
    .await?;

    tracing::info!(booking_id = id, dog_id = request.dog_id, service = %service_name, "service booked");
    Ok(id)
}

struct BookingRow {
    status: BookingStatus,
    owner_id: i64,
}

async fn load_booking(pool: &PgPool, booking_id: i64) -> Result<BookingRow, BookingError> {
    let row = sqlx::query(
        "SELECT ds.status::text AS status, d.member_id FROM dog_service ds \
         JOIN dog d ON d.id = ds.dog_id WHERE ds.id = $1",
    )
    .bind(booking_id)
    .fetch_optional(pool)
    .await?
    .ok_or(BookingError::BookingNotFound)?;

    let raw: String = row.get("status");
    let status = BookingStatus::parse(&raw)
        .ok_or_else(|| BookingError::InvalidInput(format!("unknown stored status '{raw}'")))?;
    Ok(BookingRow { status, owner_id: row.get("member_id") })
}

async fn write_status(
    pool: &PgPool,
    booking_id: i64,
    from: BookingStatus,
    to: BookingStatus,
) -> Result<(), BookingError> {
    let result = sqlx::query(
        "UPDATE dog_service SET status = $3::service_status, \
         performed_at = CASE WHEN $4 THEN now() WHEN $5 THEN NULL ELSE performed_at END \
         WHERE id = $1 AND status = $2::service_status",
    )
    .bind(booking_id)
    .bind(from.as_str())
    .bind(to.as_str())
    .bind(to == BookingStatus::Done)
    .bind(to == BookingStatus::Canceled)
    .execute(pool)
    .await?;
    if result.rows_affected() == 0 {
        return Err(BookingError::Conflict);
    }
    Ok(())
}

/// Cancel a booking on behalf of its owner (or an admin).
///
/// # Errors
///
/// Returns [`BookingError::AlreadyDone`] or [`BookingError::AlreadyCanceled`]
/// for finished bookings.
pub async fn cancel(pool: &PgPool, actor: &Actor, booking_id: i64) -> Result<(), BookingError> {
    let booking = load_booking(pool, booking_id).await?;
    if !actor.can_act_for(booking.owner_id) {
        return Err(BookingError::Forbidden("you can only cancel bookings for your own dogs"));
    }
    match booking.status {
        BookingStatus::Done => Err(BookingError::AlreadyDone),
        BookingStatus::Canceled => Err(BookingError::AlreadyCanceled),
        from => write_status(pool, booking_id, from, BookingStatus::Canceled).await,
    }
}

/// Move a booking to `next`. Trainers and admins only.
///
/// # Errors
///
/// Returns [`BookingError::Forbidden`] for other roles and
/// [`BookingError::InvalidTransition`] when the lifecycle does not allow it.
pub async fn set_status(pool: &PgPool, actor: &Actor, booking_id: i64, next: &str) -> Result<BookingStatus, BookingError> {
    if !actor.role.can_manage_schedule() {
        return Err(BookingError::Forbidden("only trainers and admins can change booking status"));
    }
    let next = BookingStatus::parse(next).ok_or_else(|| {
        BookingError::InvalidInput("status must be one of REQUESTED, SCHEDULED, DONE, CANCELED".into())
    })?;

    let booking = load_booking(pool, booking_id).await?;
    if !booking.status.can_transition_to(next) {
        return Err(BookingError::InvalidTransition { from: booking.status.as_str(), to: next.as_str() });
    }
    write_status(pool, booking_id, booking.status, next).await?;
    tracing::info!(booking_id, status = next.as_str(), actor = actor.member_id, "booking status changed");
    Ok(next)
}

#[cfg(test)]
#[path = "booking_test.rs"]
mod tests;
