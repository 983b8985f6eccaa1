//! Club events and their registrations.
//!
//! SYSTEM CONTEXT
//! ==============
//! Two kinds of registration hang off an event. Ordinary events (meetups,
//! shows, trials) take dogs through `event_dog`; `education` events are
//! lectures for people and take members through `event_registration`.
//! Trainers and admins edit the schedule, only admins delete from it.

use serde::Deserialize;
use sqlx::{PgPool, Row};
use time::OffsetDateTime;

use super::access::Actor;
use super::dogs::{self, DogError};
use super::timefmt::parse_timestamp;

/// Category of events that members (not dogs) register for.
pub const EDUCATION_CATEGORY: &str = "education";
pub const DEFAULT_CATEGORY: &str = "meetup";

#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Forbidden(&'static str),
    #[error("already registered")]
    AlreadyRegistered,
    #[error("not registered")]
    NotRegistered,
    #[error("{0}")]
    WrongEventKind(&'static str),
    #[error(transparent)]
    Dog(#[from] DogError),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// # Errors
///
/// Returns [`ScheduleError::Forbidden`] unless the actor is a trainer or admin.
pub fn require_manager(actor: &Actor) -> Result<(), ScheduleError> {
    if actor.role.can_manage_schedule() {
        Ok(())
    } else {
        Err(ScheduleError::Forbidden("only trainers and admins can edit the schedule"))
    }
}

/// # Errors
///
/// Returns [`ScheduleError::Forbidden`] unless the actor is an admin.
pub fn require_admin(actor: &Actor) -> Result<(), ScheduleError> {
    if actor.role.is_admin() { Ok(()) } else { Err(ScheduleError::Forbidden("only admins can delete from the schedule")) }
}

// =============================================================================
// EVENT INPUT
// =============================================================================

/// Body of `POST /events` and `PUT /events/{id}`. Absent fields keep their
/// current value on update.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRequest {
    pub title: Option<String>,
    pub category: Option<String>,
    pub start_at: Option<String>,
    pub end_at: Option<String>,
    pub venue: Option<String>,
    pub price: Option<f64>,
    pub description: Option<String>,
}

/// Complete event row as written to the database.
#[derive(Debug, Clone, PartialEq)]
pub struct EventDraft {
    pub title: String,
    pub category: String,
    pub start_at: OffsetDateTime,
    pub end_at: Option<OffsetDateTime>,
    pub venue: String,
    pub price: Option<f64>,
    pub description: Option<String>,
}

fn trimmed(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_owned()).filter(|v| !v.is_empty())
}

fn timestamp(field: &str, raw: &str) -> Result<OffsetDateTime, ScheduleError> {
    parse_timestamp(raw).ok_or_else(|| {
        ScheduleError::InvalidInput(format!("{field} must be RFC 3339 or YYYY-MM-DDTHH:MM, got '{raw}'"))
    })
}

impl EventRequest {
    /// Validate a creation request.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleError::InvalidInput`] when `title`, `startAt` or
    /// `venue` is missing, or the draft fails [`EventDraft::check`].
    pub fn into_draft(self) -> Result<EventDraft, ScheduleError> {
        let title = trimmed(self.title).ok_or_else(|| ScheduleError::InvalidInput("title is required".into()))?;
        let start_raw = trimmed(self.start_at).ok_or_else(|| ScheduleError::InvalidInput("startAt is required".into()))?;
        let venue = trimmed(self.venue).ok_or_else(|| ScheduleError::InvalidInput("venue is required".into()))?;

        let draft = EventDraft {
            title,
            category: trimmed(self.category).map_or_else(|| DEFAULT_CATEGORY.to_owned(), |c| c.to_ascii_lowercase()),
            start_at: timestamp("startAt", &start_raw)?,
            end_at: trimmed(self.end_at).map(|raw| timestamp("endAt", &raw)).transpose()?,
            venue,
            price: self.price,
            description: trimmed(self.description),
        };
        draft.check()?;
        Ok(draft)
    }

    /// Overlay this request on an existing event.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleError::InvalidInput`] when a value is malformed or
    /// the merged draft fails [`EventDraft::check`].
    pub fn apply_to(self, mut draft: EventDraft) -> Result<EventDraft, ScheduleError> {
        if let Some(title) = self.title {
            draft.title = title.trim().to_owned();
        }
        if let Some(category) = trimmed(self.category) {
            draft.category = category.to_ascii_lowercase();
        }
        if let Some(raw) = trimmed(self.start_at) {
            draft.start_at = timestamp("startAt", &raw)?;
        }
        if let Some(raw) = trimmed(self.end_at) {
            draft.end_at = Some(timestamp("endAt", &raw)?);
        }
        if let Some(venue) = self.venue {
            draft.venue = venue.trim().to_owned();
        }
        if self.price.is_some() {
            draft.price = self.price;
        }
        if let Some(description) = self.description {
            draft.description = Some(description.trim().to_owned()).filter(|d| !d.is_empty());
        }
        draft.check()?;
        Ok(draft)
    }
}

impl EventDraft {
    /// # Errors
    ///
    /// Returns [`ScheduleError::InvalidInput`] for a blank title or venue, an
    /// end before the start, or a negative price.
    pub fn check(&self) -> Result<(), ScheduleError> {
        if self.title.is_empty() {
            return Err(ScheduleError::InvalidInput("title cannot be empty".into()));
        }
        if self.venue.is_empty() {
            return Err(ScheduleError::InvalidInput("venue cannot be empty".into()));
        }
        if self.end_at.is_some_and(|end| end < self.start_at) {
            return Err(ScheduleError::InvalidInput("endAt cannot be before startAt".into()));
        }
        check_price(self.price)
    }
}

/// # Errors
///
/// Returns [`ScheduleError::InvalidInput`] for a negative or non-finite price.
pub fn check_price(price: Option<f64>) -> Result<(), ScheduleError> {
    match price {
        Some(p) if !p.is_finite() || p < 0.0 => Err(ScheduleError::InvalidInput("price cannot be negative".into())),
        _ => Ok(()),
    }
}

// =============================================================================
// EVENT WRITES
// =============================================================================

/// # Errors
///
/// Returns [`ScheduleError::Forbidden`] for non-managers.
pub async fn create_event(pool: &PgPool, actor: &Actor, request: EventRequest) -> Result<i64, ScheduleError> {
    require_manager(actor)?;
    let draft = request.into_draft()?;
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO event (title, category, start_at, end_at, venue, price, description) \
         VALUES ($1, $2, $3, $4, $5, $6::numeric, $7) RETURNING id",
    )
    .bind(&draft.title)
    .bind(&draft.category)
    .bind(draft.start_at)
    .bind(draft.end_at)
    .bind(&draft.venue)
    .bind(draft.price)
    .bind(&draft.description)
    .fetch_one(pool)
    .await?;
    tracing::info!(event_id = id, actor = actor.member_id, "event created");
    Ok(id)
}

/// # Errors
///
/// Returns a database error if the query fails.
pub async fn load_event(pool: &PgPool, event_id: i64) -> Result<Option<EventDraft>, sqlx::Error> {
    let row = sqlx::query(
        "SELECT title, category, start_at, end_at, venue, price::float8 AS price, description \
         FROM event WHERE id = $1",
    )
    .bind(event_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| EventDraft {
        title: r.get("title"),
        category: r.get("category"),
        start_at: r.get("start_at"),
        end_at: r.get("end_at"),
        venue: r.get("venue"),
        price: r.get("price"),
        description: r.get("description"),
    }))
}

/// # Errors
///
/// Returns [`ScheduleError::Forbidden`] for non-managers and
/// [`ScheduleError::NotFound`] for an unknown event.
pub async fn update_event(pool: &PgPool, actor: &Actor, event_id: i64, request: EventRequest) -> Result<(), ScheduleError> {
    require_manager(actor)?;
    let current = load_event(pool, event_id).await?.ok_or(ScheduleError::NotFound("event"))?;
    let draft = request.apply_to(current)?;

    sqlx::query(
        "UPDATE event SET title = $2, category = $3, start_at = $4, end_at = $5, venue = $6, \
         price = $7::numeric, description = $8 WHERE id = $1",
    )
    .bind(event_id)
    .bind(&draft.title)
    .bind(&draft.category)
    .bind(draft.start_at)
    .bind(draft.end_at)
    .bind(&draft.venue)
    .bind(draft.price)
    .bind(&draft.description)
    .execute(pool)
    .await?;
    Ok(())
}

/// # Errors
///
/// Returns [`ScheduleError::Forbidden`] for non-admins and
/// [`ScheduleError::NotFound`] for an unknown event.
pub async fn delete_event(pool: &PgPool, actor: &Actor, event_id: i64) -> Result<(), ScheduleError> {
    require_admin(actor)?;
    let result = sqlx::query("DELETE FROM event WHERE id = $1").bind(event_id).execute(pool).await?;
    if result.rows_affected() == 0 {
        return Err(ScheduleError::NotFound("event"));
    }
    tracing::info!(event_id, actor = actor.member_id, "event deleted");
    Ok(())
}

// =============================================================================
// REGISTRATIONS
// =============================================================================

async fn event_category(pool: &PgPool, event_id: i64) -> Result<String, ScheduleError> {
    sqlx::query_scalar("SELECT category FROM event WHERE id = $1")
        .bind(event_id)
        .fetch_optional(pool)
        .await?
        .ok_or(ScheduleError::NotFound("event"))
}

/// Register a dog for an ordinary event.
///
/// # Errors
///
/// Returns [`ScheduleError::WrongEventKind`] for education events,
/// [`ScheduleError::AlreadyRegistered`] on a repeat, and dog ownership
/// errors through [`ScheduleError::Dog`].
pub async fn register_dog(pool: &PgPool, actor: &Actor, event_id: i64, dog_id: i64) -> Result<(), ScheduleError> {
    if event_category(pool, event_id).await? == EDUCATION_CATEGORY {
        return Err(ScheduleError::WrongEventKind("dogs cannot be registered for education events"));
    }
    dogs::authorize(pool, actor, dog_id).await?;

    let result = sqlx::query("INSERT INTO event_dog (event_id, dog_id) VALUES ($1, $2) ON CONFLICT DO NOTHING")
        .bind(event_id)
        .bind(dog_id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ScheduleError::AlreadyRegistered);
    }
    Ok(())
}

/// # Errors
///
/// Returns [`ScheduleError::NotRegistered`] when the dog was not registered.
pub async fn unregister_dog(pool: &PgPool, actor: &Actor, event_id: i64, dog_id: i64) -> Result<(), ScheduleError> {
    dogs::authorize(pool, actor, dog_id).await?;
    let result = sqlx::query("DELETE FROM event_dog WHERE event_id = $1 AND dog_id = $2")
        .bind(event_id)
        .bind(dog_id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ScheduleError::NotRegistered);
    }
    Ok(())
}

/// Register the calling member for an education event.
///
/// # Errors
///
/// Returns [`ScheduleError::WrongEventKind`] for ordinary events and
/// [`ScheduleError::AlreadyRegistered`] on a repeat.
pub async fn register_member(pool: &PgPool, member_id: i64, event_id: i64) -> Result<(), ScheduleError> {
    if event_category(pool, event_id).await? != EDUCATION_CATEGORY {
        return Err(ScheduleError::WrongEventKind("only education events accept member registration"));
    }
    let result =
        sqlx::query("INSERT INTO event_registration (event_id, member_id) VALUES ($1, $2) ON CONFLICT DO NOTHING")
            .bind(event_id)
            .bind(member_id)
            .execute(pool)
            .await?;
    if result.rows_affected() == 0 {
        return Err(ScheduleError::AlreadyRegistered);
    }
    Ok(())
}

/// # Errors
///
/// Returns [`ScheduleError::WrongEventKind`] for ordinary events and
/// [`ScheduleError::NotRegistered`] when there was nothing to cancel.
pub async fn unregister_member(pool: &PgPool, member_id: i64, event_id: i64) -> Result<(), ScheduleError> {
    if event_category(pool, event_id).await? != EDUCATION_CATEGORY {
        return Err(ScheduleError::WrongEventKind("only education events accept member registration"));
    }
    let result = sqlx::query("DELETE FROM event_registration WHERE event_id = $1 AND member_id = $2")
        .bind(event_id)
        .bind(member_id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ScheduleError::NotRegistered);
    }
    Ok(())
}

#[cfg(test)]
#[path = "events_test.rs"]
mod tests;
