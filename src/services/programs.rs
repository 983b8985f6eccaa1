//! Training programs and dog enrolment.

use serde::Deserialize;
use sqlx::{PgPool, Row};

use super::access::Actor;
use super::dogs;
use super::events::{ScheduleError, check_price, require_admin, require_manager};

/// Program formats stored in `program.type`.
pub const PROGRAM_TYPES: [&str; 2] = ["personal", "group"];

/// Body of `POST /programs` and `PUT /programs/{id}`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramRequest {
    pub title: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub price: Option<f64>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProgramDraft {
    pub title: String,
    pub kind: String,
    pub price: Option<f64>,
    pub description: Option<String>,
}

/// # Errors
///
/// Returns [`ScheduleError::InvalidInput`] for anything but `personal` or `group`.
pub fn parse_kind(raw: &str) -> Result<String, ScheduleError> {
    let kind = raw.trim().to_ascii_lowercase();
    if PROGRAM_TYPES.contains(&kind.as_str()) {
        Ok(kind)
    } else {
        Err(ScheduleError::InvalidInput("type must be personal or group".into()))
    }
}

impl ProgramRequest {
    /// # Errors
    ///
    /// Returns [`ScheduleError::InvalidInput`] for a missing title, unknown
    /// type or negative price.
    pub fn into_draft(self) -> Result<ProgramDraft, ScheduleError> {
        let title = self
            .title
            .map(|t| t.trim().to_owned())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ScheduleError::InvalidInput("title is required".into()))?;
        let kind = match self.kind.as_deref().map(str::trim) {
            None | Some("") => "group".to_owned(),
            Some(raw) => parse_kind(raw)?,
        };
        check_price(self.price)?;
        Ok(ProgramDraft {
            title,
            kind,
            price: self.price,
            description: self.description.map(|d| d.trim().to_owned()).filter(|d| !d.is_empty()),
        })
    }

    /// # Errors
    ///
    /// Same rules as [`ProgramRequest::into_draft`] on the merged result.
    pub fn apply_to(self, mut draft: ProgramDraft) -> Result<ProgramDraft, ScheduleError> {
        if let Some(title) = self.title {
            let title = title.trim().to_owned();
            if title.is_empty() {
                return Err(ScheduleError::InvalidInput("title cannot be empty".into()));
            }
            draft.title = title;
        }
        if let Some(kind) = self.kind {
            draft.kind = parse_kind(&kind)?;
        }
        if self.price.is_some() {
            check_price(self.price)?;
            draft.price = self.price;
        }
        if let Some(description) = self.description {
            draft.description = Some(description.trim().to_owned()).filter(|d| !d.is_empty());
        }
        Ok(draft)
    }
}

/// # Errors
///
/// Returns [`ScheduleError::Forbidden`] for non-managers.
pub async fn create_program(pool: &PgPool, actor: &Actor, request: ProgramRequest) -> Result<i64, ScheduleError> {
    require_manager(actor)?;
    let draft = request.into_draft()?;
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO program (title, type, price, description) VALUES ($1, $2, $3::numeric, $4) RETURNING id",
    )
    .bind(&draft.title)
    .bind(&draft.kind)
    .bind(draft.price)
    .bind(&draft.description)
    .fetch_one(pool)
    .await?;
    tracing::info!(program_id = id, actor = actor.member_id, "program created");
    Ok(id)
}

async fn load_program(pool: &PgPool, program_id: i64) -> Result<Option<ProgramDraft>, sqlx::Error> {
    let row = sqlx::query("SELECT title, type, price::float8 AS price, description FROM program WHERE id = $1")
        .bind(program_id)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|r| ProgramDraft {
        title: r.get("title"),
        kind: r.get("type"),
        price: r.get("price"),
        description: r.get("description"),
    }))
}

/// # Errors
///
/// Returns [`ScheduleError::Forbidden`] for non-managers and
/// [`ScheduleError::NotFound`] for an unknown program.
pub async fn update_program(
    pool: &PgPool,
    actor: &Actor,
    program_id: i64,
    request: ProgramRequest,
) -> Result<(), ScheduleError> {
    require_manager(actor)?;
    let current = load_program(pool, program_id).await?.ok_or(ScheduleError::NotFound("program"))?;
    let draft = request.apply_to(current)?;
    sqlx::query("UPDATE program SET title = $2, type = $3, price = $4::numeric, description = $5 WHERE id = $1")
        .bind(program_id)
        .bind(&draft.title)
        .bind(&draft.kind)
        .bind(draft.price)
        .bind(&draft.description)
        .execute(pool)
        .await?;
    Ok(())
}

/// # Errors
///
/// Returns [`ScheduleError::Forbidden`] for non-admins and
/// [`ScheduleError::NotFound`] for an unknown program.
pub async fn delete_program(pool: &PgPool, actor: &Actor, program_id: i64) -> Result<(), ScheduleError> {
    require_admin(actor)?;
    let result = sqlx::query("DELETE FROM program WHERE id = $1").bind(program_id).execute(pool).await?;
    if result.rows_affected() == 0 {
        return Err(ScheduleError::NotFound("program"));
    }
    tracing::info!(program_id, actor = actor.member_id, "program deleted");
    Ok(())
}

/// Enrol a dog in a program.
///
/// # Errors
///
/// Returns [`ScheduleError::NotFound`] for an unknown program and
/// [`ScheduleError::AlreadyRegistered`] on a repeat.
pub async fn enroll_dog(pool: &PgPool, actor: &Actor, program_id: i64, dog_id: i64) -> Result<(), ScheduleError> {
    let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM program WHERE id = $1")
        .bind(program_id)
        .fetch_optional(pool)
        .await?;
    if exists.is_none() {
        return Err(ScheduleError::NotFound("program"));
    }
    dogs::authorize(pool, actor, dog_id).await?;

    let result =
        sqlx::query("INSERT INTO program_registration (program_id, dog_id) VALUES ($1, $2) ON CONFLICT DO NOTHING")
            .bind(program_id)
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
/// Returns [`ScheduleError::NotRegistered`] when the dog was not enrolled.
pub async fn withdraw_dog(pool: &PgPool, actor: &Actor, program_id: i64, dog_id: i64) -> Result<(), ScheduleError> {
    dogs::authorize(pool, actor, dog_id).await?;
    let result = sqlx::query("DELETE FROM program_registration WHERE program_id = $1 AND dog_id = $2")
        .bind(program_id)
        .bind(dog_id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ScheduleError::NotRegistered);
    }
    Ok(())
}

#[cfg(test)]
#[path = "programs_test.rs"]
mod tests;
