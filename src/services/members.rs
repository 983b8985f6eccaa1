//! Member profile updates.
//!
//! `PUT /me` accepts a loose JSON object. Keys are matched case-insensitively
//! against a fixed allow-list; unknown keys are ignored so older clients that
//! echo the whole profile back keep working.

use serde_json::{Map, Value};
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::db;

#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("member not found")]
    NotFound,
    #[error("a member with this email already exists")]
    EmailTaken,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Map a request key to its `member` column.
#[must_use]
pub fn profile_column(key: &str) -> Option<&'static str> {
    match key.to_ascii_lowercase().as_str() {
        "fullname" => Some("full_name"),
        "phone" => Some("phone"),
        "email" => Some("email"),
        "city" => Some("city"),
        "avatarurl" => Some("avatar_url"),
        "ownerbio" | "bio" => Some("bio"),
        _ => None,
    }
}

const REQUIRED_COLUMNS: [&str; 2] = ["full_name", "email"];

/// Collect `(column, value)` pairs from a profile update body.
///
/// Strings are trimmed and blank strings become `NULL`. Numbers and booleans
/// are stored as text. A later key for the same column wins.
///
/// # Errors
///
/// Returns [`ProfileError::InvalidInput`] when no allowed key is present, a
/// value is an array or object, or `fullName`/`email` would be cleared.
pub fn profile_changes(body: &Map<String, Value>) -> Result<Vec<(&'static str, Option<String>)>, ProfileError> {
    let mut changes: Vec<(&'static str, Option<String>)> = Vec::new();

    for (key, value) in body {
        let Some(column) = profile_column(key) else {
            continue;
        };
        let text = match value {
            Value::Null => None,
            Value::String(s) => Some(s.trim().to_owned()).filter(|s| !s.is_empty()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Array(_) | Value::Object(_) => {
                return Err(ProfileError::InvalidInput(format!("{key} must be a string")));
            }
        };
        if text.is_none() && REQUIRED_COLUMNS.contains(&column) {
            return Err(ProfileError::InvalidInput(format!("{key} cannot be empty")));
        }

        match changes.iter_mut().find(|(c, _)| *c == column) {
            Some(existing) => existing.1 = text,
            None => changes.push((column, text)),
        }
    }

    if changes.is_empty() {
        return Err(ProfileError::InvalidInput(
            "no updatable fields; allowed: fullName, phone, email, city, avatarUrl, ownerBio".into(),
        ));
    }
    Ok(changes)
}

/// Apply a profile update to `member_id`.
///
/// # Errors
///
/// Returns [`ProfileError::NotFound`] when the member is gone and
/// [`ProfileError::EmailTaken`] on an email collision.
pub async fn update_profile(pool: &PgPool, member_id: i64, body: &Map<String, Value>) -> Result<(), ProfileError> {
    let changes = profile_changes(body)?;

    let mut builder: QueryBuilder<'_, Postgres> = QueryBuilder::new("UPDATE member SET ");
    let mut fields = builder.separated(", ");
    for (column, value) in changes {
        fields.push(column);
        fields.push_unseparated(" = ");
        fields.push_bind_unseparated(value);
    }
    builder.push(" WHERE id = ");
    builder.push_bind(member_id);

    let result = builder
        .build()
        .execute(pool)
        .await
        .map_err(|e| if db::is_unique_violation(&e) { ProfileError::EmailTaken } else { ProfileError::Database(e) })?;
    if result.rows_affected() == 0 {
        return Err(ProfileError::NotFound);
    }
    Ok(())
}

/// Store a new avatar URL, returning the previous one.
///
/// # Errors
///
/// Returns [`ProfileError::NotFound`] when the member is gone.
pub async fn replace_avatar(pool: &PgPool, member_id: i64, avatar_url: &str) -> Result<Option<String>, ProfileError> {
    // the subquery reads the pre-update row
    let previous: Option<Option<String>> = sqlx::query_scalar(
        "UPDATE member m SET avatar_url = $2 \
         FROM (SELECT avatar_url FROM member WHERE id = $1) old \
         WHERE m.id = $1 RETURNING old.avatar_url",
    )
    .bind(member_id)
    .bind(avatar_url)
    .fetch_optional(pool)
    .await?;
    previous.ok_or(ProfileError::NotFound)
}

#[cfg(test)]
#[path = "members_test.rs"]
mod tests;
