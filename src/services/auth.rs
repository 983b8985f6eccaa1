//! Password registration and login.
//!
//! DESIGN
//! ======
//! The client never sends a plain password: `passwordHash` is a digest the
//! SPA computes. The server treats that digest as the secret and stores an
//! Argon2id hash of it, so a database leak does not expose a value the
//! client could replay.

use serde::Deserialize;
use sqlx::{PgPool, Row};

use super::access::Role;
use super::password::{self, PasswordError};
use super::token::TokenSubject;
use crate::db;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("{0}")]
    InvalidInput(&'static str),
    #[error("a member with this email already exists")]
    EmailTaken,
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error(transparent)]
    Password(#[from] PasswordError),
    #[error("password worker failed: {0}")]
    Worker(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Body of `POST /auth/register`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub phone: Option<String>,
    pub city: Option<String>,
}

/// Body of `POST /auth/login`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password_hash: Option<String>,
}

/// Validated registration data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMember {
    pub full_name: String,
    pub email: String,
    pub secret: String,
    pub phone: Option<String>,
    pub city: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_owned()).filter(|v| !v.is_empty())
}

impl RegisterRequest {
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidInput`] when a required field is missing or blank.
    pub fn validate(self) -> Result<NewMember, AuthError> {
        match (non_blank(self.full_name), non_blank(self.email), non_blank(self.password_hash)) {
            (Some(full_name), Some(email), Some(secret)) => Ok(NewMember {
                full_name,
                email,
                secret,
                phone: non_blank(self.phone),
                city: non_blank(self.city),
            }),
            _ => Err(AuthError::InvalidInput("fullName, email and passwordHash are required")),
        }
    }
}

impl LoginRequest {
    /// Returns `(email, secret)`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidInput`] when either field is missing or blank.
    pub fn validate(self) -> Result<(String, String), AuthError> {
        match (non_blank(self.email), non_blank(self.password_hash)) {
            (Some(email), Some(secret)) => Ok((email, secret)),
            _ => Err(AuthError::InvalidInput("email and passwordHash are required")),
        }
    }
}

/// Member columns needed for authentication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberRecord {
    pub id: i64,
    pub full_name: String,
    pub email: String,
    pub role: Role,
    pub password_hash: Option<String>,
}

impl MemberRecord {
    #[must_use]
    pub fn token_subject(&self) -> TokenSubject<'_> {
        TokenSubject { member_id: self.id, email: &self.email, full_name: &self.full_name, role: self.role }
    }
}

fn member_from_row(row: &sqlx::postgres::PgRow) -> MemberRecord {
    MemberRecord {
        id: row.get("id"),
        full_name: row.get("full_name"),
        email: row.get("email"),
        role: Role::parse(row.get::<&str, _>("role")),
        password_hash: row.get("password_hash"),
    }
}

/// Look up a member by id.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn find_member(pool: &PgPool, member_id: i64) -> Result<Option<MemberRecord>, sqlx::Error> {
    let row = sqlx::query("SELECT id, full_name, email, role, password_hash FROM member WHERE id = $1")
        .bind(member_id)
        .fetch_optional(pool)
        .await?;
    Ok(row.as_ref().map(member_from_row))
}

/// Look up a member by email, case-insensitively.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn find_member_by_email(pool: &PgPool, email: &str) -> Result<Option<MemberRecord>, sqlx::Error> {
    let row = sqlx::query("SELECT id, full_name, email, role, password_hash FROM member WHERE lower(email) = lower($1)")
        .bind(email.trim())
        .fetch_optional(pool)
        .await?;
    Ok(row.as_ref().map(member_from_row))
}

/// Create a member with the default role.
///
/// # Errors
///
/// Returns [`AuthError::EmailTaken`] when the email is already registered.
pub async fn register(pool: &PgPool, member: NewMember) -> Result<MemberRecord, AuthError> {
    if find_member_by_email(pool, &member.email).await?.is_some() {
        return Err(AuthError::EmailTaken);
    }

    let secret = member.secret.clone();
    let hash = tokio::task::spawn_blocking(move || password::hash_password(&secret))
        .await
        .map_err(|e| AuthError::Worker(e.to_string()))??;

    let row = sqlx::query(
        "INSERT INTO member (full_name, email, phone, city, role, password_hash) \
         VALUES ($1, $2, $3, $4, 'member', $5) \
         RETURNING id, full_name, email, role, password_hash",
    )
    .bind(&member.full_name)
    .bind(&member.email)
    .bind(&member.phone)
    .bind(&member.city)
    .bind(&hash)
    .fetch_one(pool)
    .await
    .map_err(|e| if db::is_unique_violation(&e) { AuthError::EmailTaken } else { AuthError::Database(e) })?;

    Ok(member_from_row(&row))
}

/// Check credentials. Unknown email and wrong password are indistinguishable.
///
/// # Errors
///
/// Returns [`AuthError::InvalidCredentials`] on any mismatch.
pub async fn login(pool: &PgPool, email: &str, secret: &str) -> Result<MemberRecord, AuthError> {
    let member = find_member_by_email(pool, email)
        .await?
        .ok_or(AuthError::InvalidCredentials)?;
    let Some(stored) = member.password_hash.clone() else {
        return Err(AuthError::InvalidCredentials);
    };

    let secret = secret.to_owned();
    let matches = tokio::task::spawn_blocking(move || password::verify_password(&secret, &stored))
        .await
        .map_err(|e| AuthError::Worker(e.to_string()))?;
    if !matches {
        return Err(AuthError::InvalidCredentials);
    }
    Ok(member)
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
