//! Refresh-token storage and rotation.
//!
//! ARCHITECTURE
//! ============
//! The raw token only ever lives in the client's HttpOnly cookie. The
//! database keeps its SHA-256 digest together with the user agent and IP it
//! was issued to, so a leaked table cannot be replayed.
//!
//! TRADE-OFFS
//! ==========
//! Rotation revokes the presented token and issues a fresh one on every
//! refresh. Revoked rows are kept (not deleted) so `logout-all` and audits
//! can still see them.

use std::fmt::Write;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::Rng;
use sha2::{Digest, Sha256};
use sqlx::{PgPool, Row};
use time::{Duration, OffsetDateTime};

/// Random bytes per refresh token.
pub const TOKEN_BYTES: usize = 48;

pub(crate) fn bytes_to_hex(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(s, "{b:02x}");
    }
    s
}

/// Generate an opaque refresh token (base64url, no padding).
#[must_use]
pub fn generate_token() -> String {
    let bytes: [u8; TOKEN_BYTES] = rand::rng().random();
    URL_SAFE_NO_PAD.encode(bytes)
}

/// SHA-256 digest of a token, lowercase hex.
#[must_use]
pub fn hash_token(token: &str) -> String {
    bytes_to_hex(&Sha256::digest(token.as_bytes()))
}

/// Active refresh-token row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshTokenRecord {
    pub id: i64,
    pub member_id: i64,
    pub user_agent: Option<String>,
    pub expires_at: OffsetDateTime,
}

impl RefreshTokenRecord {
    /// A token is bound to the client that received it. Only a mismatch
    /// between two known user agents counts.
    #[must_use]
    pub fn user_agent_mismatch(&self, presented: Option<&str>) -> bool {
        match (self.user_agent.as_deref().map(str::trim), presented.map(str::trim)) {
            (Some(stored), Some(current)) if !stored.is_empty() && !current.is_empty() => stored != current,
            _ => false,
        }
    }
}

/// Issue and persist a refresh token, returning the raw value and its expiry.
///
/// # Errors
///
/// Returns a database error if the insert fails.
pub async fn issue(
    pool: &PgPool,
    member_id: i64,
    lifetime: Duration,
    user_agent: Option<&str>,
    ip_address: Option<&str>,
) -> Result<(String, OffsetDateTime), sqlx::Error> {
    let token = generate_token();
    let expires_at = OffsetDateTime::now_utc() + lifetime;
    sqlx::query(
        "INSERT INTO refresh_token (member_id, token_hash, user_agent, ip_address, expires_at) \
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(member_id)
    .bind(hash_token(&token))
    .bind(user_agent)
    .bind(ip_address)
    .bind(expires_at)
    .execute(pool)
    .await?;
    Ok((token, expires_at))
}

/// Look up a token that is neither revoked nor expired.
///
/// # Errors
///
/// Returns a database error if the lookup fails.
pub async fn find_active(pool: &PgPool, token: &str) -> Result<Option<RefreshTokenRecord>, sqlx::Error> {
    if token.trim().is_empty() {
        return Ok(None);
    }

    let row = sqlx::query(
        "SELECT id, member_id, user_agent, expires_at FROM refresh_token \
         WHERE token_hash = $1 AND revoked_at IS NULL AND expires_at > now()",
    )
    .bind(hash_token(token))
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| RefreshTokenRecord {
        id: r.get("id"),
        member_id: r.get("member_id"),
        user_agent: r.get("user_agent"),
        expires_at: r.get("expires_at"),
    }))
}

/// Revoke one token. Already revoked rows keep their original timestamp.
///
/// # Errors
///
/// Returns a database error if the update fails.
pub async fn revoke(pool: &PgPool, id: i64) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE refresh_token SET revoked_at = now() WHERE id = $1 AND revoked_at IS NULL")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Revoke every live token of a member, returning how many were revoked.
///
/// # Errors
///
/// Returns a database error if the update fails.
pub async fn revoke_for_member(pool: &PgPool, member_id: i64) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("UPDATE refresh_token SET revoked_at = now() WHERE member_id = $1 AND revoked_at IS NULL")
        .bind(member_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
#[path = "refresh_test.rs"]
mod tests;
