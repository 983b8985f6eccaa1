//! JWT access tokens.
//!
//! Access tokens are short-lived HS256 JWTs carrying the member id (`sub`),
//! e-mail, display name, and role. They are never stored; the refresh token
//! flow in [`super::refresh`] mints new ones.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use super::access::{Actor, Role};
use crate::config::JwtSettings;

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("failed to sign token: {0}")]
    Sign(String),
    #[error("invalid token: {0}")]
    Invalid(String),
    #[error("token subject is not a member id")]
    BadSubject,
}

/// Claims embedded in every access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub iss: String,
    pub aud: String,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
}

impl Claims {
    /// Member id carried in `sub`.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::BadSubject`] when `sub` is not an integer.
    pub fn member_id(&self) -> Result<i64, TokenError> {
        self.sub.parse().map_err(|_| TokenError::BadSubject)
    }

    /// # Errors
    ///
    /// Returns [`TokenError::BadSubject`] when `sub` is not an integer.
    pub fn actor(&self) -> Result<Actor, TokenError> {
        Ok(Actor::new(self.member_id()?, self.role))
    }
}

/// Member fields that go into a token.
#[derive(Debug, Clone)]
pub struct TokenSubject<'a> {
    pub member_id: i64,
    pub email: &'a str,
    pub full_name: &'a str,
    pub role: Role,
}

#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
    lifetime: Duration,
}

impl TokenService {
    #[must_use]
    pub fn new(settings: &JwtSettings) -> Self {
        Self {
            encoding: EncodingKey::from_secret(settings.secret.as_bytes()),
            decoding: DecodingKey::from_secret(settings.secret.as_bytes()),
            issuer: settings.issuer.clone(),
            audience: settings.audience.clone(),
            lifetime: settings.access_lifetime,
        }
    }

    /// Sign an access token valid from now for the configured lifetime.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Sign`] if encoding fails.
    pub fn issue(&self, subject: &TokenSubject<'_>) -> Result<(String, OffsetDateTime), TokenError> {
        self.issue_at(subject, OffsetDateTime::now_utc())
    }

    pub(crate) fn issue_at(
        &self,
        subject: &TokenSubject<'_>,
        now: OffsetDateTime,
    ) -> Result<(String, OffsetDateTime), TokenError> {
        let expires_at = now + self.lifetime;
        let claims = Claims {
            sub: subject.member_id.to_string(),
            email: subject.email.to_owned(),
            name: subject.full_name.to_owned(),
            role: subject.role,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            iat: now.unix_timestamp(),
            nbf: now.unix_timestamp(),
            exp: expires_at.unix_timestamp(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| TokenError::Sign(e.to_string()))?;
        Ok((token, expires_at))
    }

    /// Check signature, issuer, audience, and expiry.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Invalid`] for any failed check.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_audience(&[self.audience.as_str()]);
        validation.validate_nbf = true;

        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| TokenError::Invalid(e.to_string()))
    }
}

#[cfg(test)]
#[path = "token_test.rs"]
mod tests;
