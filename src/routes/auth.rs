//! Auth routes: registration, password login and refresh-token rotation.
//!
//! DESIGN
//! ======
//! Access tokens travel in the `Authorization: Bearer` header and are
//! checked by the [`AuthMember`] extractor. The refresh token lives only in
//! the HttpOnly `doghub_refresh_token` cookie; every use rotates it, and it
//! is bound to the user agent that received it.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Json;
use axum::extract::{ConnectInfo, FromRef, FromRequestParts, State};
use axum::http::header::{AUTHORIZATION, USER_AGENT};
use axum::http::request::Parts;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum_extra::extract::WithRejection;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Serialize;
use serde_json::{Value, json};
use time::{Duration, OffsetDateTime};
use tokio::task::JoinHandle;

use super::{JsonBody, catalog_row};
use crate::config::CookieSettings;
use crate::error::{ApiError, ApiResult};
use crate::services::access::Actor;
use crate::services::auth::{self as auth_svc, LoginRequest, MemberRecord, RegisterRequest};
use crate::services::mail::Mailer;
use crate::services::refresh;
use crate::services::token::Claims;
use crate::state::AppState;

pub const REFRESH_COOKIE: &str = "doghub_refresh_token";

// =============================================================================
// EXTRACTORS
// =============================================================================

/// `Authorization: Bearer <token>` value, if present and non-empty.
pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?.trim();
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Member authenticated by a valid access token.
/// Use as a handler parameter to require authentication.
#[derive(Debug, Clone)]
pub struct AuthMember {
    pub claims: Claims,
    pub actor: Actor,
}

impl AuthMember {
    #[must_use]
    pub fn member_id(&self) -> i64 {
        self.actor.member_id
    }
}

impl<S> FromRequestParts<S> for AuthMember
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers).ok_or_else(|| ApiError::unauthorized("missing bearer token"))?;
        let app_state = AppState::from_ref(state);
        let claims = app_state.tokens.verify(token)?;
        let actor = claims.actor()?;
        Ok(Self { claims, actor })
    }
}

/// Client details recorded with each refresh token.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientMeta {
    pub user_agent: Option<String>,
    pub ip: Option<String>,
}

pub(crate) fn client_meta(parts: &Parts) -> ClientMeta {
    let user_agent = parts
        .headers
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned);

    // First hop of X-Forwarded-For wins when the server sits behind a proxy.
    let forwarded = parts
        .headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned);
    let ip = forwarded.or_else(|| {
        parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string())
    });

    ClientMeta { user_agent, ip }
}

impl<S> FromRequestParts<S> for ClientMeta
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(client_meta(parts))
    }
}

// =============================================================================
// COOKIES
// =============================================================================

fn base_cookie(settings: &CookieSettings, value: String) -> Cookie<'static> {
    let mut cookie = Cookie::build((REFRESH_COOKIE, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(settings.secure)
        .build();
    if let Some(domain) = &settings.domain {
        cookie.set_domain(domain.clone());
    }
    cookie
}

pub(crate) fn refresh_cookie(settings: &CookieSettings, token: String, expires_at: OffsetDateTime) -> Cookie<'static> {
    let mut cookie = base_cookie(settings, token);
    cookie.set_expires(expires_at);
    cookie
}

pub(crate) fn cleared_refresh_cookie(settings: &CookieSettings) -> Cookie<'static> {
    let mut cookie = base_cookie(settings, String::new());
    cookie.set_max_age(Duration::ZERO);
    cookie
}

fn refresh_token_from(jar: &CookieJar) -> Option<&str> {
    jar.get(REFRESH_COOKIE)
        .map(Cookie::value)
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

// =============================================================================
// SESSION
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub access_token: String,
    #[serde(with = "time::serde::rfc3339")]
    pub access_token_expires_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub refresh_token_expires_at: OffsetDateTime,
    pub user: Value,
}

/// Public profile row for `member_id` (never includes the password hash).
async fn user_view(state: &AppState, member_id: i64) -> ApiResult<Value> {
    catalog_row(state, "me_profile", member_id, "member not found").await
}

/// Issue an access token and a fresh refresh token for `member`.
async fn start_session(
    state: &AppState,
    member: &MemberRecord,
    meta: &ClientMeta,
    jar: CookieJar,
) -> ApiResult<(CookieJar, Json<SessionResponse>)> {
    let (access_token, access_expires_at) = state.tokens.issue(&member.token_subject())?;
    let (refresh_token, refresh_expires_at) = refresh::issue(
        &state.pool,
        member.id,
        state.config.jwt.refresh_lifetime,
        meta.user_agent.as_deref(),
        meta.ip.as_deref(),
    )
    .await?;
    let user = user_view(state, member.id).await?;

    let jar = jar.add(refresh_cookie(&state.config.cookie, refresh_token, refresh_expires_at));
    Ok((
        jar,
        Json(SessionResponse {
            access_token,
            access_token_expires_at: access_expires_at,
            refresh_token_expires_at: refresh_expires_at,
            user,
        }),
    ))
}

/// 401 that also tells the browser to drop the refresh cookie.
fn reject_session(state: &AppState, jar: CookieJar, message: &str) -> Response {
    let jar = jar.add(cleared_refresh_cookie(&state.config.cookie));
    (jar, ApiError::unauthorized(message)).into_response()
}

/// Send the welcome mail off the request path; failures are only logged.
fn spawn_welcome(mailer: Arc<dyn Mailer>, member: &MemberRecord) -> JoinHandle<()> {
    let (member_id, name, email) = (member.id, member.full_name.clone(), member.email.clone());
    tokio::spawn(async move {
        if let Err(e) = mailer.send_welcome(&name, &email).await {
            tracing::warn!(error = %e, member_id, "welcome email failed");
        }
    })
}

async fn revoke_quietly(state: &AppState, token_id: i64) {
    if let Err(e) = refresh::revoke(&state.pool, token_id).await {
        tracing::warn!(error = %e, token_id, "failed to revoke refresh token");
    }
}

// =============================================================================
// HANDLERS
// =============================================================================

/// `POST /auth/register`: create a member and send the welcome mail.
pub async fn register(
    State(state): State<AppState>,
    WithRejection(Json(body), _): JsonBody<RegisterRequest>,
) -> ApiResult<Json<Value>> {
    let new_member = body.validate()?;
    let member = auth_svc::register(&state.pool, new_member).await?;

    if let Some(mailer) = state.mailer.clone() {
        spawn_welcome(mailer, &member);
    }

    let user = user_view(&state, member.id).await?;
    Ok(Json(json!({ "user": user })))
}

/// `POST /auth/login`: verify the password and start a session.
pub async fn login(
    State(state): State<AppState>,
    meta: ClientMeta,
    jar: CookieJar,
    WithRejection(Json(body), _): JsonBody<LoginRequest>,
) -> ApiResult<(CookieJar, Json<SessionResponse>)> {
    let (email, secret) = body.validate()?;
    let member = auth_svc::login(&state.pool, &email, &secret).await?;
    tracing::info!(member_id = member.id, "member logged in");
    start_session(&state, &member, &meta, jar).await
}

/// `POST /auth/refresh`: trade the refresh cookie for a new token pair.
pub async fn refresh(
    State(state): State<AppState>,
    meta: ClientMeta,
    jar: CookieJar,
) -> Result<(CookieJar, Json<SessionResponse>), Response> {
    let Some(raw) = refresh_token_from(&jar) else {
        return Err(ApiError::unauthorized("refresh token missing").into_response());
    };

    let record = refresh::find_active(&state.pool, raw)
        .await
        .map_err(|e| ApiError::from(e).into_response())?;
    let Some(record) = record else {
        return Err(reject_session(&state, jar, "session expired, please sign in again"));
    };

    if record.user_agent_mismatch(meta.user_agent.as_deref()) {
        tracing::warn!(member_id = record.member_id, "refresh token presented by a different user agent");
        revoke_quietly(&state, record.id).await;
        return Err(reject_session(&state, jar, "device change detected, please sign in again"));
    }

    let member = auth_svc::find_member(&state.pool, record.member_id)
        .await
        .map_err(|e| ApiError::from(e).into_response())?;
    let Some(member) = member else {
        revoke_quietly(&state, record.id).await;
        return Err(reject_session(&state, jar, "member not found"));
    };

    let session = start_session(&state, &member, &meta, jar)
        .await
        .map_err(IntoResponse::into_response)?;
    refresh::revoke(&state.pool, record.id)
        .await
        .map_err(|e| ApiError::from(e).into_response())?;
    Ok(session)
}

/// `POST /auth/logout`: revoke the current refresh token and clear the cookie.
pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> (CookieJar, StatusCode) {
    if let Some(raw) = refresh_token_from(&jar) {
        match refresh::find_active(&state.pool, raw).await {
            Ok(Some(record)) => revoke_quietly(&state, record.id).await,
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "refresh token lookup failed during logout"),
        }
    }
    (jar.add(cleared_refresh_cookie(&state.config.cookie)), StatusCode::NO_CONTENT)
}

/// `POST /auth/logout-all`: revoke every refresh token of the caller.
pub async fn logout_all(
    State(state): State<AppState>,
    auth: AuthMember,
    jar: CookieJar,
) -> ApiResult<(CookieJar, StatusCode)> {
    let revoked = refresh::revoke_for_member(&state.pool, auth.member_id()).await?;
    tracing::info!(member_id = auth.member_id(), revoked, "all sessions revoked");
    Ok((jar.add(cleared_refresh_cookie(&state.config.cookie)), StatusCode::NO_CONTENT))
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
