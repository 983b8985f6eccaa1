//! HTTP error responses.
//!
//! Every service error converts into [`ApiError`], which renders as
//! `{"error": "<message>"}` with a matching status code. Server-side
//! failures are logged here and reach the client only as a generic message.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::db::catalog::CatalogError;
use crate::services::auth::AuthError;
use crate::services::booking::BookingError;
use crate::services::dogs::DogError;
use crate::services::events::ScheduleError;
use crate::services::members::ProfileError;
use crate::services::report::ReportError;
use crate::services::storage::StorageError;
use crate::services::token::TokenError;

const INTERNAL_MESSAGE: &str = "internal server error";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self { status, message: message.into() }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, message)
    }

    /// Log `err` and hide it behind a generic 500.
    pub fn internal(context: &str, err: &dyn std::fmt::Display) -> Self {
        tracing::error!(error = %err, "{context}");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_MESSAGE)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

// =============================================================================
// CONVERSIONS
// =============================================================================

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        let status = if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            StatusCode::PAYLOAD_TOO_LARGE
        } else {
            StatusCode::BAD_REQUEST
        };
        Self::new(status, rejection.body_text())
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        Self::internal("database query failed", &err)
    }
}

impl From<CatalogError> for ApiError {
    fn from(err: CatalogError) -> Self {
        Self::internal("sql catalog lookup failed", &err)
    }
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Sign(_) => Self::internal("token signing failed", &err),
            TokenError::Invalid(_) | TokenError::BadSubject => Self::unauthorized("invalid or expired access token"),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidInput(_) => Self::bad_request(err.to_string()),
            AuthError::EmailTaken => Self::conflict(err.to_string()),
            AuthError::InvalidCredentials => Self::unauthorized(err.to_string()),
            AuthError::Password(_) | AuthError::Worker(_) | AuthError::Database(_) => {
                Self::internal("authentication failed", &err)
            }
        }
    }
}

impl From<ProfileError> for ApiError {
    fn from(err: ProfileError) -> Self {
        match err {
            ProfileError::InvalidInput(_) => Self::bad_request(err.to_string()),
            ProfileError::NotFound => Self::not_found(err.to_string()),
            ProfileError::EmailTaken => Self::conflict(err.to_string()),
            ProfileError::Database(_) => Self::internal("profile update failed", &err),
        }
    }
}

impl From<DogError> for ApiError {
    fn from(err: DogError) -> Self {
        match err {
            DogError::InvalidInput(_) => Self::bad_request(err.to_string()),
            DogError::NotFound => Self::not_found(err.to_string()),
            DogError::Forbidden => Self::forbidden(err.to_string()),
            DogError::ChipTaken => Self::conflict(err.to_string()),
            DogError::Database(_) => Self::internal("dog operation failed", &err),
        }
    }
}

impl From<ScheduleError> for ApiError {
    fn from(err: ScheduleError) -> Self {
        match err {
            ScheduleError::Dog(inner) => inner.into(),
            ScheduleError::InvalidInput(_) | ScheduleError::WrongEventKind(_) => Self::bad_request(err.to_string()),
            ScheduleError::NotFound(_) | ScheduleError::NotRegistered => Self::not_found(err.to_string()),
            ScheduleError::Forbidden(_) => Self::forbidden(err.to_string()),
            ScheduleError::AlreadyRegistered => Self::conflict(err.to_string()),
            ScheduleError::Database(_) => Self::internal("schedule operation failed", &err),
        }
    }
}

impl From<BookingError> for ApiError {
    fn from(err: BookingError) -> Self {
        match err {
            BookingError::InvalidInput(_) => Self::bad_request(err.to_string()),
            BookingError::DogNotFound | BookingError::ServiceTypeNotFound | BookingError::BookingNotFound => {
                Self::not_found(err.to_string())
            }
            BookingError::Forbidden(_) => Self::forbidden(err.to_string()),
            BookingError::AlreadyDone
            | BookingError::AlreadyCanceled
            | BookingError::InvalidTransition { .. }
            | BookingError::Conflict => Self::conflict(err.to_string()),
            BookingError::Database(_) => Self::internal("booking operation failed", &err),
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::TooLarge => Self::new(StatusCode::PAYLOAD_TOO_LARGE, err.to_string()),
            _ if err.is_client_error() => Self::bad_request(err.to_string()),
            _ => Self::internal("image upload failed", &err),
        }
    }
}

impl From<ReportError> for ApiError {
    fn from(err: ReportError) -> Self {
        match err {
            ReportError::NotFound => Self::not_found(err.to_string()),
            _ => Self::internal("report generation failed", &err),
        }
    }
}

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;
