use std::{error::Error as _, time::Duration};

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header::RETRY_AFTER},
    response::{IntoResponse, Response},
};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use serde::Serialize;
use thiserror::Error;

use crate::logging::SecurityEvent;
use crate::models::ModelValidationError;
use crate::policy::PolicyError;
use crate::security::auth::TokenError;

/// Error type returned by every handler and extractor. Client errors carry a
/// message meant for the user; server errors are logged with their source
/// and reported generically in release builds.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation error: {0}")]
    Validation(String),

    /// Carries the policy's explanation verbatim.
    #[error("{0}")]
    WeakPassword(String),

    #[error("invalid JSON payload: {0}")]
    InvalidJson(String),

    #[error("unsupported media type: expected application/json")]
    UnsupportedMediaType,

    #[error("request body too large")]
    PayloadTooLarge,

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("password given does not match the one on file")]
    PasswordMismatch,

    #[error("resource not found")]
    NotFound,

    #[error("resource conflict: {0}")]
    Conflict(String),

    #[error("rate limit exceeded; please try again later")]
    RateLimitExceeded { retry_after: Option<Duration> },

    #[error("database error")]
    Database(#[source] DieselError),

    #[error("connection pool error: {0}")]
    Pool(String),

    #[error("stored record is invalid: {0}")]
    CorruptRecord(#[source] ModelValidationError),

    #[error("failed to hash password: {0}")]
    PasswordHashing(String),

    #[error("password policy is misconfigured")]
    PolicyConfiguration(#[from] PolicyError),

    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl AppError {
    /// Unique violations become [`AppError::Conflict`] and a missing row
    /// becomes [`AppError::NotFound`].
    pub fn from_diesel(error: DieselError) -> Self {
        match error {
            DieselError::NotFound => Self::NotFound,
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => Self::Conflict(
                format!(
                    "duplicate value violates {}",
                    info.constraint_name().unwrap_or("a unique constraint")
                ),
            ),
            DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, _) => {
                Self::Conflict("foreign key constraint violation".to_string())
            }
            other => Self::Database(other),
        }
    }

    pub(crate) fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::WeakPassword(_) | Self::InvalidJson(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::UnsupportedMediaType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Token(
                TokenError::MissingHeader | TokenError::MalformedHeader | TokenError::Rejected,
            )
            | Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::PasswordMismatch => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Pool(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Token(_)
            | Self::Database(_)
            | Self::CorruptRecord(_)
            | Self::PasswordHashing(_)
            | Self::PolicyConfiguration(_)
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn exposes_details(&self) -> bool {
        cfg!(debug_assertions) || self.status_code().is_client_error()
    }

    fn public_message(&self) -> String {
        if self.exposes_details() {
            return self.to_string();
        }

        let message = match self {
            Self::Database(_) | Self::CorruptRecord(_) => "a database error occurred",
            Self::Pool(_) => "service temporarily unavailable",
            Self::Token(_) => "authentication error",
            Self::PolicyConfiguration(_) => "server configuration error",
            Self::PasswordHashing(_) => "password processing error",
            _ => "internal server error",
        };
        message.to_string()
    }

    fn details(&self) -> Option<String> {
        if !self.exposes_details() {
            return None;
        }

        match self {
            Self::Database(err) => Some(format!("database: {err}")),
            Self::CorruptRecord(err) => Some(format!("record: {err}")),
            Self::PolicyConfiguration(err) => Some(err.to_string()),
            _ => None,
        }
    }

    fn security_event(&self) -> Option<SecurityEvent> {
        match self {
            Self::Token(
                TokenError::MissingHeader | TokenError::MalformedHeader | TokenError::Rejected,
            ) => Some(SecurityEvent::UnauthorizedAccess),
            Self::PasswordMismatch => Some(SecurityEvent::ForbiddenAccess),
            _ => None,
        }
    }

    fn log(&self, status: StatusCode) {
        if let Some(event) = self.security_event() {
            crate::security_event!(event, error = %self, status_code = %status, "Access denied");
        } else if status.is_server_error() {
            tracing::error!(
                error = %self,
                status_code = %status,
                source = ?self.source(),
                "Request failed"
            );
        } else {
            tracing::warn!(error = %self, status_code = %status, "Request rejected");
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        self.log(status);

        let body = ErrorBody {
            error: self.public_message(),
            details: self.details(),
        };
        let mut response = (status, Json(body)).into_response();

        if let Self::RateLimitExceeded {
            retry_after: Some(wait),
        } = self
        {
            let seconds = wait.as_secs().max(1);
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(seconds));
        }

        response
    }
}

impl From<DieselError> for AppError {
    fn from(error: DieselError) -> Self {
        Self::from_diesel(error)
    }
}

impl From<argon2::password_hash::Error> for AppError {
    fn from(error: argon2::password_hash::Error) -> Self {
        Self::PasswordHashing(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_error_statuses() {
        assert_eq!(
            AppError::Validation("bad".to_string()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(AppError::PasswordMismatch.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::InvalidCredentials.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::NotFound.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_weak_password_message_is_passed_through() {
        let error = AppError::WeakPassword("password must contain a digit".to_string());
        assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(error.public_message(), "password must contain a digit");
    }

    #[test]
    fn test_policy_misconfiguration_is_server_error() {
        let error = AppError::from(PolicyError::InvalidConfiguration {
            field: "minimum_length",
            reason: "must be at least 1, got 0".to_string(),
        });
        assert_eq!(error.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_token_errors_split_by_cause() {
        assert_eq!(
            AppError::from(TokenError::Rejected).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::from(TokenError::WeakSecret).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AppError::from(TokenError::MissingHeader).to_string(),
            "authorization header is missing"
        );
    }

    #[test]
    fn test_missing_row_is_not_found() {
        assert!(matches!(
            AppError::from(DieselError::NotFound),
            AppError::NotFound
        ));
    }

    #[test]
    fn test_rate_limit_sets_retry_after() {
        let response = AppError::RateLimitExceeded {
            retry_after: Some(Duration::from_millis(300)),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[RETRY_AFTER], "1");
    }

    #[cfg(not(debug_assertions))]
    #[test]
    fn test_internal_errors_hidden_in_release() {
        let error = AppError::Internal("sensitive internal detail".to_string());
        assert!(!error.exposes_details());
        assert_eq!(error.public_message(), "internal server error");
    }

    #[cfg(debug_assertions)]
    #[test]
    fn test_internal_errors_exposed_in_debug() {
        let error = AppError::Database(DieselError::NotFound);
        assert!(error.exposes_details());
        assert_eq!(error.details().as_deref(), Some("database: Record not found"));
    }
}
