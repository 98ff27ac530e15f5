use axum::{Extension, Router, http::StatusCode, middleware, routing::delete};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use serde::Deserialize;

use crate::db::PgPool;
use crate::errors::AppError;
use crate::logging::{AccountId, SecurityEvent};
use crate::policy::MAX_PASSWORD_CHARS;
use crate::schema::users::dsl::{id as users_id, users};
use crate::security::auth::{AuthenticatedUser, load_account};
use crate::security::json::ValidatedJson;
use crate::security::password::verify_password;
use crate::security::rate_limit::{RateLimiterState, enforce_rate_limit};

pub fn router() -> Router {
    Router::new().route(
        "/account",
        delete(delete_account).layer(middleware::from_fn_with_state(
            RateLimiterState::per_minute(5),
            enforce_rate_limit,
        )),
    )
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeleteAccountRequest {
    #[serde(default)]
    password: String,
}

impl DeleteAccountRequest {
    fn validate(&self) -> Result<(), AppError> {
        if self.password.is_empty() {
            return Err(AppError::Validation(
                "password field cannot be blank".to_string(),
            ));
        }
        if self.password.chars().count() > MAX_PASSWORD_CHARS {
            return Err(AppError::PasswordMismatch);
        }
        Ok(())
    }
}

/// Deletes the caller's account after re-checking their password. Journal
/// entries go with it through the foreign key cascade.
#[tracing::instrument(name = "delete_account", skip(pool, payload), fields(user_id = %AccountId(user_id)))]
pub async fn delete_account(
    Extension(pool): Extension<PgPool>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    ValidatedJson(payload): ValidatedJson<DeleteAccountRequest>,
) -> Result<StatusCode, AppError> {
    payload.validate()?;

    let mut conn = pool
        .get()
        .await
        .map_err(|err| AppError::Pool(err.to_string()))?;

    let user = load_account(&mut conn, user_id).await?;

    if !verify_password(payload.password, user.password_hash.clone()).await? {
        crate::security_event!(
            SecurityEvent::AccountDeletionFailure,
            user_id = %AccountId(user.id),
            reason = "incorrect_password",
            "Account deletion refused"
        );
        return Err(AppError::PasswordMismatch);
    }

    let affected = diesel::delete(users.filter(users_id.eq(user.id)))
        .execute(&mut conn)
        .await?;

    if affected == 0 {
        return Err(AppError::NotFound);
    }

    crate::security_event!(
        SecurityEvent::AccountDeleted,
        user_id = %AccountId(user.id),
        "Account deleted"
    );

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_password_is_rejected() {
        let request = DeleteAccountRequest {
            password: String::new(),
        };
        assert!(matches!(request.validate(), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_overlong_password_cannot_match() {
        let request = DeleteAccountRequest {
            password: "x".repeat(MAX_PASSWORD_CHARS + 1),
        };
        assert!(matches!(request.validate(), Err(AppError::PasswordMismatch)));
    }
}
