use std::time::Duration;

use axum::http::StatusCode;
use axum::{Extension, Json, Router, middleware, response::IntoResponse, routing::post};
use diesel::prelude::*;
use diesel::sql_types::Text;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};

use crate::db::PgPool;
use crate::errors::AppError;
use crate::logging::{AccountId, MaskedUsername, SecurityEvent};
use crate::models::user::{NewUser, User, ensure_valid_username};
use crate::policy::{MAX_PASSWORD_CHARS, PasswordPolicy, validate as password_satisfies};
use crate::schema::users::dsl::{username as users_username, users};
use crate::security::auth::issue_token;
use crate::security::json::ValidatedJson;
use crate::security::password::{hash_password, verify_password};
use crate::security::rate_limit::{RateLimiterState, enforce_rate_limit};

diesel::define_sql_function!(fn lower(x: Text) -> Text);

pub fn router() -> Router {
    Router::new()
        .route(
            "/auth/register",
            post(register).layer(middleware::from_fn_with_state(
                RateLimiterState::new(5, Duration::from_secs(5 * 60)),
                enforce_rate_limit,
            )),
        )
        .route(
            "/auth/login",
            post(login).layer(middleware::from_fn_with_state(
                RateLimiterState::per_minute(10),
                enforce_rate_limit,
            )),
        )
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
    #[serde(default)]
    confirmation: String,
}

fn require_filled(label: &str, value: &str) -> Result<(), AppError> {
    if value.is_empty() {
        return Err(AppError::Validation(format!("{label} field cannot be blank")));
    }
    Ok(())
}

fn ensure_password_length(password: &str) -> Result<(), AppError> {
    if password.chars().count() > MAX_PASSWORD_CHARS {
        return Err(AppError::Validation(format!(
            "password must not exceed {MAX_PASSWORD_CHARS} characters"
        )));
    }
    Ok(())
}

impl RegisterRequest {
    /// Form checks in the order a user would fix them, then the password
    /// policy, then the username format.
    fn validate(&mut self, policy: &PasswordPolicy) -> Result<(), AppError> {
        self.username = self.username.trim().to_string();

        require_filled("username", &self.username)?;
        require_filled("password", &self.password)?;
        require_filled("confirmation password", &self.confirmation)?;
        if self.password != self.confirmation {
            return Err(AppError::Validation(
                "confirmation and password fields must be the same".to_string(),
            ));
        }
        ensure_password_length(&self.password)?;

        enforce_password_policy(&self.password, policy)?;

        ensure_valid_username(&self.username).map_err(|err| AppError::Validation(err.to_string()))
    }
}

/// Rejects with every unmet requirement listed.
pub(crate) fn enforce_password_policy(
    password: &str,
    policy: &PasswordPolicy,
) -> Result<(), AppError> {
    if password_satisfies(password, policy)? {
        return Ok(());
    }

    let verdict = policy.evaluate(password)?;
    let message = verdict
        .explanation()
        .unwrap_or_else(|| "password does not meet the password policy".to_string());

    tracing::debug!(
        unmet = verdict.unmet().len(),
        "Password rejected by policy"
    );

    Err(AppError::WeakPassword(message))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

impl LoginRequest {
    fn validate(&mut self) -> Result<(), AppError> {
        self.username = self.username.trim().to_string();
        require_filled("username", &self.username)?;
        require_filled("password", &self.password)?;
        ensure_password_length(&self.password)
    }
}

#[derive(Debug, Serialize)]
struct AuthResponse {
    token: String,
    user: User,
}

async fn username_in_use(conn: &mut AsyncPgConnection, username: &str) -> Result<bool, AppError> {
    let in_use: bool = diesel::select(diesel::dsl::exists(
        users.filter(lower(users_username).eq(username.to_lowercase())),
    ))
    .get_result(conn)
    .await?;
    Ok(in_use)
}

fn username_taken() -> AppError {
    AppError::Conflict("a user is already registered with that username".to_string())
}

/// Creates an account and signs it in. Usernames are unique ignoring case.
#[tracing::instrument(name = "register", skip_all, fields(username, user_id))]
pub async fn register(
    Extension(pool): Extension<PgPool>,
    Extension(policy): Extension<PasswordPolicy>,
    ValidatedJson(mut payload): ValidatedJson<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let masked = MaskedUsername::new(payload.username.trim());
    let span = tracing::Span::current();
    span.record("username", tracing::field::display(&masked));

    payload.validate(&policy).inspect_err(|err| {
        if let AppError::WeakPassword(reasons) = err {
            crate::security_event!(
                SecurityEvent::PasswordPolicyRejection,
                username = %masked,
                reasons = %reasons,
                "Registration rejected by password policy"
            );
        }
    })?;

    let mut conn = pool
        .get()
        .await
        .map_err(|err| AppError::Pool(err.to_string()))?;

    if username_in_use(&mut conn, &payload.username).await? {
        crate::security_event!(
            SecurityEvent::RegistrationFailure,
            username = %masked,
            reason = "username_taken",
            "Registration refused"
        );
        return Err(username_taken());
    }

    let mut new_user = NewUser {
        username: payload.username,
        password_hash: hash_password(payload.password).await?,
    };
    new_user
        .validate()
        .map_err(|err| AppError::Validation(err.to_string()))?;

    // A concurrent registration can still win the race to the unique index.
    let inserted = diesel::insert_into(users)
        .values(&new_user)
        .get_result::<User>(&mut conn)
        .await
        .map_err(|err| match AppError::from_diesel(err) {
            AppError::Conflict(_) => username_taken(),
            other => other,
        });
    let user = inserted.inspect_err(|err| {
        crate::security_event!(
            SecurityEvent::RegistrationFailure,
            username = %masked,
            error = %err,
            "Registration refused"
        );
    })?;

    span.record("user_id", tracing::field::display(AccountId(user.id)));
    let token = issue_token(user.id)?;

    crate::security_event!(
        SecurityEvent::RegistrationSuccess,
        user_id = %AccountId(user.id),
        username = %masked,
        "Account registered"
    );

    Ok((StatusCode::CREATED, Json(AuthResponse { token, user })))
}

/// Exchanges a username and password for a token. The username must match
/// exactly as registered.
#[tracing::instrument(name = "login", skip_all, fields(username, user_id))]
pub async fn login(
    Extension(pool): Extension<PgPool>,
    ValidatedJson(mut payload): ValidatedJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let masked = MaskedUsername::new(&payload.username);
    let span = tracing::Span::current();
    span.record("username", tracing::field::display(&masked));

    let mut conn = pool
        .get()
        .await
        .map_err(|err| AppError::Pool(err.to_string()))?;

    let found = users
        .filter(users_username.eq(&payload.username))
        .first::<User>(&mut conn)
        .await
        .optional()?;

    let Some(user) = found else {
        crate::security_event!(
            SecurityEvent::LoginFailure,
            username = %masked,
            reason = "unknown_username",
            "Login refused"
        );
        return Err(AppError::InvalidCredentials);
    };
    span.record("user_id", tracing::field::display(AccountId(user.id)));

    let failure = match verify_password(payload.password, user.password_hash.clone()).await {
        Ok(true) => None,
        Ok(false) => Some("incorrect_password"),
        Err(err) => {
            tracing::error!(error = %err, "Stored password hash could not be parsed");
            Some("unusable_password_hash")
        }
    };

    if let Some(reason) = failure {
        crate::security_event!(
            SecurityEvent::LoginFailure,
            user_id = %AccountId(user.id),
            username = %masked,
            reason,
            "Login refused"
        );
        return Err(AppError::InvalidCredentials);
    }

    let token = issue_token(user.id)?;

    crate::security_event!(
        SecurityEvent::LoginSuccess,
        user_id = %AccountId(user.id),
        username = %masked,
        "Login succeeded"
    );

    Ok(Json(AuthResponse { token, user }))
}
