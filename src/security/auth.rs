use std::{collections::HashSet, sync::OnceLock};

use axum::{
    async_trait,
    extract::{FromRequestParts, Request},
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::{Duration, Utc};
use diesel::prelude::*;
use diesel::result::Error as DieselError;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::user::User;
use crate::schema::users::dsl::users;

const TOKEN_LIFETIME: Duration = Duration::hours(24);
const MIN_SECRET_CHARS: usize = 32;
const MIN_DISTINCT_SECRET_CHARS: usize = 8;

static SIGNING_KEYS: OnceLock<SigningKeys> = OnceLock::new();

/// The account a request was authenticated as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedUser(pub Uuid);

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub iat: u64,
    pub exp: u64,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("authorization header is missing")]
    MissingHeader,
    #[error("authorization header is malformed")]
    MalformedHeader,
    #[error("invalid or expired token")]
    Rejected,
    #[error("authenticated identity not found in request context")]
    MissingIdentity,
    #[error("JWT_SECRET environment variable is not set")]
    MissingSecret,
    #[error("JWT_SECRET must be at least 32 characters with at least 8 distinct ones")]
    WeakSecret,
    #[error("failed to encode authentication token: {0}")]
    Encoding(String),
}

impl IntoResponse for TokenError {
    fn into_response(self) -> Response {
        AppError::from(self).into_response()
    }
}

struct SigningKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl SigningKeys {
    fn from_secret(secret: &str) -> Result<Self, TokenError> {
        let secret = secret.trim();
        let distinct = secret.chars().collect::<HashSet<_>>().len();
        if secret.chars().count() < MIN_SECRET_CHARS || distinct < MIN_DISTINCT_SECRET_CHARS {
            return Err(TokenError::WeakSecret);
        }

        Ok(Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        })
    }

    fn issue(&self, user_id: Uuid) -> Result<String, TokenError> {
        let issued_at = Utc::now();
        let claims = Claims {
            sub: user_id,
            iat: issued_at.timestamp().unsigned_abs(),
            exp: (issued_at + TOKEN_LIFETIME).timestamp().unsigned_abs(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|err| TokenError::Encoding(err.to_string()))
    }

    fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        decode::<Claims>(token, &self.decoding, &Validation::new(Algorithm::HS256))
            .map(|data| data.claims)
            .map_err(|_| TokenError::Rejected)
    }
}

fn signing_keys() -> Result<&'static SigningKeys, TokenError> {
    if let Some(keys) = SIGNING_KEYS.get() {
        return Ok(keys);
    }

    let secret = std::env::var("JWT_SECRET").map_err(|_| TokenError::MissingSecret)?;
    let keys = SigningKeys::from_secret(&secret)?;
    Ok(SIGNING_KEYS.get_or_init(|| keys))
}

/// Loads `JWT_SECRET` so that a missing or weak secret stops startup.
pub fn ensure_configured() -> Result<(), TokenError> {
    signing_keys().map(|_| ())
}

pub fn issue_token(user_id: Uuid) -> Result<String, TokenError> {
    signing_keys()?.issue(user_id)
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, TokenError> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or(TokenError::MissingHeader)?
        .to_str()
        .map_err(|_| TokenError::MalformedHeader)?;

    match value.split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() => {
            Ok(token.trim())
        }
        _ => Err(TokenError::MalformedHeader),
    }
}

/// Middleware for the protected routes: a valid bearer token puts an
/// [`AuthenticatedUser`] into the request extensions.
pub async fn authenticate(mut request: Request, next: Next) -> Result<Response, TokenError> {
    let token = bearer_token(request.headers())?;
    let claims = signing_keys()?.verify(token)?;
    request.extensions_mut().insert(AuthenticatedUser(claims.sub));
    Ok(next.run(request).await)
}

/// Loads the account behind a verified token. A token that outlived its
/// account is treated like any other rejected token.
pub async fn load_account(conn: &mut AsyncPgConnection, user_id: Uuid) -> Result<User, AppError> {
    users
        .find(user_id)
        .first::<User>(conn)
        .await
        .map_err(account_lookup_error)
}

fn account_lookup_error(err: DieselError) -> AppError {
    match err {
        DieselError::NotFound => TokenError::Rejected.into(),
        other => other.into(),
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = TokenError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .copied()
            .ok_or(TokenError::MissingIdentity)
    }
}
