use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use crate::schema::users;

use super::{ModelValidationError, ValidationResult};

#[derive(Debug, Clone, Queryable, Identifiable, Serialize)]
#[diesel(table_name = users)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
}

const USERNAME_CHARS: std::ops::RangeInclusive<usize> = 3..=32;

impl NewUser {
    /// Trims the username and checks the row is fit to insert.
    pub fn validate(&mut self) -> ValidationResult<()> {
        let trimmed = self.username.trim();
        if trimmed.len() != self.username.len() {
            self.username = trimmed.to_string();
        }
        ensure_valid_username(&self.username)?;

        if self.password_hash.is_empty() {
            return Err(ModelValidationError::MissingPasswordHash);
        }
        Ok(())
    }
}

fn is_username_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-')
}

/// Usernames are 3 to 32 characters from `[A-Za-z0-9_-]`.
pub(crate) fn ensure_valid_username(value: &str) -> ValidationResult<()> {
    if USERNAME_CHARS.contains(&value.len()) && value.chars().all(is_username_char) {
        return Ok(());
    }

    tracing::debug!(length = value.chars().count(), "Username has an invalid format");
    Err(ModelValidationError::InvalidUsername)
}
