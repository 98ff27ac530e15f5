pub mod journal;
pub mod user;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelValidationError {
    #[error("username must be 3-32 ASCII characters consisting of letters, digits, underscores, or hyphens")]
    InvalidUsername,
    #[error("please select one of the given moods")]
    InvalidMood,
    #[error("unknown goal {0:?}")]
    UnknownGoal(String),
    #[error("user identifier must be a valid UUID")]
    InvalidUserId,
    #[error("password hash must not be empty")]
    MissingPasswordHash,
}

pub type ValidationResult<T> = Result<T, ModelValidationError>;
