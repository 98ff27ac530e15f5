//! Password composition policy.
//!
//! A [`PasswordPolicy`] names a minimum length and the character classes a
//! password must contain. [`validate`] gives the accept/reject verdict by
//! testing the password against the policy's [`FailurePattern`];
//! [`PasswordPolicy::evaluate`] checks each requirement on its own and
//! reports every one that is unmet.

pub mod pattern;

use std::fmt;

use thiserror::Error;

pub use pattern::FailurePattern;

/// Longest password the service accepts, in characters.
pub const MAX_PASSWORD_CHARS: usize = 256;

/// The only characters that satisfy the symbol requirement.
pub const SYMBOLS: [char; 8] = ['!', '@', '#', '$', '%', '^', '&', '*'];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    #[error("invalid password policy configuration: {field} {reason}")]
    InvalidConfiguration { field: &'static str, reason: String },
}

impl PolicyError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        PolicyError::InvalidConfiguration {
            field,
            reason: reason.into(),
        }
    }
}

/// A category of character a policy may require.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CharacterClass {
    Lowercase,
    Uppercase,
    Digit,
    Symbol,
}

impl CharacterClass {
    pub const ALL: [CharacterClass; 4] = [
        CharacterClass::Lowercase,
        CharacterClass::Uppercase,
        CharacterClass::Digit,
        CharacterClass::Symbol,
    ];

    pub fn contains(self, c: char) -> bool {
        match self {
            CharacterClass::Lowercase => c.is_ascii_lowercase(),
            CharacterClass::Uppercase => c.is_ascii_uppercase(),
            CharacterClass::Digit => c.is_ascii_digit(),
            CharacterClass::Symbol => SYMBOLS.contains(&c),
        }
    }

    pub fn present_in(self, password: &str) -> bool {
        password.chars().any(|c| self.contains(c))
    }

    fn description(self) -> &'static str {
        match self {
            CharacterClass::Lowercase => "a lowercase letter",
            CharacterClass::Uppercase => "an uppercase letter",
            CharacterClass::Digit => "a digit",
            CharacterClass::Symbol => "one of the symbols !@#$%^&*",
        }
    }
}

/// A single condition a password has to meet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Requirement {
    MinimumLength(usize),
    Contains(CharacterClass),
}

impl Requirement {
    pub fn is_met_by(&self, password: &str) -> bool {
        match *self {
            Requirement::MinimumLength(min) => password.chars().count() >= min,
            Requirement::Contains(class) => class.present_in(password),
        }
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Requirement::MinimumLength(1) => write!(f, "at least 1 character"),
            Requirement::MinimumLength(min) => write!(f, "at least {min} characters"),
            Requirement::Contains(class) => write!(f, "{}", class.description()),
        }
    }
}

/// Composition requirements for new passwords.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordPolicy {
    pub minimum_length: usize,
    pub require_lowercase: bool,
    pub require_uppercase: bool,
    pub require_digit: bool,
    pub require_symbol: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            minimum_length: 8,
            require_lowercase: true,
            require_uppercase: true,
            require_digit: true,
            require_symbol: true,
        }
    }
}

impl PasswordPolicy {
    /// A policy that only enforces a minimum length.
    pub fn length_only(minimum_length: usize) -> Self {
        Self {
            minimum_length,
            require_lowercase: false,
            require_uppercase: false,
            require_digit: false,
            require_symbol: false,
        }
    }

    pub fn ensure_valid(&self) -> Result<(), PolicyError> {
        if self.minimum_length < 1 {
            return Err(PolicyError::invalid(
                "minimum_length",
                format!("must be at least 1, got {}", self.minimum_length),
            ));
        }
        Ok(())
    }

    pub fn requires(&self, class: CharacterClass) -> bool {
        match class {
            CharacterClass::Lowercase => self.require_lowercase,
            CharacterClass::Uppercase => self.require_uppercase,
            CharacterClass::Digit => self.require_digit,
            CharacterClass::Symbol => self.require_symbol,
        }
    }

    pub fn required_classes(&self) -> impl Iterator<Item = CharacterClass> + '_ {
        CharacterClass::ALL
            .into_iter()
            .filter(move |class| self.requires(*class))
    }

    /// Every requirement this policy enforces, length first.
    pub fn requirements(&self) -> Vec<Requirement> {
        std::iter::once(Requirement::MinimumLength(self.minimum_length))
            .chain(self.required_classes().map(Requirement::Contains))
            .collect()
    }

    /// Checks each requirement independently and collects the unmet ones.
    pub fn evaluate(&self, password: &str) -> Result<Verdict, PolicyError> {
        self.ensure_valid()?;

        let unmet = self
            .requirements()
            .into_iter()
            .filter(|requirement| !requirement.is_met_by(password))
            .collect();

        Ok(Verdict { unmet })
    }

    pub fn failure_pattern(&self) -> Result<FailurePattern, PolicyError> {
        FailurePattern::compile(self)
    }
}

/// Outcome of evaluating a password against a policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    unmet: Vec<Requirement>,
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        self.unmet.is_empty()
    }

    pub fn unmet(&self) -> &[Requirement] {
        &self.unmet
    }

    /// Human readable summary of what is missing, `None` when accepted.
    pub fn explanation(&self) -> Option<String> {
        if self.is_accepted() {
            return None;
        }
        let missing = self
            .unmet
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        Some(format!("password must contain {missing}"))
    }
}

/// Returns whether `password` satisfies `policy`.
///
/// A misconfigured policy is an error for every input, including the empty
/// password. An empty password is otherwise always rejected.
pub fn validate(password: &str, policy: &PasswordPolicy) -> Result<bool, PolicyError> {
    let pattern = FailurePattern::compile(policy)?;

    if password.is_empty() {
        return Ok(false);
    }

    Ok(!pattern.matches(password))
}
