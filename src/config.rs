use std::net::SocketAddr;

use dotenvy::dotenv;
use thiserror::Error;

use crate::policy::{MAX_PASSWORD_CHARS, PasswordPolicy, PolicyError};

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{key} has an invalid value: {value:?}")]
    Invalid { key: &'static str, value: String },

    #[error(transparent)]
    Policy(#[from] PolicyError),
}

/// Runtime settings read once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub database_url: String,
    pub password_policy: PasswordPolicy,
}

impl AppConfig {
    /// Loads `.env` (if present) and reads settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .filter(|value| !value.trim().is_empty())
            .ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let raw_addr = lookup("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = raw_addr.trim().parse().map_err(|_| ConfigError::Invalid {
            key: "BIND_ADDR",
            value: raw_addr.clone(),
        })?;

        let password_policy = policy_from_lookup(&lookup)?;

        Ok(Self {
            bind_addr,
            database_url,
            password_policy,
        })
    }
}

fn policy_from_lookup<F>(lookup: &F) -> Result<PasswordPolicy, PolicyError>
where
    F: Fn(&str) -> Option<String>,
{
    let defaults = PasswordPolicy::default();

    let minimum_length = match lookup("PASSWORD_MIN_LENGTH") {
        Some(raw) => raw.trim().parse::<usize>().map_err(|_| {
            PolicyError::invalid(
                "minimum_length",
                format!("must be a positive integer, got {raw:?}"),
            )
        })?,
        None => defaults.minimum_length,
    };
    if minimum_length > MAX_PASSWORD_CHARS {
        return Err(PolicyError::invalid(
            "minimum_length",
            format!("must not exceed {MAX_PASSWORD_CHARS}, got {minimum_length}"),
        ));
    }

    let flag = |key: &str, field: &'static str, default: bool| match lookup(key) {
        Some(raw) => parse_flag(field, &raw),
        None => Ok(default),
    };

    let policy = PasswordPolicy {
        minimum_length,
        require_lowercase: flag(
            "PASSWORD_REQUIRE_LOWERCASE",
            "require_lowercase",
            defaults.require_lowercase,
        )?,
        require_uppercase: flag(
            "PASSWORD_REQUIRE_UPPERCASE",
            "require_uppercase",
            defaults.require_uppercase,
        )?,
        require_digit: flag(
            "PASSWORD_REQUIRE_DIGIT",
            "require_digit",
            defaults.require_digit,
        )?,
        require_symbol: flag(
            "PASSWORD_REQUIRE_SYMBOL",
            "require_symbol",
            defaults.require_symbol,
        )?,
    };

    policy.ensure_valid()?;
    Ok(policy)
}

/// Only `true` and `false` are accepted; anything else is a caller bug.
pub(crate) fn parse_flag(field: &'static str, raw: &str) -> Result<bool, PolicyError> {
    let value = raw.trim();
    if value.eq_ignore_ascii_case("true") {
        Ok(true)
    } else if value.eq_ignore_ascii_case("false") {
        Ok(false)
    } else {
        Err(PolicyError::invalid(
            field,
            format!("must be a boolean, got {raw:?}"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_apply() {
        let config = load(&[("DATABASE_URL", "postgres://localhost/journely")]).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:3000".parse().unwrap());
        assert_eq!(config.password_policy, PasswordPolicy::default());
    }

    #[test]
    fn test_missing_database_url() {
        assert!(matches!(
            load(&[]),
            Err(ConfigError::Missing("DATABASE_URL"))
        ));
    }

    #[test]
    fn test_policy_overrides() {
        let config = load(&[
            ("DATABASE_URL", "postgres://localhost/journely"),
            ("PASSWORD_MIN_LENGTH", "12"),
            ("PASSWORD_REQUIRE_SYMBOL", "FALSE"),
            ("PASSWORD_REQUIRE_DIGIT", " false "),
        ])
        .unwrap();
        assert_eq!(
            config.password_policy,
            PasswordPolicy {
                minimum_length: 12,
                require_lowercase: true,
                require_uppercase: true,
                require_digit: false,
                require_symbol: false,
            }
        );
    }

    #[test]
    fn test_non_boolean_flag_is_configuration_error() {
        let err = load(&[
            ("DATABASE_URL", "postgres://localhost/journely"),
            ("PASSWORD_REQUIRE_UPPERCASE", "yes"),
        ])
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Policy(PolicyError::InvalidConfiguration {
                field: "require_uppercase",
                ..
            })
        ));
    }

    #[test]
    fn test_zero_minimum_length_is_configuration_error() {
        let err = load(&[
            ("DATABASE_URL", "postgres://localhost/journely"),
            ("PASSWORD_MIN_LENGTH", "0"),
        ])
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Policy(PolicyError::InvalidConfiguration {
                field: "minimum_length",
                ..
            })
        ));
    }

    #[test]
    fn test_minimum_length_above_password_cap_is_configuration_error() {
        let err = load(&[
            ("DATABASE_URL", "postgres://localhost/journely"),
            ("PASSWORD_MIN_LENGTH", "257"),
        ])
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Policy(PolicyError::InvalidConfiguration {
                field: "minimum_length",
                ..
            })
        ));

        let config = load(&[
            ("DATABASE_URL", "postgres://localhost/journely"),
            ("PASSWORD_MIN_LENGTH", "256"),
        ])
        .unwrap();
        assert_eq!(config.password_policy.minimum_length, MAX_PASSWORD_CHARS);
    }

    #[test]
    fn test_negative_minimum_length_is_configuration_error() {
        let err = load(&[
            ("DATABASE_URL", "postgres://localhost/journely"),
            ("PASSWORD_MIN_LENGTH", "-3"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::Policy(_)));
    }

    #[test]
    fn test_invalid_bind_addr() {
        let err = load(&[
            ("DATABASE_URL", "postgres://localhost/journely"),
            ("BIND_ADDR", "not-an-addr"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "BIND_ADDR", .. }));
    }

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("require_digit", "True"), Ok(true));
        assert_eq!(parse_flag("require_digit", "false"), Ok(false));
        assert!(parse_flag("require_digit", "1").is_err());
        assert!(parse_flag("require_digit", "").is_err());
    }
}
