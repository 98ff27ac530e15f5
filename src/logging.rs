use std::{fmt, net::IpAddr};

use tracing_subscriber::EnvFilter;
use uuid::Uuid;

const DEFAULT_DIRECTIVES: &str = "info,journely=debug";

/// Installs the global fmt subscriber. `RUST_LOG` overrides the default
/// directives when it parses.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Username as it may appear in logs: the first character followed by a
/// fixed mask, so neither the rest of the name nor its length leaks.
#[derive(Debug, Clone)]
pub struct MaskedUsername(String);

impl MaskedUsername {
    pub fn new(username: impl AsRef<str>) -> Self {
        let masked = match username.as_ref().chars().next() {
            Some(first) => format!("{first}****"),
            None => "<empty>".to_string(),
        };
        Self(masked)
    }
}

impl fmt::Display for MaskedUsername {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Account id field for spans and security events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountId(pub Uuid);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0.as_hyphenated(), f)
    }
}

/// Client address reduced to its network: the host octet of an IPv4 address,
/// and everything past the /64 prefix of an IPv6 address, are dropped.
#[derive(Debug, Clone, Copy)]
pub struct MaskedIp(pub IpAddr);

impl fmt::Display for MaskedIp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            IpAddr::V4(addr) => {
                let [a, b, c, _] = addr.octets();
                write!(f, "{a}.{b}.{c}.x")
            }
            IpAddr::V6(addr) => {
                let [a, b, c, d, ..] = addr.segments();
                write!(f, "{a:x}:{b:x}:{c:x}:{d:x}::/64")
            }
        }
    }
}

/// Account and access events that are logged under `event_type = "security"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityEvent {
    LoginSuccess,
    LoginFailure,
    RegistrationSuccess,
    RegistrationFailure,
    PasswordPolicyRejection,
    AccountDeleted,
    AccountDeletionFailure,
    UnauthorizedAccess,
    ForbiddenAccess,
    RateLimitExceeded,
}

impl SecurityEvent {
    pub fn name(self) -> &'static str {
        match self {
            Self::LoginSuccess => "login_success",
            Self::LoginFailure => "login_failure",
            Self::RegistrationSuccess => "registration_success",
            Self::RegistrationFailure => "registration_failure",
            Self::PasswordPolicyRejection => "password_policy_rejection",
            Self::AccountDeleted => "account_deleted",
            Self::AccountDeletionFailure => "account_deletion_failure",
            Self::UnauthorizedAccess => "unauthorized_access",
            Self::ForbiddenAccess => "forbidden_access",
            Self::RateLimitExceeded => "rate_limit_exceeded",
        }
    }

    /// Events worth a `WARN`: repeated occurrences point at guessing or abuse.
    pub fn is_alert(self) -> bool {
        matches!(
            self,
            Self::LoginFailure
                | Self::AccountDeletionFailure
                | Self::UnauthorizedAccess
                | Self::ForbiddenAccess
                | Self::RateLimitExceeded
        )
    }
}

impl fmt::Display for SecurityEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Emits a security event at `WARN` for alerts and `INFO` otherwise. Fields
/// follow the usual `tracing` field syntax and end with the message.
#[macro_export]
macro_rules! security_event {
    ($event:expr, $($rest:tt)*) => {{
        let event: $crate::logging::SecurityEvent = $event;
        if event.is_alert() {
            tracing::warn!(event_type = "security", security_event = event.name(), $($rest)*);
        } else {
            tracing::info!(event_type = "security", security_event = event.name(), $($rest)*);
        }
    }};
}
