pub mod auth;
pub mod headers;
pub mod json;
pub mod password;
pub mod rate_limit;
