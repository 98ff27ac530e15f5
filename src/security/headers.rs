use std::convert::Infallible;

use axum::{
    extract::Request,
    http::{
        HeaderMap, HeaderValue,
        header::{CACHE_CONTROL, EXPIRES, HeaderName, PRAGMA},
    },
    middleware::Next,
    response::Response,
};

// Journal data is personal; nothing may be served from a cache.
const NO_CACHE: &str = "no-cache, no-store, must-revalidate";

const HARDENING: [(&str, &str); 5] = [
    (
        "content-security-policy",
        "default-src 'none'; frame-ancestors 'none'; base-uri 'none'",
    ),
    ("x-content-type-options", "nosniff"),
    ("x-frame-options", "DENY"),
    ("referrer-policy", "no-referrer"),
    ("permissions-policy", "geolocation=(), microphone=(), camera=()"),
];

/// Response middleware applied to every route, including error responses.
pub async fn set_security_headers(req: Request, next: Next) -> Result<Response, Infallible> {
    let mut response = next.run(req).await;
    apply(response.headers_mut());
    Ok(response)
}

fn apply(headers: &mut HeaderMap) {
    for (name, value) in HARDENING {
        headers.insert(HeaderName::from_static(name), HeaderValue::from_static(value));
    }
    headers.insert(CACHE_CONTROL, HeaderValue::from_static(NO_CACHE));
    headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(EXPIRES, HeaderValue::from_static("0"));
}
