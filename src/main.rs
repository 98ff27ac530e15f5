mod config;
mod db;
mod errors;
mod logging;
mod models;
mod policy;
mod routes;
mod schema;
mod security;

use std::net::SocketAddr;

use axum::{Extension, Router, extract::DefaultBodyLimit, middleware, serve};
use config::AppConfig;
use db::{PgPool, establish_pool};
use policy::PasswordPolicy;
use routes::create_router;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_tracing();

    let config = AppConfig::from_env()?;
    security::auth::ensure_configured()?;

    let policy = config.password_policy;
    let failure_pattern = policy.failure_pattern()?;
    tracing::info!(
        minimum_length = policy.minimum_length,
        require_lowercase = policy.require_lowercase,
        require_uppercase = policy.require_uppercase,
        require_digit = policy.require_digit,
        require_symbol = policy.require_symbol,
        failure_modes = failure_pattern.alternatives().len(),
        failure_pattern = %failure_pattern,
        "Password policy loaded"
    );

    let pool = establish_pool(&config.database_url).await?;

    let app = build_app(pool, policy).into_make_service_with_connect_info::<SocketAddr>();

    let listener = TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "Journely listening");

    serve(listener, app).await?;

    Ok(())
}

fn build_app(pool: PgPool, policy: PasswordPolicy) -> Router {
    create_router()
        .layer(middleware::from_fn(security::headers::set_security_headers))
        .layer(DefaultBodyLimit::max(security::json::MAX_BODY_SIZE_BYTES))
        .layer(Extension(pool))
        .layer(Extension(policy))
}
