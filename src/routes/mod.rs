use axum::{Router, middleware};

use crate::security::auth::authenticate;

pub mod account;
pub mod auth;
pub mod journal;

pub fn create_router() -> Router {
    tracing::debug!("Creating application router");

    let protected = Router::new()
        .merge(journal::router())
        .merge(account::router())
        .route_layer(middleware::from_fn(authenticate));

    Router::new().merge(auth::router()).merge(protected)
}
