use std::time::Duration;

use diesel_async::AsyncPgConnection;
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::pooled_connection::bb8::Pool;

pub type PgPool = Pool<AsyncPgConnection>;

const MAX_CONNECTIONS: u32 = 16;
const MIN_IDLE_CONNECTIONS: u32 = 4;
const CONNECTION_TIMEOUT: Duration = Duration::from_secs(5);

#[tracing::instrument(name = "database_pool_setup", skip(database_url))]
pub async fn establish_pool(database_url: &str) -> anyhow::Result<PgPool> {
    tracing::debug!("Initializing database connection pool");

    let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(database_url);

    let pool = Pool::builder()
        .max_size(MAX_CONNECTIONS)
        .min_idle(Some(MIN_IDLE_CONNECTIONS))
        .connection_timeout(CONNECTION_TIMEOUT)
        .idle_timeout(Some(Duration::from_secs(600)))
        .max_lifetime(Some(Duration::from_secs(3600)))
        .build(manager)
        .await?;

    tracing::info!(
        max_size = MAX_CONNECTIONS,
        min_idle = MIN_IDLE_CONNECTIONS,
        connection_timeout_secs = CONNECTION_TIMEOUT.as_secs(),
        "Database connection pool established"
    );

    Ok(pool)
}

/// A pool that never connects until first use; handlers that fail before
/// touching the database can be exercised without a server.
#[cfg(test)]
pub fn lazy_pool() -> PgPool {
    let manager =
        AsyncDieselConnectionManager::<AsyncPgConnection>::new("postgres://localhost/journely_test");
    Pool::builder().build_unchecked(manager)
}
