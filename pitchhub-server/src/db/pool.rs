//! Postgres pool setup
//!
//! Offer and account writes hold row locks for the length of a transaction,
//! so a request waiting on a pool slot gives up after `ACQUIRE_TIMEOUT`
//! instead of queueing forever behind them.

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Connections when the caller does not choose.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

fn pool_options(max_connections: u32) -> PgPoolOptions {
    PgPoolOptions::new()
        .max_connections(max_connections.max(1))
        .acquire_timeout(ACQUIRE_TIMEOUT)
}

/// Connect with [`DEFAULT_MAX_CONNECTIONS`].
///
/// ```ignore
/// let pool = create_pool("postgres://localhost/pitchhub").await?;
/// ```
pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    create_pool_with_options(database_url, DEFAULT_MAX_CONNECTIONS).await
}

/// Connect and open the first connection now, so a bad URL or a down server
/// fails at startup rather than on the first request.
pub async fn create_pool_with_options(
    database_url: &str,
    max_connections: u32,
) -> Result<PgPool, sqlx::Error> {
    let pool = pool_options(max_connections).connect(database_url).await?;
    tracing::debug!(max_connections = pool.options().get_max_connections(), "Database pool ready");
    Ok(pool)
}

/// Pool that connects on first use. Only the URL is checked here.
pub fn lazy_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    pool_options(DEFAULT_MAX_CONNECTIONS).connect_lazy(database_url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_connections_is_raised_to_one() {
        let options = pool_options(0);
        assert_eq!(options.get_max_connections(), 1);
        assert_eq!(options.get_acquire_timeout(), ACQUIRE_TIMEOUT);
    }

    #[tokio::test]
    async fn lazy_pool_does_not_connect() {
        let pool = lazy_pool("postgres://localhost:1/pitchhub_unused").unwrap();
        assert_eq!(pool.size(), 0);
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn pool_serves_concurrent_transactions() {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL required");
        let pool = create_pool_with_options(&url, 2).await.expect("pool creation failed");

        let (a, b) = tokio::join!(pool.begin(), pool.begin());
        let (mut a, mut b) = (a.unwrap(), b.unwrap());
        let (x,): (i32,) = sqlx::query_as("SELECT 1").fetch_one(&mut *a).await.unwrap();
        let (y,): (i32,) = sqlx::query_as("SELECT 2").fetch_one(&mut *b).await.unwrap();
        assert_eq!((x, y), (1, 2));
    }
}
