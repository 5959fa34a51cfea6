use std::time::Duration;

use sqlx::sqlite::SqlitePoolOptions;

use maitred_core::config::DatabaseConfig;

pub type DbPool = sqlx::SqlitePool;

/// Busy-handler wait, distinct from the pool acquire timeout: a writer holding
/// the database lock gets this long before a statement fails with SQLITE_BUSY.
const BUSY_TIMEOUT_MS: u32 = 5_000;

/// Opens the pool described by the `[database]` config section.
pub async fn connect(config: &DatabaseConfig) -> Result<DbPool, sqlx::Error> {
    connect_with_settings(&config.url, config.max_connections, config.timeout_secs).await
}

/// Lower-level variant for callers (and tests) that size the pool directly.
/// Zero values are raised to one rather than rejected.
pub async fn connect_with_settings(
    database_url: &str,
    max_connections: u32,
    timeout_secs: u64,
) -> Result<DbPool, sqlx::Error> {
    SqlitePoolOptions::new()
        .max_connections(max_connections.max(1))
        .acquire_timeout(Duration::from_secs(timeout_secs.max(1)))
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                // WAL lets cache lookups proceed while an approval decision
                // or cache write is in flight; NORMAL durability is enough
                // for state that can be regenerated or re-decided.
                sqlx::query("PRAGMA foreign_keys = ON").execute(&mut *conn).await?;
                sqlx::query("PRAGMA journal_mode = WAL").execute(&mut *conn).await?;
                sqlx::query("PRAGMA synchronous = NORMAL").execute(&mut *conn).await?;
                sqlx::query(&format!("PRAGMA busy_timeout = {BUSY_TIMEOUT_MS}"))
                    .execute(&mut *conn)
                    .await?;
                Ok(())
            })
        })
        .connect(database_url)
        .await
}

#[cfg(test)]
mod tests {
    use sqlx::Row;

    use maitred_core::config::DatabaseConfig;

    use super::{connect, connect_with_settings};

    #[tokio::test]
    async fn connect_uses_the_database_config_section() {
        let config = DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            timeout_secs: 5,
        };
        let pool = connect(&config).await.expect("connect");

        let row = sqlx::query("PRAGMA foreign_keys").fetch_one(&pool).await.expect("pragma");
        let enabled: i64 = row.get(0);
        assert_eq!(enabled, 1);
    }

    #[tokio::test]
    async fn zero_pool_settings_are_raised_to_one() {
        let pool = connect_with_settings("sqlite::memory:", 0, 0).await.expect("connect");
        sqlx::query("SELECT 1").execute(&pool).await.expect("query");
    }
}
