use std::time::Duration;

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqliteConnection;

use tally_core::config::DatabaseConfig;

pub type DbPool = sqlx::SqlitePool;

/// Open a pool sized and timed per the validated application config.
pub async fn connect(database: &DatabaseConfig) -> Result<DbPool, sqlx::Error> {
    connect_with_settings(&database.url, database.max_connections, database.timeout_secs).await
}

/// Open a pool with explicit settings. Tests use this directly with an
/// in-memory database and a single connection.
pub async fn connect_with_settings(
    database_url: &str,
    max_connections: u32,
    timeout_secs: u64,
) -> Result<DbPool, sqlx::Error> {
    SqlitePoolOptions::new()
        .max_connections(max_connections.max(1))
        .acquire_timeout(Duration::from_secs(timeout_secs.max(1)))
        .after_connect(|conn, _meta| Box::pin(apply_session_pragmas(conn)))
        .connect(database_url)
        .await
}

/// Concurrent carts share one SQLite file: WAL keeps readers going during
/// writes, enforced foreign keys protect the restriction and ledger tables,
/// and the busy timeout queues parallel checkout writes instead of failing
/// them.
async fn apply_session_pragmas(conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query("PRAGMA foreign_keys = ON").execute(&mut *conn).await?;
    sqlx::query("PRAGMA journal_mode = WAL").execute(&mut *conn).await?;
    sqlx::query("PRAGMA busy_timeout = 5000").execute(&mut *conn).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use tally_core::config::DatabaseConfig;

    use super::connect;

    #[tokio::test]
    async fn config_driven_pool_enforces_foreign_keys() {
        let database = DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            timeout_secs: 30,
        };
        let pool = connect(&database).await.expect("connect");

        let foreign_keys: i64 =
            sqlx::query_scalar("PRAGMA foreign_keys").fetch_one(&pool).await.expect("pragma");
        assert_eq!(foreign_keys, 1);
    }
}
