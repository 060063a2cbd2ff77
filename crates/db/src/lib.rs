//! SQLite connection factory and migration runner.

use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};

use bookstore_kernel::settings::DatabaseSettings;
use bookstore_kernel::Migration;

const MIGRATIONS_TABLE: &str = "_bookstore_migrations";

/// Open a connection pool for the configured SQLite database.
pub async fn connect(settings: &DatabaseSettings) -> anyhow::Result<SqlitePool> {
    if is_in_memory(&settings.url) {
        tracing::info!(target: "bookstore-db", "using private in-memory database");
        return connect_in_memory().await;
    }

    tracing::info!(
        target: "bookstore-db",
        url = %settings.url,
        max_connections = settings.max_connections,
        "connecting to database"
    );

    let options = SqliteConnectOptions::from_str(&settings.url)
        .with_context(|| format!("invalid database url '{}'", settings.url))?
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(settings.max_connections)
        .acquire_timeout(Duration::from_secs(3))
        .connect_with(options)
        .await
        .context("failed to connect to database")?;

    sqlx::query("SELECT 1")
        .execute(&pool)
        .await
        .context("database did not answer health query")?;

    Ok(pool)
}

fn is_in_memory(url: &str) -> bool {
    url.contains(":memory:") || url.contains("mode=memory")
}

/// Open a private in-memory database.
///
/// Every SQLite `:memory:` connection is its own database, so the pool is
/// pinned to a single connection that never expires.
pub async fn connect_in_memory() -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .context("invalid in-memory database url")?;

    SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
        .context("failed to open in-memory database")
}

/// Apply every migration that has not been recorded yet.
///
/// Returns the number of migrations applied in this call.
pub async fn run_migrations(
    pool: &SqlitePool,
    migrations: &[(String, Migration)],
) -> anyhow::Result<usize> {
    sqlx::query(&format!(
        "CREATE TABLE IF NOT EXISTS {MIGRATIONS_TABLE} (
            module TEXT NOT NULL,
            id TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            PRIMARY KEY (module, id)
        )"
    ))
    .execute(pool)
    .await
    .context("failed to create migrations table")?;

    let applied: Vec<(String, String)> =
        sqlx::query(&format!("SELECT module, id FROM {MIGRATIONS_TABLE}"))
            .fetch_all(pool)
            .await
            .context("failed to read applied migrations")?
            .into_iter()
            .map(|row| (row.get("module"), row.get("id")))
            .collect();

    let mut count = 0;
    for (module, migration) in migrations {
        if applied
            .iter()
            .any(|(m, id)| m == module && id == migration.id)
        {
            tracing::debug!(target: "bookstore-db", module = %module, id = migration.id, "migration already applied");
            continue;
        }

        tracing::info!(target: "bookstore-db", module = %module, id = migration.id, "applying migration");

        let mut tx = pool.begin().await.context("failed to open transaction")?;

        sqlx::raw_sql(migration.up)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("migration '{}/{}' failed", module, migration.id))?;

        sqlx::query(&format!(
            "INSERT INTO {MIGRATIONS_TABLE} (module, id) VALUES (?, ?)"
        ))
        .bind(module)
        .bind(migration.id)
        .execute(&mut *tx)
        .await
        .context("failed to record migration")?;

        tx.commit().await.context("failed to commit migration")?;
        count += 1;
    }

    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn migrations() -> Vec<(String, Migration)> {
        vec![(
            "books".to_string(),
            Migration {
                id: "001_init",
                up: "CREATE TABLE shelf (id INTEGER PRIMARY KEY, label TEXT NOT NULL);",
            },
        )]
    }

    #[tokio::test]
    async fn migrations_are_applied_once() {
        let pool = connect_in_memory().await.unwrap();

        assert_eq!(run_migrations(&pool, &migrations()).await.unwrap(), 1);
        assert_eq!(run_migrations(&pool, &migrations()).await.unwrap(), 0);

        sqlx::query("INSERT INTO shelf (label) VALUES ('fiction')")
            .execute(&pool)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn failing_migration_is_not_recorded() {
        let pool = connect_in_memory().await.unwrap();
        let broken = vec![(
            "books".to_string(),
            Migration {
                id: "001_broken",
                up: "CREATE TABLE (",
            },
        )];

        let err = run_migrations(&pool, &broken).await.unwrap_err();
        assert!(err.to_string().contains("books/001_broken"));

        let recorded: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM {MIGRATIONS_TABLE}"
        ))
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(recorded, 0);
    }

    #[test]
    fn memory_urls_are_detected() {
        assert!(is_in_memory("sqlite::memory:"));
        assert!(is_in_memory("sqlite://books?mode=memory"));
        assert!(!is_in_memory("sqlite://bookstore.db?mode=rwc"));
    }

    #[tokio::test]
    async fn connect_accepts_memory_url() {
        let settings = DatabaseSettings {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            ..DatabaseSettings::default()
        };
        let pool = connect(&settings).await.unwrap();
        let one: i64 = sqlx::query_scalar("SELECT 1").fetch_one(&pool).await.unwrap();
        assert_eq!(one, 1);
    }
}
