//! SQLite connection pool and migration runner.

use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use bookstore_kernel::{settings::DatabaseSettings, Migration};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

const MIGRATIONS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS _migrations (
        module     TEXT NOT NULL,
        id         TEXT NOT NULL,
        applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        PRIMARY KEY (module, id)
    )
"#;

/// Owned handle to the service database.
///
/// Cloning is cheap; all clones share one pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open a pool for the configured URL.
    ///
    /// In-memory databases live as long as their connection, so they get a
    /// single connection that is never recycled.
    pub async fn connect(settings: &DatabaseSettings) -> anyhow::Result<Self> {
        let connect_opts = SqliteConnectOptions::from_str(&settings.url)
            .with_context(|| format!("invalid database url '{}'", settings.url))?
            .create_if_missing(true)
            .foreign_keys(true);

        let mut pool_opts = SqlitePoolOptions::new()
            .acquire_timeout(Duration::from_millis(settings.acquire_timeout_ms));

        pool_opts = if settings.is_in_memory() {
            pool_opts
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            pool_opts.max_connections(settings.max_connections)
        };

        let pool = pool_opts
            .connect_with(connect_opts)
            .await
            .with_context(|| format!("failed to connect to '{}'", settings.url))?;

        tracing::info!(
            target: "bookstore-db",
            url = %settings.url,
            in_memory = settings.is_in_memory(),
            "database pool opened"
        );

        Ok(Self { pool })
    }

    /// Private in-memory database, mostly for tests.
    pub async fn in_memory() -> anyhow::Result<Self> {
        Self::connect(&DatabaseSettings {
            url: DatabaseSettings::IN_MEMORY_URL.to_string(),
            ..DatabaseSettings::default()
        })
        .await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Apply every migration not yet recorded in `_migrations`.
    ///
    /// Each migration runs in its own transaction together with its bookkeeping
    /// row. Returns the number of migrations applied.
    pub async fn run_migrations(&self, migrations: &[(String, Migration)]) -> anyhow::Result<usize> {
        sqlx::query(MIGRATIONS_TABLE)
            .execute(&self.pool)
            .await
            .with_context(|| "failed to create migrations table")?;

        let mut applied = 0;
        for (module, migration) in migrations {
            let already_applied: Option<(String,)> =
                sqlx::query_as("SELECT id FROM _migrations WHERE module = ? AND id = ?")
                    .bind(module)
                    .bind(migration.id)
                    .fetch_optional(&self.pool)
                    .await
                    .with_context(|| "failed to read migrations table")?;

            if already_applied.is_some() {
                tracing::debug!(target: "bookstore-db", %module, id = migration.id, "migration already applied");
                continue;
            }

            let mut tx = self.pool.begin().await?;

            sqlx::raw_sql(migration.up)
                .execute(&mut *tx)
                .await
                .with_context(|| format!("migration '{}/{}' failed", module, migration.id))?;

            sqlx::query("INSERT INTO _migrations (module, id) VALUES (?, ?)")
                .bind(module)
                .bind(migration.id)
                .execute(&mut *tx)
                .await?;

            tx.commit()
                .await
                .with_context(|| format!("failed to commit migration '{}/{}'", module, migration.id))?;

            tracing::info!(target: "bookstore-db", %module, id = migration.id, "migration applied");
            applied += 1;
        }

        Ok(applied)
    }

    /// Close the pool, waiting for checked-out connections to be returned.
    pub async fn close(&self) {
        self.pool.close().await;
        tracing::info!(target: "bookstore-db", "database pool closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn migrations() -> Vec<(String, Migration)> {
        vec![(
            "shelf".to_string(),
            Migration {
                id: "001_init",
                up: "CREATE TABLE shelf (name TEXT PRIMARY KEY); INSERT INTO shelf VALUES ('main');",
            },
        )]
    }

    #[tokio::test]
    async fn migrations_apply_once() {
        let db = Database::in_memory().await.unwrap();

        assert_eq!(db.run_migrations(&migrations()).await.unwrap(), 1);
        assert_eq!(db.run_migrations(&migrations()).await.unwrap(), 0);

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM shelf")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn failed_migration_is_not_recorded() {
        let db = Database::in_memory().await.unwrap();
        let broken = vec![(
            "shelf".to_string(),
            Migration {
                id: "001_broken",
                up: "CREATE TABLE shelf (; ",
            },
        )];

        assert!(db.run_migrations(&broken).await.is_err());

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM _migrations")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn unreachable_database_is_reported() {
        let settings = DatabaseSettings {
            url: "sqlite:///nonexistent/dir/books.db".to_string(),
            ..DatabaseSettings::default()
        };

        assert!(Database::connect(&settings).await.is_err());
    }
}
