//! SQLite connection pool and module migrations.

use std::str::FromStr;

use anyhow::Context;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use time::OffsetDateTime;

use bookstore_kernel::{settings::DatabaseSettings, InitCtx, Migration, Module};

const MIGRATIONS_TABLE: &str = "
    CREATE TABLE IF NOT EXISTS schema_migrations (
        module     TEXT NOT NULL,
        id         TEXT NOT NULL,
        applied_at TEXT NOT NULL,
        PRIMARY KEY (module, id)
    )
";

/// Handle to the relational store shared by all modules.
#[derive(Clone, Debug)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open a pool for the configured URL, creating the database file if needed.
    pub async fn connect(settings: &DatabaseSettings) -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str(&settings.url)
            .with_context(|| format!("invalid database url '{}'", settings.url))?
            .create_if_missing(true)
            .foreign_keys(true);

        // Every connection to `:memory:` opens a fresh database, so keep exactly
        // one connection alive for the lifetime of the pool.
        let pool_options = if settings.is_in_memory() {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(settings.max_connections.max(1))
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .with_context(|| format!("failed to connect to '{}'", settings.url))?;

        tracing::info!(target: "bookstore-db", url = %settings.url, "database pool ready");
        Ok(Self { pool })
    }

    /// Connect to a private in-memory database.
    pub async fn in_memory() -> anyhow::Result<Self> {
        Self::connect(&DatabaseSettings {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
        })
        .await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Apply every migration not yet recorded in `schema_migrations`.
    ///
    /// Each migration runs in its own transaction together with its bookkeeping
    /// row. Returns how many migrations were applied.
    pub async fn migrate(&self, migrations: &[(String, Migration)]) -> anyhow::Result<usize> {
        sqlx::query(MIGRATIONS_TABLE)
            .execute(&self.pool)
            .await
            .context("failed to create schema_migrations table")?;

        let mut applied = 0;
        for (module, migration) in migrations {
            let already: Option<(String,)> =
                sqlx::query_as("SELECT id FROM schema_migrations WHERE module = ? AND id = ?")
                    .bind(module)
                    .bind(migration.id)
                    .fetch_optional(&self.pool)
                    .await
                    .context("failed to read schema_migrations")?;
            if already.is_some() {
                tracing::debug!(target: "bookstore-db", %module, id = migration.id, "migration already applied");
                continue;
            }

            let mut tx = self.pool.begin().await.context("failed to begin migration")?;
            sqlx::raw_sql(migration.up)
                .execute(&mut *tx)
                .await
                .with_context(|| format!("migration {}/{} failed", module, migration.id))?;
            sqlx::query("INSERT INTO schema_migrations (module, id, applied_at) VALUES (?, ?, ?)")
                .bind(module)
                .bind(migration.id)
                .bind(OffsetDateTime::now_utc().unix_timestamp().to_string())
                .execute(&mut *tx)
                .await
                .context("failed to record migration")?;
            tx.commit().await.context("failed to commit migration")?;

            tracing::info!(target: "bookstore-db", %module, id = migration.id, "migration applied");
            applied += 1;
        }

        Ok(applied)
    }

    /// Round-trip a trivial query to prove the store is reachable.
    pub async fn ping(&self) -> anyhow::Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .context("database ping failed")?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Core module owning the database pool lifecycle.
pub struct DatabaseModule {
    database: Database,
}

impl DatabaseModule {
    pub fn new(database: Database) -> Self {
        Self { database }
    }
}

#[async_trait]
impl Module for DatabaseModule {
    fn name(&self) -> &'static str {
        "db"
    }

    async fn init(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        self.database.ping().await
    }

    async fn stop(&self) -> anyhow::Result<()> {
        self.database.close().await;
        tracing::info!(target: "bookstore-db", "database pool closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn migrations() -> Vec<(String, Migration)> {
        vec![(
            "books".to_string(),
            Migration {
                id: "001_init",
                up: "CREATE TABLE t (a TEXT); INSERT INTO t VALUES ('x');",
            },
        )]
    }

    #[tokio::test]
    async fn migrations_are_applied_once() {
        let db = Database::in_memory().await.unwrap();
        assert_eq!(db.migrate(&migrations()).await.unwrap(), 1);
        assert_eq!(db.migrate(&migrations()).await.unwrap(), 0);

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM t")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn failed_migration_is_not_recorded() {
        let db = Database::in_memory().await.unwrap();
        let broken = vec![(
            "books".to_string(),
            Migration {
                id: "001_broken",
                up: "CREATE TABLE;",
            },
        )];
        assert!(db.migrate(&broken).await.is_err());

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM schema_migrations")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn module_pings_on_init() {
        let db = Database::in_memory().await.unwrap();
        let module = DatabaseModule::new(db);
        let settings = bookstore_kernel::settings::Settings::default();
        module.init(&InitCtx { settings: &settings }).await.unwrap();
        assert_eq!(module.name(), "db");
    }
}
