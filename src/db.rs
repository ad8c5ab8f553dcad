//! SQLite persistence for the compiled cache and the batch cursor.

use futures_core::future::BoxFuture;
use sqlx::{
    error::BoxDynError,
    migrate::{MigrateDatabase, Migration as SqlxMigration, MigrationSource, MigrationType, Migrator},
    sqlite::{Sqlite, SqliteConnectOptions, SqliteRow},
    ConnectOptions, FromRow, Pool, Row,
};
use std::{path::PathBuf, result::Result, str::FromStr};

use crate::{
    batch::{BatchProgress, BatchStatus, ProgressStore},
    blocks::ContentId,
    cache::{CacheStore, StoredEntry},
    error::PressNativeError,
};

pub const PRESSNATIVE_CACHE_DB: &str = "pressnative_cache.db";

#[derive(Debug, Clone)]
pub struct DbConnection(pub Pool<Sqlite>);

impl DbConnection {
    pub async fn open(db_path: PathBuf) -> Result<Self, PressNativeError> {
        Ok(DbConnection(db_init(db_path).await?))
    }

    pub async fn entry_count(&self) -> Result<usize, PressNativeError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM compiled_content")
            .fetch_one(&self.0)
            .await?;
        Ok(count as usize)
    }
}

fn entry_from_row((content_id, payload, compiled_at): (i64, String, i64)) -> StoredEntry {
    StoredEntry {
        content_id,
        payload,
        compiled_at,
    }
}

impl CacheStore for DbConnection {
    async fn load(&self, content_id: ContentId) -> Result<Option<StoredEntry>, PressNativeError> {
        let row = sqlx::query_as::<_, (i64, String, i64)>(
            "SELECT content_id, blocks, compiled_at FROM compiled_content WHERE content_id = ?",
        )
        .bind(content_id)
        .fetch_optional(&self.0)
        .await?;
        Ok(row.map(entry_from_row))
    }

    async fn store(&self, entry: StoredEntry) -> Result<(), PressNativeError> {
        sqlx::query(
            "INSERT OR REPLACE INTO compiled_content (content_id, blocks, compiled_at) \
             VALUES (?, ?, ?)",
        )
        .bind(entry.content_id)
        .bind(entry.payload)
        .bind(entry.compiled_at)
        .execute(&self.0)
        .await?;
        Ok(())
    }

    async fn remove(&self, content_id: ContentId) -> Result<bool, PressNativeError> {
        let result = sqlx::query("DELETE FROM compiled_content WHERE content_id = ?")
            .bind(content_id)
            .execute(&self.0)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn scan(&self, needle: &str) -> Result<Vec<StoredEntry>, PressNativeError> {
        let rows = sqlx::query_as::<_, (i64, String, i64)>(
            "SELECT content_id, blocks, compiled_at FROM compiled_content \
             WHERE instr(blocks, ?) > 0 ORDER BY content_id",
        )
        .bind(needle)
        .fetch_all(&self.0)
        .await
        .map_err(|e| {
            tracing::error!(
                "[DbConnection.scan] SQL error scanning for '{}'\n\terror: {}",
                needle,
                e
            );
            e
        })?;
        Ok(rows.into_iter().map(entry_from_row).collect())
    }

    async fn content_ids(&self) -> Result<Vec<ContentId>, PressNativeError> {
        Ok(
            sqlx::query_scalar("SELECT content_id FROM compiled_content ORDER BY content_id")
                .fetch_all(&self.0)
                .await?,
        )
    }
}

impl FromRow<'_, SqliteRow> for BatchProgress {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        let status: String = row.try_get("status")?;
        let status =
            BatchStatus::from_str(&status).map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
        let count = |column: &str| -> Result<usize, sqlx::Error> {
            Ok(row.try_get::<i64, _>(column)?.max(0) as usize)
        };
        Ok(BatchProgress {
            status,
            total: count("total")?,
            compiled: count("compiled")?,
            offset: count("next_offset")?,
            started_at: row.try_get("started_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl ProgressStore for DbConnection {
    async fn load_progress(&self) -> Result<Option<BatchProgress>, PressNativeError> {
        Ok(sqlx::query_as::<_, BatchProgress>(
            "SELECT status, total, compiled, next_offset, started_at, updated_at \
             FROM batch_progress WHERE id = 0",
        )
        .fetch_optional(&self.0)
        .await?)
    }

    async fn save_progress(&self, progress: &BatchProgress) -> Result<(), PressNativeError> {
        sqlx::query(
            "INSERT OR REPLACE INTO batch_progress \
             (id, status, total, compiled, next_offset, started_at, updated_at) \
             VALUES (0, ?, ?, ?, ?, ?, ?)",
        )
        .bind(progress.status.to_string())
        .bind(progress.total as i64)
        .bind(progress.compiled as i64)
        .bind(progress.offset as i64)
        .bind(progress.started_at)
        .bind(progress.updated_at)
        .execute(&self.0)
        .await?;
        Ok(())
    }
}

/// A migration definition.
#[derive(Debug, Clone)]
pub struct Migration {
    pub version: i64,
    pub description: &'static str,
    pub sql: &'static str,
}

#[derive(Debug, Clone)]
struct MigrationList(Vec<Migration>);

impl MigrationSource<'static> for MigrationList {
    fn resolve(self) -> BoxFuture<'static, Result<Vec<SqlxMigration>, BoxDynError>> {
        Box::pin(async move {
            Ok(self
                .0
                .into_iter()
                .map(|migration| {
                    SqlxMigration::new(
                        migration.version,
                        migration.description.into(),
                        MigrationType::Simple,
                        migration.sql.into(),
                        false,
                    )
                })
                .collect())
        })
    }
}

fn migrations() -> MigrationList {
    MigrationList(vec![Migration {
        version: 1,
        description: "create_compiled_content",
        sql: "\
        CREATE TABLE compiled_content (content_id INTEGER PRIMARY KEY, blocks TEXT NOT NULL, compiled_at INTEGER NOT NULL); \
        CREATE TABLE batch_progress (id INTEGER PRIMARY KEY CHECK (id = 0), status TEXT NOT NULL, total INTEGER NOT NULL, \
            compiled INTEGER NOT NULL, next_offset INTEGER NOT NULL, started_at INTEGER NOT NULL, updated_at INTEGER NOT NULL);",
    }])
}

pub async fn db_init(db_path: PathBuf) -> Result<Pool<Sqlite>, sqlx::Error> {
    let fqdb = format!("sqlite:{}", db_path.to_string_lossy());
    tracing::debug!("Initializing cache db from file: {:?}", fqdb);
    if !Sqlite::database_exists(&fqdb).await.unwrap_or(false) {
        Sqlite::create_database(&fqdb).await?;
    }
    let options = SqliteConnectOptions::from_str(&fqdb)?
        .read_only(false)
        .disable_statement_logging()
        .create_if_missing(true);
    let pool = sqlx::pool::PoolOptions::<Sqlite>::new()
        .connect_with(options)
        .await?;

    let migrator = Migrator::new(migrations()).await?;
    migrator.run(&pool).await?;

    let count_res = sqlx::query("SELECT COUNT(*) AS ccount FROM compiled_content;")
        .fetch_one(&pool)
        .await?;
    tracing::info!(
        "DB Connection initialized.\n \
         \tCached document count:\t{:?}",
        count_res.get::<i64, usize>(0)
    );

    Ok(pool)
}
