//! SQLite-backed binding store using sqlx.
//!
//! Atomicity of `insert_if_absent` rests on the `worker` primary key plus
//! `INSERT OR IGNORE`: the storage layer enforces first-writer-wins, no
//! read-then-write sequence exists to race.

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use tracing::info;

use crate::database::{BindingStore, StoreError};
use crate::registry::Binding;

pub struct SqliteBindingStore {
    pool: SqlitePool,
}

impl SqliteBindingStore {
    /// Open (creating if needed) the database at `database_path` and ensure
    /// the schema exists. Accepts either a bare path or a `sqlite:` URL.
    pub async fn open(database_path: &str) -> Result<Self, StoreError> {
        let db_url = if database_path.starts_with("sqlite:") {
            database_path.to_string()
        } else {
            format!("sqlite:{database_path}")
        };
        let final_url = if db_url.contains('?') {
            db_url
        } else {
            format!("{db_url}?mode=rwc")
        };

        // An in-memory database exists per connection; the pool must be
        // pinned to one long-lived connection or the data vanishes between
        // checkouts.
        let in_memory = final_url.contains(":memory:") || final_url.contains("mode=memory");
        let pool = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect(&final_url)
                .await?
        } else {
            SqlitePool::connect(&final_url).await?
        };
        let store = Self { pool };
        store.init_schema().await?;
        info!(url = %final_url, "binding store opened");
        Ok(store)
    }

    pub fn with_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn init_schema(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS bindings (
                worker TEXT PRIMARY KEY,
                hotkey TEXT NOT NULL,
                registration_time INTEGER NOT NULL,
                signature TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_bindings_registration_time \
             ON bindings (registration_time)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    fn binding_from_row(row: &sqlx::sqlite::SqliteRow) -> Binding {
        Binding {
            worker: row.get("worker"),
            hotkey: row.get("hotkey"),
            registration_time: row.get("registration_time"),
            signature: row.get("signature"),
        }
    }
}

#[async_trait]
impl BindingStore for SqliteBindingStore {
    async fn get(&self, worker: &str) -> Result<Option<Binding>, StoreError> {
        let row = sqlx::query(
            "SELECT worker, hotkey, registration_time, signature \
             FROM bindings WHERE worker = ?1",
        )
        .bind(worker)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(Self::binding_from_row))
    }

    async fn insert_if_absent(&self, binding: &Binding) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO bindings (worker, hotkey, registration_time, signature) \
             VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(&binding.worker)
        .bind(&binding.hotkey)
        .bind(binding.registration_time)
        .bind(&binding.signature)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn scan_since(
        &self,
        since: i64,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Binding>, StoreError> {
        let rows = sqlx::query(
            "SELECT worker, hotkey, registration_time, signature \
             FROM bindings WHERE registration_time > ?1 \
             ORDER BY registration_time ASC, worker ASC \
             LIMIT ?2 OFFSET ?3",
        )
        .bind(since)
        .bind(limit as i64)
        .bind(offset as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(Self::binding_from_row).collect())
    }

    async fn snapshot(&self) -> Result<HashMap<String, String>, StoreError> {
        let rows = sqlx::query("SELECT worker, hotkey FROM bindings")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .iter()
            .map(|row| (row.get("worker"), row.get("hotkey")))
            .collect())
    }
}
