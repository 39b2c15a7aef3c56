//! PostgreSQL key-value adapter.
//!
//! Every logical table shares one `kv_items` table, one row per
//! `(table_name, item_key)`, with the attribute map stored as JSONB.
//! The conditional update is a single `UPDATE ... WHERE item @> $expected`,
//! which PostgreSQL re-checks against the latest row version when two
//! updates race, so at most one of them applies.
//!
//! This module uses dynamic queries (sqlx::query) instead of compile-time
//! checked macros (sqlx::query!) to allow compilation without DATABASE_URL.

use crate::error::StoreError;
use crate::repository::{InsertOutcome, Item, KeyValueStore, Table, UpdateOutcome};
use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use std::sync::Arc;
use tracing::info;

/// PostgreSQL-backed [`KeyValueStore`].
pub struct PgKeyValueStore {
    /// PostgreSQL connection pool
    pool: Arc<PgPool>,
}

impl PgKeyValueStore {
    /// Create a new PostgreSQL store.
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Get a reference to the underlying pool (for testing).
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the `kv_items` table if it does not exist.
    ///
    /// Idempotent: safe to run multiple times.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS kv_items (
                table_name TEXT NOT NULL,
                item_key   TEXT NOT NULL,
                item       JSONB NOT NULL,
                PRIMARY KEY (table_name, item_key)
            )
            "#,
        )
        .execute(self.pool())
        .await?;

        info!("kv_items schema ready");
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for PgKeyValueStore {
    async fn get(&self, table: Table, key: &str) -> Result<Option<Item>, StoreError> {
        let row = sqlx::query("SELECT item FROM kv_items WHERE table_name = $1 AND item_key = $2")
            .bind(table.name())
            .bind(key)
            .fetch_optional(self.pool())
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        match row.try_get::<serde_json::Value, _>("item")? {
            serde_json::Value::Object(item) => Ok(Some(item)),
            other => Err(StoreError::Deserialization(format!(
                "{} item {} is not an attribute map: {}",
                table, key, other
            ))),
        }
    }

    async fn put(&self, table: Table, key: &str, item: Item) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO kv_items (table_name, item_key, item)
            VALUES ($1, $2, $3)
            ON CONFLICT (table_name, item_key) DO UPDATE SET item = EXCLUDED.item
            "#,
        )
        .bind(table.name())
        .bind(key)
        .bind(Json(item))
        .execute(self.pool())
        .await?;

        Ok(())
    }

    async fn insert(&self, table: Table, key: &str, item: Item) -> Result<InsertOutcome, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO kv_items (table_name, item_key, item)
            VALUES ($1, $2, $3)
            ON CONFLICT (table_name, item_key) DO NOTHING
            "#,
        )
        .bind(table.name())
        .bind(key)
        .bind(Json(item))
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            Ok(InsertOutcome::AlreadyExists)
        } else {
            Ok(InsertOutcome::Inserted)
        }
    }

    async fn conditional_update(
        &self,
        table: Table,
        key: &str,
        set: Item,
        expected: Item,
    ) -> Result<UpdateOutcome, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE kv_items
            SET item = item || $3
            WHERE table_name = $1 AND item_key = $2 AND item @> $4
            "#,
        )
        .bind(table.name())
        .bind(key)
        .bind(Json(set))
        .bind(Json(expected))
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            Ok(UpdateOutcome::ConditionFailed)
        } else {
            Ok(UpdateOutcome::Applied)
        }
    }
}
