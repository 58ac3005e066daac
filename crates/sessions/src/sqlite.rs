//! SQLite-backed session storage.
//!
//! Keeps navigation state across restarts. One row per conversation in
//! `route_sessions`; see [`crate::run_migrations`].

use std::time::{SystemTime, UNIX_EPOCH};

use {async_trait::async_trait, chatmux_common::types::ConversationId, tracing::debug};

use crate::{Result, storage::SessionStorage};

/// SQLite-backed per-conversation route store.
pub struct SqliteStorage {
    pool: sqlx::SqlitePool,
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

impl SqliteStorage {
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (or create) a database at `url` and run migrations.
    pub async fn connect(url: &str) -> Result<Self> {
        use std::str::FromStr;

        let options =
            sqlx::sqlite::SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        // Each connection to an in-memory database sees its own database.
        let max_connections = if url.contains(":memory:") { 1 } else { 4 };
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;
        crate::run_migrations(&pool).await?;
        debug!(url, "sqlite session storage ready");
        Ok(Self::new(pool))
    }

    /// Number of conversations with stored state.
    pub async fn count(&self) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM route_sessions")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[async_trait]
impl SessionStorage for SqliteStorage {
    async fn get(&self, id: ConversationId) -> Result<Option<String>> {
        let row = sqlx::query_scalar::<_, String>(
            "SELECT path FROM route_sessions WHERE conversation_id = ?",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn set(&self, id: ConversationId, path: &str) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO route_sessions (conversation_id, path, updated_at)
               VALUES (?, ?, ?)
               ON CONFLICT(conversation_id) DO UPDATE SET
                 path = excluded.path,
                 updated_at = excluded.updated_at"#,
        )
        .bind(id.0)
        .bind(path)
        .bind(now_ms())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn reset(&self, id: ConversationId) -> Result<()> {
        sqlx::query("DELETE FROM route_sessions WHERE conversation_id = ?")
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
