//! PostgreSQL backend for `ConversationCache`.
//!
//! `referenced_documents` is stored as `jsonb`, bound directly as
//! `serde_json::Value` rather than a pre-serialized string — the one
//! real difference from the SQLite backend's TEXT column.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gw_domain::conversation::{CacheEntry, ConversationData, ReferencedDocument, UserConversation};
use gw_domain::error::{GatewayError, Result};
use sqlx::{PgPool, Row};

use super::{check_user_id, ConversationCache};

#[derive(Clone)]
pub struct PostgresCache {
    pool: PgPool,
}

impl PostgresCache {
    pub async fn connect(connection_string: &str) -> Result<Self> {
        let pool = PgPool::connect(connection_string)
            .await
            .map_err(|e| GatewayError::StorageError(e.to_string()))?;
        let cache = Self { pool };
        cache.ensure_schema().await?;
        Ok(cache)
    }

    async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS cache (
                user_id TEXT NOT NULL,
                conv_id TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL,
                started_at TIMESTAMPTZ NOT NULL,
                completed_at TIMESTAMPTZ NOT NULL,
                query TEXT NOT NULL,
                response TEXT NOT NULL,
                provider TEXT NOT NULL,
                model TEXT NOT NULL,
                referenced_documents JSONB,
                PRIMARY KEY (user_id, conv_id, created_at)
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| GatewayError::StorageError(e.to_string()))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS cache_created_at_idx ON cache (created_at)")
            .execute(&self.pool)
            .await
            .map_err(|e| GatewayError::StorageError(e.to_string()))?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS conversations (
                user_id TEXT NOT NULL,
                conv_id TEXT NOT NULL,
                topic_summary TEXT,
                last_message_timestamp BIGINT NOT NULL,
                last_used_model TEXT NOT NULL DEFAULT '',
                last_used_provider TEXT NOT NULL DEFAULT '',
                message_count BIGINT NOT NULL DEFAULT 0,
                PRIMARY KEY (user_id, conv_id)
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| GatewayError::StorageError(e.to_string()))?;

        Ok(())
    }

    fn decode_referenced_documents(
        raw: Option<serde_json::Value>,
    ) -> Option<Vec<ReferencedDocument>> {
        let raw = raw?;
        match serde_json::from_value::<Vec<ReferencedDocument>>(raw) {
            Ok(docs) if docs.is_empty() => None,
            Ok(docs) => Some(docs),
            Err(e) => {
                tracing::warn!(error = %e, "referenced_documents failed to deserialize, using null");
                None
            }
        }
    }
}

#[async_trait]
impl ConversationCache for PostgresCache {
    async fn get(
        &self,
        user_id: &str,
        conv_id: &str,
        skip_user_id_check: bool,
    ) -> Result<Vec<CacheEntry>> {
        check_user_id(user_id, skip_user_id_check)?;
        let rows = sqlx::query(
            "SELECT created_at, started_at, completed_at, query, response, provider, model, referenced_documents
             FROM cache WHERE user_id = $1 AND conv_id = $2 ORDER BY created_at ASC",
        )
        .bind(user_id)
        .bind(conv_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| GatewayError::StorageError(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(|row| CacheEntry {
                query: row.get("query"),
                response: row.get("response"),
                provider: row.get("provider"),
                model: row.get("model"),
                started_at: row.get::<DateTime<Utc>, _>("started_at"),
                completed_at: row.get::<DateTime<Utc>, _>("completed_at"),
                referenced_documents: Self::decode_referenced_documents(
                    row.get::<Option<serde_json::Value>, _>("referenced_documents"),
                ),
                created_at: row.get::<DateTime<Utc>, _>("created_at"),
            })
            .collect())
    }

    async fn insert(
        &self,
        user_id: &str,
        conv_id: &str,
        entry: CacheEntry,
        skip_user_id_check: bool,
    ) -> Result<()> {
        check_user_id(user_id, skip_user_id_check)?;
        let entry = entry.normalize();
        let referenced_documents = entry
            .referenced_documents
            .as_ref()
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| GatewayError::StorageError(e.to_string()))?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| GatewayError::StorageError(e.to_string()))?;

        sqlx::query(
            "INSERT INTO cache (user_id, conv_id, created_at, started_at, completed_at, query, response, provider, model, referenced_documents)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
             ON CONFLICT (user_id, conv_id, created_at) DO UPDATE SET
                started_at = excluded.started_at,
                completed_at = excluded.completed_at,
                query = excluded.query,
                response = excluded.response,
                provider = excluded.provider,
                model = excluded.model,
                referenced_documents = excluded.referenced_documents",
        )
        .bind(user_id)
        .bind(conv_id)
        .bind(entry.created_at)
        .bind(entry.started_at)
        .bind(entry.completed_at)
        .bind(&entry.query)
        .bind(&entry.response)
        .bind(&entry.provider)
        .bind(&entry.model)
        .bind(referenced_documents)
        .execute(&mut *tx)
        .await
        .map_err(|e| GatewayError::StorageError(e.to_string()))?;

        sqlx::query(
            "INSERT INTO conversations (user_id, conv_id, topic_summary, last_message_timestamp, last_used_model, last_used_provider, message_count)
             VALUES ($1, $2, NULL, $3, $4, $5, 1)
             ON CONFLICT (user_id, conv_id) DO UPDATE SET
                last_message_timestamp = excluded.last_message_timestamp,
                last_used_model = excluded.last_used_model,
                last_used_provider = excluded.last_used_provider,
                message_count = conversations.message_count + 1",
        )
        .bind(user_id)
        .bind(conv_id)
        .bind(entry.completed_at.timestamp_millis())
        .bind(&entry.model)
        .bind(&entry.provider)
        .execute(&mut *tx)
        .await
        .map_err(|e| GatewayError::StorageError(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| GatewayError::StorageError(e.to_string()))
    }

    async fn delete(
        &self,
        user_id: &str,
        conv_id: &str,
        skip_user_id_check: bool,
    ) -> Result<bool> {
        check_user_id(user_id, skip_user_id_check)?;
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| GatewayError::StorageError(e.to_string()))?;

        let cache_result = sqlx::query("DELETE FROM cache WHERE user_id = $1 AND conv_id = $2")
            .bind(user_id)
            .bind(conv_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| GatewayError::StorageError(e.to_string()))?;

        let conv_result =
            sqlx::query("DELETE FROM conversations WHERE user_id = $1 AND conv_id = $2")
                .bind(user_id)
                .bind(conv_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| GatewayError::StorageError(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| GatewayError::StorageError(e.to_string()))?;

        Ok(cache_result.rows_affected() > 0 || conv_result.rows_affected() > 0)
    }

    async fn list(&self, user_id: &str, skip_user_id_check: bool) -> Result<Vec<ConversationData>> {
        check_user_id(user_id, skip_user_id_check)?;
        let rows = sqlx::query(
            "SELECT conv_id, topic_summary, last_message_timestamp FROM conversations
             WHERE user_id = $1 ORDER BY last_message_timestamp DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| GatewayError::StorageError(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(|row| ConversationData {
                conversation_id: row.get("conv_id"),
                topic_summary: row.get("topic_summary"),
                last_message_timestamp: row.get("last_message_timestamp"),
            })
            .collect())
    }

    async fn get_conversation(
        &self,
        user_id: &str,
        conv_id: &str,
        skip_user_id_check: bool,
    ) -> Result<Option<UserConversation>> {
        check_user_id(user_id, skip_user_id_check)?;
        let row = sqlx::query(
            "SELECT conv_id, topic_summary, last_message_timestamp, last_used_model, last_used_provider, message_count
             FROM conversations WHERE user_id = $1 AND conv_id = $2",
        )
        .bind(user_id)
        .bind(conv_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| GatewayError::StorageError(e.to_string()))?;

        Ok(row.map(|row| {
            let last_message_timestamp: i64 = row.get("last_message_timestamp");
            UserConversation {
                id: row.get("conv_id"),
                user_id: user_id.to_string(),
                last_used_model: row.get("last_used_model"),
                last_used_provider: row.get("last_used_provider"),
                topic_summary: row.get("topic_summary"),
                last_message_at: DateTime::from_timestamp_millis(last_message_timestamp)
                    .unwrap_or_else(Utc::now),
                message_count: row.get::<i64, _>("message_count") as u64,
            }
        }))
    }

    async fn set_topic_summary(
        &self,
        user_id: &str,
        conv_id: &str,
        text: &str,
        skip_user_id_check: bool,
    ) -> Result<()> {
        check_user_id(user_id, skip_user_id_check)?;
        sqlx::query(
            "INSERT INTO conversations (user_id, conv_id, topic_summary, last_message_timestamp)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (user_id, conv_id) DO UPDATE SET
                topic_summary = excluded.topic_summary,
                last_message_timestamp = excluded.last_message_timestamp",
        )
        .bind(user_id)
        .bind(conv_id)
        .bind(text)
        .bind(Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await
        .map_err(|e| GatewayError::StorageError(e.to_string()))?;
        Ok(())
    }
}
