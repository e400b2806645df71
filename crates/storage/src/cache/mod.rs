//! Conversation cache (§4.E): per-turn history plus a conversations
//! side-table that's authoritative for ownership and the "last used
//! model/provider" hint.
//!
//! Four backends share one contract. `skip_user_id_check` disables the
//! UUID-shape check on `user_id` — set by callers (admin tooling,
//! internal jobs) that operate on behalf of a user without having
//! authenticated as one.

mod postgres;
mod sqlite;

pub use postgres::PostgresCache;
pub use sqlite::SqliteCache;

use async_trait::async_trait;
use gw_domain::conversation::{CacheEntry, ConversationData, UserConversation};
use gw_domain::error::{GatewayError, Result};

pub(crate) fn check_user_id(user_id: &str, skip_user_id_check: bool) -> Result<()> {
    if skip_user_id_check || gw_domain::suid::is_valid(user_id) {
        Ok(())
    } else {
        Err(GatewayError::MalformedRequest(format!(
            "invalid user id: {user_id}"
        )))
    }
}

#[async_trait]
pub trait ConversationCache: Send + Sync {
    /// Entries for one conversation, ordered by `created_at` ascending.
    async fn get(
        &self,
        user_id: &str,
        conv_id: &str,
        skip_user_id_check: bool,
    ) -> Result<Vec<CacheEntry>>;

    /// Append an entry and upsert the conversations side-table, bumping
    /// `last_message_timestamp`.
    async fn insert(
        &self,
        user_id: &str,
        conv_id: &str,
        entry: CacheEntry,
        skip_user_id_check: bool,
    ) -> Result<()>;

    /// Remove all entries and the conversations row. Returns `true` iff
    /// anything was removed.
    async fn delete(&self, user_id: &str, conv_id: &str, skip_user_id_check: bool)
        -> Result<bool>;

    /// Conversations for a user, ordered by `last_message_timestamp`
    /// descending.
    async fn list(&self, user_id: &str, skip_user_id_check: bool) -> Result<Vec<ConversationData>>;

    /// The side-table row for one conversation, authoritative for
    /// ownership and for the last-used model/provider hint. `None` if
    /// no such conversation exists for this user.
    async fn get_conversation(
        &self,
        user_id: &str,
        conv_id: &str,
        skip_user_id_check: bool,
    ) -> Result<Option<UserConversation>>;

    /// Upsert the topic summary, bumping `last_message_timestamp`.
    async fn set_topic_summary(
        &self,
        user_id: &str,
        conv_id: &str,
        text: &str,
        skip_user_id_check: bool,
    ) -> Result<()>;
}

/// Always empty, always succeeds. Used when no cache backend is
/// configured — queries short-circuit to "no history" rather than the
/// gateway refusing to serve requests.
#[derive(Debug, Clone, Default)]
pub struct NoopCache;

#[async_trait]
impl ConversationCache for NoopCache {
    async fn get(&self, _: &str, _: &str, _: bool) -> Result<Vec<CacheEntry>> {
        Ok(Vec::new())
    }

    async fn insert(&self, _: &str, _: &str, _: CacheEntry, _: bool) -> Result<()> {
        Ok(())
    }

    async fn delete(&self, _: &str, _: &str, _: bool) -> Result<bool> {
        Ok(false)
    }

    async fn list(&self, _: &str, _: bool) -> Result<Vec<ConversationData>> {
        Ok(Vec::new())
    }

    async fn get_conversation(
        &self,
        _: &str,
        _: &str,
        _: bool,
    ) -> Result<Option<UserConversation>> {
        Ok(None)
    }

    async fn set_topic_summary(&self, _: &str, _: &str, _: &str, _: bool) -> Result<()> {
        Ok(())
    }
}

/// Validates keys but does not store. A thin compatibility shim for a
/// "memory" backend request — no conversation ever has history, but
/// malformed user ids still surface as `MalformedRequest` instead of
/// being swallowed.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCache;

#[async_trait]
impl ConversationCache for InMemoryCache {
    async fn get(
        &self,
        user_id: &str,
        _conv_id: &str,
        skip_user_id_check: bool,
    ) -> Result<Vec<CacheEntry>> {
        check_user_id(user_id, skip_user_id_check)?;
        Ok(Vec::new())
    }

    async fn insert(
        &self,
        user_id: &str,
        _conv_id: &str,
        _entry: CacheEntry,
        skip_user_id_check: bool,
    ) -> Result<()> {
        check_user_id(user_id, skip_user_id_check)
    }

    async fn delete(
        &self,
        user_id: &str,
        _conv_id: &str,
        skip_user_id_check: bool,
    ) -> Result<bool> {
        check_user_id(user_id, skip_user_id_check)?;
        Ok(false)
    }

    async fn list(&self, user_id: &str, skip_user_id_check: bool) -> Result<Vec<ConversationData>> {
        check_user_id(user_id, skip_user_id_check)?;
        Ok(Vec::new())
    }

    async fn get_conversation(
        &self,
        user_id: &str,
        _conv_id: &str,
        skip_user_id_check: bool,
    ) -> Result<Option<UserConversation>> {
        check_user_id(user_id, skip_user_id_check)?;
        Ok(None)
    }

    async fn set_topic_summary(
        &self,
        user_id: &str,
        _conv_id: &str,
        _text: &str,
        skip_user_id_check: bool,
    ) -> Result<()> {
        check_user_id(user_id, skip_user_id_check)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample_entry() -> CacheEntry {
        let now = Utc::now();
        CacheEntry {
            query: "hi".into(),
            response: "hello".into(),
            provider: "openai".into(),
            model: "gpt-4o".into(),
            started_at: now,
            completed_at: now,
            referenced_documents: None,
            created_at: now,
        }
    }

    #[tokio::test]
    async fn noop_cache_is_always_empty() {
        let cache = NoopCache;
        cache
            .insert("u1", "c1", sample_entry(), false)
            .await
            .unwrap();
        assert!(cache.get("u1", "c1", false).await.unwrap().is_empty());
        assert!(cache.list("u1", false).await.unwrap().is_empty());
        assert!(!cache.delete("u1", "c1", false).await.unwrap());
    }

    #[tokio::test]
    async fn noop_cache_does_not_validate_user_id() {
        let cache = NoopCache;
        assert!(cache.get("not-a-uuid", "c1", false).await.is_ok());
    }

    #[tokio::test]
    async fn in_memory_cache_validates_user_id() {
        let cache = InMemoryCache;
        let err = cache.get("not-a-uuid", "c1", false).await.unwrap_err();
        assert!(matches!(err, GatewayError::MalformedRequest(_)));
    }

    #[tokio::test]
    async fn in_memory_cache_skips_validation_when_asked() {
        let cache = InMemoryCache;
        assert!(cache.get("not-a-uuid", "c1", true).await.is_ok());
    }

    #[tokio::test]
    async fn in_memory_cache_never_stores() {
        let cache = InMemoryCache;
        let user_id = gw_domain::suid::generate();
        cache
            .insert(&user_id, "c1", sample_entry(), false)
            .await
            .unwrap();
        assert!(cache.get(&user_id, "c1", false).await.unwrap().is_empty());
    }
}
