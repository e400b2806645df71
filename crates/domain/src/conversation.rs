//! Conversation-shaped wire and storage DTOs: the request body clients
//! send, the entry the cache persists per turn, and the relational
//! side-table that's authoritative for ownership.

use crate::attachment::Attachment;
use crate::error::GatewayError;
use crate::tool::ToolCallSummary;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Body of `POST /v1/query` and `POST /v1/streaming_query`.
///
/// Invariant: `model` and `provider` must be both set or both unset —
/// enforced by [`QueryRequest::validate`], not by the wire schema, since
/// a partial override is a client bug worth a clear 400 rather than a
/// silently-ignored field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub no_tools: bool,
}

impl QueryRequest {
    pub fn validate(&self) -> Result<(), GatewayError> {
        if self.provider.is_some() != self.model.is_some() {
            return Err(GatewayError::MalformedRequest(
                "model and provider must be both set or both unset".into(),
            ));
        }
        crate::attachment::validate_all(&self.attachments)
    }

    pub fn requests_model_override(&self) -> bool {
        self.model.is_some()
    }
}

/// `(doc_url, doc_title)` — a citation surfaced from a knowledge-search
/// tool result (§4.M).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferencedDocument {
    pub doc_url: String,
    pub doc_title: String,
}

/// One persisted turn (§3 `CacheEntry`). Never mutated after insert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub query: String,
    pub response: String,
    pub provider: String,
    pub model: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    /// `None` means "no documents" (stored as SQL NULL); `Some(vec![])`
    /// would be a different, disallowed state per the empty-vs-null
    /// serialization rule — callers must normalize to `None` when empty.
    pub referenced_documents: Option<Vec<ReferencedDocument>>,
    /// The server-assigned monotonic ordering key for this conversation.
    pub created_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Normalize an empty referenced-documents list to `None` so the
    /// empty/missing distinction round-trips through storage.
    pub fn normalize(mut self) -> Self {
        if matches!(&self.referenced_documents, Some(docs) if docs.is_empty()) {
            self.referenced_documents = None;
        }
        self
    }
}

/// List-view projection returned by `GET /v2/conversations` (§3
/// `ConversationData`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationData {
    pub conversation_id: String,
    pub topic_summary: Option<String>,
    pub last_message_timestamp: i64,
}

/// The relational side-table row, authoritative for ownership and for
/// the "last-used model/provider" hint a follow-up request without an
/// explicit override falls back to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserConversation {
    pub id: String,
    pub user_id: String,
    pub last_used_model: String,
    pub last_used_provider: String,
    pub topic_summary: Option<String>,
    pub last_message_at: DateTime<Utc>,
    pub message_count: u64,
}

/// In-memory per-turn aggregation built while a turn executes (§3
/// `TurnSummary`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TurnSummary {
    pub llm_response: String,
    pub tool_calls: Vec<ToolCallSummary>,
}

/// Body of `POST /v1/feedback` (recovered from the original
/// `FeedbackRequest` / `endpoints/feedback.py`; dropped by the
/// distillation but present in every complete build of this kind of
/// gateway).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackRequest {
    pub conversation_id: String,
    pub user_question: String,
    pub llm_response: String,
    #[serde(default)]
    pub sentiment: Option<i8>,
    #[serde(default)]
    pub user_feedback: Option<String>,
    #[serde(default)]
    pub categories: Vec<String>,
}

impl FeedbackRequest {
    pub fn validate(&self) -> Result<(), GatewayError> {
        if let Some(s) = self.sentiment {
            if !(-1..=1).contains(&s) {
                return Err(GatewayError::MalformedRequest(
                    "sentiment must be -1, 0, or 1".into(),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_request_rejects_partial_override() {
        let req = QueryRequest {
            query: "hi".into(),
            conversation_id: None,
            provider: Some("openai".into()),
            model: None,
            system_prompt: None,
            attachments: vec![],
            no_tools: false,
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn query_request_allows_both_unset() {
        let req = QueryRequest {
            query: "hi".into(),
            conversation_id: None,
            provider: None,
            model: None,
            system_prompt: None,
            attachments: vec![],
            no_tools: false,
        };
        assert!(req.validate().is_ok());
    }

    #[test]
    fn query_request_allows_both_set() {
        let req = QueryRequest {
            query: "hi".into(),
            conversation_id: None,
            provider: Some("openai".into()),
            model: Some("gpt-4o".into()),
            system_prompt: None,
            attachments: vec![],
            no_tools: false,
        };
        assert!(req.validate().is_ok());
    }

    #[test]
    fn cache_entry_normalizes_empty_list_to_none() {
        let now = Utc::now();
        let entry = CacheEntry {
            query: "q".into(),
            response: "r".into(),
            provider: "p".into(),
            model: "m".into(),
            started_at: now,
            completed_at: now,
            referenced_documents: Some(vec![]),
            created_at: now,
        }
        .normalize();
        assert!(entry.referenced_documents.is_none());
    }

    #[test]
    fn cache_entry_preserves_nonempty_list() {
        let now = Utc::now();
        let docs = vec![ReferencedDocument {
            doc_url: "https://example.com".into(),
            doc_title: "Example".into(),
        }];
        let entry = CacheEntry {
            query: "q".into(),
            response: "r".into(),
            provider: "p".into(),
            model: "m".into(),
            started_at: now,
            completed_at: now,
            referenced_documents: Some(docs.clone()),
            created_at: now,
        }
        .normalize();
        assert_eq!(entry.referenced_documents, Some(docs));
    }

    #[test]
    fn feedback_sentiment_out_of_range_rejected() {
        let feedback = FeedbackRequest {
            conversation_id: "c1".into(),
            user_question: "q".into(),
            llm_response: "r".into(),
            sentiment: Some(5),
            user_feedback: None,
            categories: vec![],
        };
        assert!(feedback.validate().is_err());
    }
}
