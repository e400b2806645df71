//! One JSON file per turn (§4.K).
//!
//! Never mutated once written. Callers never retry a failed write by
//! truncating and rewriting — each turn gets a fresh SUID-named file, so
//! the only way to overwrite an existing file is a SUID collision.

use std::io::Write as _;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use gw_domain::attachment::Attachment;
use gw_domain::error::{GatewayError, Result};
use gw_domain::hash::{sanitize_path_component, sha256_hex};
use gw_domain::tool::ToolCallSummary;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptMetadata {
    pub user_id: String,
    pub conversation_id: String,
    pub provider: String,
    pub model: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

/// One turn, as written to disk. Fields mirror the return tuple of the
/// unary query handler (§4.I step 16) plus the request's own query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptRecord {
    pub metadata: TranscriptMetadata,
    /// Already redacted by the time it reaches the writer — this crate
    /// does no redaction of its own.
    pub query: String,
    pub validated: bool,
    pub response: String,
    #[serde(default)]
    pub rag_chunks: Vec<String>,
    pub truncated: bool,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub tool_calls: Vec<ToolCallSummary>,
}

pub struct TranscriptWriter {
    base_dir: PathBuf,
}

impl TranscriptWriter {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    fn path_for(&self, user_id: &str, conversation_id: &str, suid: &str) -> PathBuf {
        self.base_dir
            .join(sha256_hex(user_id))
            .join(sanitize_path_component(conversation_id))
            .join(format!("{suid}.json"))
    }

    /// Write one turn's record under its own fresh file. Propagates any
    /// I/O or serialization failure rather than logging and swallowing
    /// it — the caller decides whether a transcript failure is fatal
    /// (§4.I, hard failure) or recoverable (§4.J streaming, warn and
    /// continue since the response already reached the client).
    pub fn write(&self, record: &TranscriptRecord) -> Result<String> {
        let suid = gw_domain::suid::generate();
        let path = self.path_for(
            &record.metadata.user_id,
            &record.metadata.conversation_id,
            &suid,
        );

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| GatewayError::StorageError(format!("creating transcript dir: {e}")))?;
        }

        let json = serde_json::to_vec_pretty(record)
            .map_err(|e| GatewayError::StorageError(format!("serializing transcript: {e}")))?;

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .open(&path)
            .map_err(|e| GatewayError::StorageError(format!("opening transcript file: {e}")))?;
        file.write_all(&json)
            .map_err(|e| GatewayError::StorageError(format!("writing transcript file: {e}")))?;

        Ok(suid)
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_record() -> TranscriptRecord {
        let now = Utc::now();
        TranscriptRecord {
            metadata: TranscriptMetadata {
                user_id: "user-1".into(),
                conversation_id: "conv-1".into(),
                provider: "openai".into(),
                model: "gpt-4o".into(),
                started_at: now,
                completed_at: now,
            },
            query: "hello".into(),
            validated: true,
            response: "hi there".into(),
            rag_chunks: vec![],
            truncated: false,
            attachments: vec![],
            tool_calls: vec![],
        }
    }

    #[test]
    fn write_creates_sharded_path() {
        let dir = tempdir().unwrap();
        let writer = TranscriptWriter::new(dir.path());
        let suid = writer.write(&sample_record()).unwrap();

        let expected = dir
            .path()
            .join(sha256_hex("user-1"))
            .join("conv-1")
            .join(format!("{suid}.json"));
        assert!(expected.exists());
    }

    #[test]
    fn write_sanitizes_traversal_attempt_in_conversation_id() {
        let dir = tempdir().unwrap();
        let writer = TranscriptWriter::new(dir.path());
        let mut record = sample_record();
        record.metadata.conversation_id = "../../etc/passwd".into();
        writer.write(&record).unwrap();

        assert!(!dir.path().join("..").exists());
        let shard = dir.path().join(sha256_hex("user-1"));
        assert!(shard.is_dir());
        for entry in std::fs::read_dir(&shard).unwrap() {
            let entry = entry.unwrap();
            assert!(entry.path().is_dir());
            assert_ne!(entry.file_name(), "..");
        }
    }

    #[test]
    fn each_write_gets_a_fresh_file() {
        let dir = tempdir().unwrap();
        let writer = TranscriptWriter::new(dir.path());
        let suid_a = writer.write(&sample_record()).unwrap();
        let suid_b = writer.write(&sample_record()).unwrap();
        assert_ne!(suid_a, suid_b);
    }

    #[test]
    fn record_round_trips_through_json() {
        let record = sample_record();
        let json = serde_json::to_string(&record).unwrap();
        let decoded: TranscriptRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded.query, record.query);
        assert_eq!(decoded.metadata.user_id, record.metadata.user_id);
    }
}
