//! One JSON file per feedback submission (§6 `/v1/feedback`).
//!
//! Flatter than the transcript layout — feedback has no per-conversation
//! sharding, just `<storage_root>/<SUID>.json` — since there's no
//! ownership check to make path-level isolation worth the complexity.

use std::io::Write as _;
use std::path::PathBuf;

use gw_domain::conversation::FeedbackRequest;
use gw_domain::error::{GatewayError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub user_id: String,
    #[serde(flatten)]
    pub feedback: FeedbackRequest,
}

pub struct FeedbackWriter {
    base_dir: PathBuf,
}

impl FeedbackWriter {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self { base_dir: base_dir.into() }
    }

    /// Writes one submission under a fresh SUID-named file. Propagates
    /// I/O and serialization failures rather than swallowing them.
    pub fn write(&self, record: &FeedbackRecord) -> Result<String> {
        let suid = gw_domain::suid::generate();
        let path = self.base_dir.join(format!("{suid}.json"));

        std::fs::create_dir_all(&self.base_dir)
            .map_err(|e| GatewayError::StorageError(format!("creating feedback dir: {e}")))?;

        let json = serde_json::to_vec_pretty(record)
            .map_err(|e| GatewayError::StorageError(format!("serializing feedback: {e}")))?;

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .open(&path)
            .map_err(|e| GatewayError::StorageError(format!("opening feedback file: {e}")))?;
        file.write_all(&json)
            .map_err(|e| GatewayError::StorageError(format!("writing feedback file: {e}")))?;

        Ok(suid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_record() -> FeedbackRecord {
        FeedbackRecord {
            user_id: "user-1".into(),
            feedback: FeedbackRequest {
                conversation_id: "conv-1".into(),
                user_question: "why?".into(),
                llm_response: "because".into(),
                sentiment: Some(1),
                user_feedback: Some("great".into()),
                categories: vec!["helpful".into()],
            },
        }
    }

    #[test]
    fn write_creates_a_file() {
        let dir = tempdir().unwrap();
        let writer = FeedbackWriter::new(dir.path());
        let suid = writer.write(&sample_record()).unwrap();
        assert!(dir.path().join(format!("{suid}.json")).exists());
    }

    #[test]
    fn each_write_gets_a_fresh_file() {
        let dir = tempdir().unwrap();
        let writer = FeedbackWriter::new(dir.path());
        let a = writer.write(&sample_record()).unwrap();
        let b = writer.write(&sample_record()).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn record_round_trips_through_json() {
        let record = sample_record();
        let json = serde_json::to_string(&record).unwrap();
        let decoded: FeedbackRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded.feedback.conversation_id, record.feedback.conversation_id);
    }
}
