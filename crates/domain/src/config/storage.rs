//! Filesystem roots for the transcript writer (§4.K) and feedback
//! store (§6 Persisted layout).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "d_transcripts_root")]
    pub storage_root: String,
}

impl Default for TranscriptsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            storage_root: d_transcripts_root(),
        }
    }
}

fn d_transcripts_root() -> String {
    "transcripts".into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackConfig {
    #[serde(default = "d_true")]
    pub enabled: bool,
    #[serde(default = "d_feedback_root")]
    pub storage_root: String,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            storage_root: d_feedback_root(),
        }
    }
}

fn d_true() -> bool {
    true
}

fn d_feedback_root() -> String {
    "feedback".into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transcripts_disabled_by_default() {
        assert!(!TranscriptsConfig::default().enabled);
    }

    #[test]
    fn feedback_enabled_by_default() {
        assert!(FeedbackConfig::default().enabled);
    }
}
