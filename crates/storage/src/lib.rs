//! Persistence for the gateway: the conversation cache (§4.E) and the
//! per-turn transcript writer (§4.K). Nothing here talks to the
//! upstream or HTTP — that's `gw-upstream` and the gateway binary.

pub mod cache;
pub mod feedback;
pub mod transcript;

pub use cache::{ConversationCache, InMemoryCache, NoopCache, PostgresCache, SqliteCache};
pub use feedback::{FeedbackRecord, FeedbackWriter};
pub use transcript::{TranscriptMetadata, TranscriptRecord, TranscriptWriter};
