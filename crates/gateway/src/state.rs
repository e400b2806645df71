use std::sync::Arc;

use gw_domain::auth::AccessRule;
use gw_domain::config::Config;
use gw_storage::{ConversationCache, FeedbackWriter, TranscriptWriter};
use gw_upstream::UpstreamClient;
use parking_lot::RwLock;

use crate::agent::AgentRegistry;
use crate::auth::AuthModule;
use crate::metrics::Metrics;
use crate::quota::QuotaLimiter;

/// Shared application state (§4.Q `Services`). A single `build_services`
/// call fills this once at startup; everything downstream is an `Arc`
/// handle into it, never a process-wide singleton.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub upstream: UpstreamClient,
    pub cache: Arc<dyn ConversationCache>,
    pub transcripts: Option<Arc<TranscriptWriter>>,
    pub quota_limiters: Arc<Vec<Box<dyn QuotaLimiter>>>,
    pub auth: Arc<dyn AuthModule>,
    pub access_rules: Arc<Vec<AccessRule>>,
    pub agents: Arc<AgentRegistry>,
    pub metrics: Arc<Metrics>,
    pub feedback_writer: Arc<FeedbackWriter>,
    /// Runtime toggle for `PUT /v1/feedback/status` (§6), seeded from
    /// `config.feedback.enabled` but mutable without a restart.
    pub feedback_enabled: Arc<RwLock<bool>>,
}
