//! `AppState` construction (§4.N): turns a validated [`Config`] into every
//! subsystem the gateway needs, with no HTTP listener involved — shared by
//! `serve` and the `doctor` CLI command so both boot the same runtime.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use parking_lot::RwLock;

use gw_domain::auth::AccessRule;
use gw_domain::config::{AuthModule as AuthModuleKind, CacheBackend, Config, ConfigSeverity};
use gw_storage::{ConversationCache, FeedbackWriter, InMemoryCache, NoopCache, PostgresCache, SqliteCache, TranscriptWriter};
use gw_upstream::UpstreamClient;

use crate::agent::AgentRegistry;
use crate::auth::{AuthModule, JwkTokenAuth, K8sAuth, NoopAuth, NoopWithTokenAuth};
use crate::metrics::Metrics;
use crate::quota::{DailyTokenLimiter, QuotaLimiter};
use crate::state::AppState;

/// Validate config and wire every subsystem into an [`AppState`]. Fails
/// fast on the first hard error; warnings are logged and otherwise
/// ignored.
pub async fn build_services(config: Arc<Config>) -> anyhow::Result<AppState> {
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
        anyhow::bail!(
            "config validation failed with {} error(s)",
            issues.iter().filter(|i| i.severity == ConfigSeverity::Error).count()
        );
    }

    let upstream = UpstreamClient::new(
        config.llm.upstream_url.clone(),
        Duration::from_millis(config.llm.default_timeout_ms),
    )
    .context("constructing upstream client")?;
    tracing::info!(url = %config.llm.upstream_url, "upstream client ready");

    let cache: Arc<dyn ConversationCache> = match config.cache.backend {
        CacheBackend::Sqlite => {
            let conn = config
                .cache
                .connection_string
                .as_deref()
                .context("cache.backend = sqlite requires connection_string")?;
            Arc::new(SqliteCache::connect(conn).await.context("connecting sqlite cache")?)
        }
        CacheBackend::Postgres => {
            let conn = config
                .cache
                .connection_string
                .as_deref()
                .context("cache.backend = postgres requires connection_string")?;
            Arc::new(PostgresCache::connect(conn).await.context("connecting postgres cache")?)
        }
        CacheBackend::Memory => Arc::new(InMemoryCache),
        CacheBackend::Noop => Arc::new(NoopCache),
    };
    tracing::info!(backend = ?config.cache.backend, "conversation cache ready");

    let transcripts = if config.transcripts.enabled {
        Some(Arc::new(TranscriptWriter::new(&config.transcripts.storage_root)))
    } else {
        None
    };
    tracing::info!(enabled = config.transcripts.enabled, "transcript writer configured");

    let feedback_writer = Arc::new(FeedbackWriter::new(&config.feedback.storage_root));

    let quota_limiters: Arc<Vec<Box<dyn QuotaLimiter>>> =
        Arc::new(vec![Box::new(DailyTokenLimiter::new(config.quota.clone()))]);

    let auth: Arc<dyn AuthModule> = match config.auth.module {
        AuthModuleKind::Noop => Arc::new(NoopAuth),
        AuthModuleKind::NoopWithToken => Arc::new(NoopWithTokenAuth),
        AuthModuleKind::K8s => {
            let k8s_config = config.auth.k8s.clone().context("auth.module = k8s requires [auth.k8s]")?;
            Arc::new(K8sAuth::new(k8s_config).context("constructing k8s auth module")?)
        }
        AuthModuleKind::JwkToken => {
            let jwk_config = config.auth.jwk.clone().context("auth.module = jwk-token requires [auth.jwk]")?;
            Arc::new(JwkTokenAuth::new(jwk_config).context("constructing jwk auth module")?)
        }
    };
    tracing::info!(module = ?config.auth.module, "auth module ready");

    let access_rules: Arc<Vec<AccessRule>> =
        Arc::new(config.auth.access_rules.iter().map(|r| r.resolve()).collect());

    let agents = Arc::new(AgentRegistry::new(upstream.clone()));
    let metrics = Arc::new(Metrics::new());
    let feedback_enabled = Arc::new(RwLock::new(config.feedback.enabled));

    Ok(AppState {
        config,
        upstream,
        cache,
        transcripts,
        quota_limiters,
        auth,
        access_rules,
        agents,
        metrics,
        feedback_writer,
        feedback_enabled,
    })
}
