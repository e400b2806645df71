//! Read-only passthrough DTOs surfaced by `GET /models`, `GET /providers`,
//! and `GET /readiness`, sourced from the upstream's `models.list` /
//! `providers.list` / `inspect.version`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub identifier: String,
    pub provider_id: String,
    pub model_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderInfo {
    pub identifier: String,
    pub provider_id: String,
    pub model_type: String,
}

/// Per-provider health, aggregated into the overall `GET /readiness`
/// 200/503 response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderHealth {
    pub provider: String,
    pub ready: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadinessReport {
    pub ready: bool,
    pub providers: Vec<ProviderHealth>,
}

impl ReadinessReport {
    pub fn from_providers(providers: Vec<ProviderHealth>) -> Self {
        let ready = !providers.is_empty() && providers.iter().all(|p| p.ready);
        Self { ready, providers }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ready_when_all_providers_ready() {
        let report = ReadinessReport::from_providers(vec![
            ProviderHealth {
                provider: "openai".into(),
                ready: true,
                reason: None,
            },
            ProviderHealth {
                provider: "anthropic".into(),
                ready: true,
                reason: None,
            },
        ]);
        assert!(report.ready);
    }

    #[test]
    fn not_ready_when_any_provider_unready() {
        let report = ReadinessReport::from_providers(vec![ProviderHealth {
            provider: "openai".into(),
            ready: false,
            reason: Some("connection refused".into()),
        }]);
        assert!(!report.ready);
    }

    #[test]
    fn not_ready_when_no_providers() {
        let report = ReadinessReport::from_providers(vec![]);
        assert!(!report.ready);
    }
}
