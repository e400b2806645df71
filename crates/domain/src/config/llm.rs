//! Upstream LLM provider and model registry configuration (§3 `ModelInfo`
//! / `ProviderInfo`, §4.F agent registry).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LlmConfig {
    /// Base URL of the upstream inference stack (e.g. a Llama Stack
    /// distribution) that `gw-upstream` talks to.
    #[serde(default)]
    pub upstream_url: String,
    #[serde(default = "d_timeout_ms")]
    pub default_timeout_ms: u64,
    #[serde(default = "d_retries")]
    pub max_retries: u32,
    /// Model/provider pairs the gateway will accept in a request
    /// override; also advertised by `GET /v1/models`.
    #[serde(default)]
    pub models: Vec<ModelConfig>,
    /// The `(provider, model)` used when a request supplies neither.
    #[serde(default)]
    pub default_model: Option<ModelConfig>,
    /// System prompt used when neither the request nor a conversation
    /// supplies one.
    #[serde(default = "d_system_prompt")]
    pub default_system_prompt: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub provider: String,
    pub model: String,
}

fn d_timeout_ms() -> u64 {
    30_000
}

fn d_retries() -> u32 {
    2
}

fn d_system_prompt() -> String {
    "You are a helpful assistant.".into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_has_no_models() {
        let config = LlmConfig::default();
        assert!(config.models.is_empty());
        assert!(config.default_model.is_none());
    }

    #[test]
    fn models_deserialize() {
        let json = r#"{
            "models": [
                {"provider": "openai", "model": "gpt-4o"},
                {"provider": "anthropic", "model": "claude-sonnet"}
            ],
            "default_model": {"provider": "openai", "model": "gpt-4o"}
        }"#;
        let config: LlmConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.models.len(), 2);
        assert_eq!(config.default_model.unwrap().model, "gpt-4o");
    }
}
