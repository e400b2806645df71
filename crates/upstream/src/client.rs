//! HTTP client for the upstream agent API (§6 External collaborators).
//!
//! Every method here is a thin, typed wrapper over one upstream REST
//! call. Nothing interprets the results — composing these calls into a
//! turn (agent create-then-swap, toolgroup assembly, shield
//! classification) is the gateway binary's job; this crate only speaks
//! the wire.

use crate::sse::{from_reqwest, upstream_chunk_stream};
use gw_domain::error::{GatewayError, Result};
use gw_domain::registry::{ModelInfo, ProviderInfo};
use gw_domain::stream::{BoxStream, Usage, UpstreamChunk};
use gw_domain::tool::{Message, ToolDefinition};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct UpstreamClient {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShieldInfo {
    pub identifier: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorDbInfo {
    pub identifier: String,
}

/// `{name, args}` — a single toolgroup descriptor handed to
/// `create_turn` (§4.G `rag_toolgroups`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolGroupDescriptor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateAgentParams {
    pub model: String,
    pub instructions: String,
    pub input_shields: Vec<String>,
    pub output_shields: Vec<String>,
    /// Disables the tool-call parser entirely (`no_tools`).
    pub enable_tool_parser: bool,
    /// `true` when the model family needs the dedicated parser
    /// (identifier starting with "granite", case-insensitive — §4.F).
    pub use_granite_tool_parser: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AgentHandle {
    pub agent_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionInfo {
    pub session_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateTurnRequest {
    pub messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub documents: Vec<serde_json::Value>,
    pub stream: bool,
    /// `None` is distinct from `Some(vec![])` — the upstream treats a
    /// null toolgroups list differently from an empty one (§4.G).
    pub toolgroups: Option<Vec<ToolGroupDescriptor>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TurnResult {
    pub output_message: TurnOutputMessage,
    #[serde(default)]
    pub steps: Vec<serde_json::Value>,
    #[serde(default)]
    pub usage: Usage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TurnOutputMessage {
    pub content: String,
}

impl UpstreamClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::UpstreamUnavailable(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        self.get_json("/v1/models").await
    }

    pub async fn list_shields(&self) -> Result<Vec<ShieldInfo>> {
        self.get_json("/v1/shields").await
    }

    pub async fn list_vector_dbs(&self) -> Result<Vec<VectorDbInfo>> {
        self.get_json("/v1/vector_dbs").await
    }

    pub async fn list_providers(&self) -> Result<Vec<ProviderInfo>> {
        self.get_json("/v1/providers").await
    }

    pub async fn list_toolgroups(&self) -> Result<Vec<String>> {
        self.get_json("/v1/toolgroups").await
    }

    pub async fn register_toolgroup(&self, descriptor: &ToolGroupDescriptor) -> Result<()> {
        self.post_json_no_body_response("/v1/toolgroups", descriptor).await
    }

    /// Returns `None` on a 404, which §4.F treats as "not fatal".
    pub async fn retrieve_agent(&self, agent_id: &str) -> Result<Option<AgentHandle>> {
        let response = self
            .http
            .get(self.url(&format!("/v1/agents/{agent_id}")))
            .send()
            .await
            .map_err(from_reqwest)?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            tracing::debug!(agent_id, "agent not found upstream, not fatal");
            return Ok(None);
        }
        Self::check_status(&response)?;
        response
            .json()
            .await
            .map(Some)
            .map_err(from_reqwest)
    }

    pub async fn create_agent(&self, params: &CreateAgentParams) -> Result<AgentHandle> {
        self.post_json("/v1/agents", params).await
    }

    pub async fn delete_agent(&self, agent_id: &str) -> Result<()> {
        let response = self
            .http
            .delete(self.url(&format!("/v1/agents/{agent_id}")))
            .send()
            .await
            .map_err(from_reqwest)?;
        Self::check_status(&response)
    }

    pub async fn create_session(&self, agent_id: &str) -> Result<SessionInfo> {
        self.post_json(&format!("/v1/agents/{agent_id}/session"), &serde_json::json!({}))
            .await
    }

    pub async fn list_sessions(&self, agent_id: &str) -> Result<Vec<SessionInfo>> {
        self.get_json(&format!("/v1/agents/{agent_id}/sessions")).await
    }

    pub async fn delete_session(&self, agent_id: &str, session_id: &str) -> Result<()> {
        let response = self
            .http
            .delete(self.url(&format!("/v1/agents/{agent_id}/session/{session_id}")))
            .send()
            .await
            .map_err(from_reqwest)?;
        Self::check_status(&response)
    }

    /// `provider_data` is serialized into the `X-LlamaStack-Provider-Data`
    /// header when set (§4.G); `None` omits the header entirely.
    pub async fn create_turn(
        &self,
        agent_id: &str,
        session_id: &str,
        request: &CreateTurnRequest,
        provider_data: Option<&serde_json::Value>,
    ) -> Result<TurnResult> {
        let mut builder = self
            .http
            .post(self.url(&format!("/v1/agents/{agent_id}/session/{session_id}/turn")))
            .json(request);
        if let Some(data) = provider_data {
            builder = builder.header("X-LlamaStack-Provider-Data", data.to_string());
        }
        let response = builder.send().await.map_err(from_reqwest)?;
        Self::check_status(&response)?;
        response.json().await.map_err(from_reqwest)
    }

    pub async fn create_turn_stream(
        &self,
        agent_id: &str,
        session_id: &str,
        request: &CreateTurnRequest,
        provider_data: Option<&serde_json::Value>,
    ) -> Result<BoxStream<'static, Result<UpstreamChunk>>> {
        let mut builder = self
            .http
            .post(self.url(&format!("/v1/agents/{agent_id}/session/{session_id}/turn")))
            .json(request);
        if let Some(data) = provider_data {
            builder = builder.header("X-LlamaStack-Provider-Data", data.to_string());
        }
        let response = builder.send().await.map_err(from_reqwest)?;
        Self::check_status(&response)?;
        Ok(upstream_chunk_stream(response))
    }

    pub async fn version(&self) -> Result<String> {
        #[derive(Deserialize)]
        struct VersionResponse {
            version: String,
        }
        let v: VersionResponse = self.get_json("/v1/inspect/version").await?;
        Ok(v.version)
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, path: &str) -> Result<T> {
        let response = self.http.get(self.url(path)).send().await.map_err(from_reqwest)?;
        Self::check_status(&response)?;
        response.json().await.map_err(from_reqwest)
    }

    async fn post_json<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &impl Serialize,
    ) -> Result<T> {
        let response = self
            .http
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(from_reqwest)?;
        Self::check_status(&response)?;
        response.json().await.map_err(from_reqwest)
    }

    async fn post_json_no_body_response(&self, path: &str, body: &impl Serialize) -> Result<()> {
        let response = self
            .http
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(from_reqwest)?;
        Self::check_status(&response)
    }

    fn check_status(response: &reqwest::Response) -> Result<()> {
        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(GatewayError::UpstreamRateLimited("unknown".into()));
        }
        if !status.is_success() {
            return Err(GatewayError::UpstreamUnavailable(format!(
                "upstream returned {status}"
            )));
        }
        Ok(())
    }
}
