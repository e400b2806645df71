//! Upstream turn-stream chunks and the SSE dialect emitted to clients
//! (§4.J). The upstream's wire format is duck-typed JSON dispatched on
//! `event_type` and, for step events, `step_type` — the dynamic-dispatch
//! redesign flag calls for encoding that as tagged variants instead of
//! string matching, so the mapping table lives in the streaming handler
//! as an exhaustive `match` over [`UpstreamChunk`].

use serde::{Deserialize, Serialize};
use std::pin::Pin;

pub type BoxStream<'a, T> = Pin<Box<dyn futures_core::Stream<Item = T> + Send + 'a>>;

/// `step_type` on step-scoped upstream events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepType {
    Inference,
    ShieldCall,
    ToolExecution,
}

/// A chunk of the upstream's turn-response stream, decoded from its
/// duck-typed JSON into a closed, exhaustively-matchable shape.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
#[allow(clippy::large_enum_variant)]
pub enum UpstreamChunk {
    TurnStart,
    TurnAwaitingInput,
    TurnComplete {
        turn: UpstreamTurn,
    },
    StepStart {
        step_type: StepType,
    },
    StepProgress {
        step_type: StepType,
        delta: StepDelta,
    },
    StepComplete {
        step_type: StepType,
        step_details: StepDetails,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamTurn {
    pub output_message: UpstreamMessage,
    #[serde(default)]
    pub usage: Usage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamMessage {
    pub content: String,
}

/// Incremental payload of a `step_progress` event.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepDelta {
    Text { text: String },
    ToolCall { tool_call: ToolCallDeltaValue },
}

/// A tool-call delta arrives either as a raw partial-JSON string
/// (still being assembled) or as a fully parsed object once the
/// upstream has enough to name the tool.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ToolCallDeltaValue {
    Raw(String),
    Parsed { tool_name: String },
}

/// Payload of a `step_complete` event; shape depends on `step_type`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum StepDetails {
    Shield {
        violation: Option<ShieldViolation>,
    },
    ToolExecution {
        #[serde(default)]
        tool_calls: Vec<CompletedToolCall>,
        #[serde(default)]
        tool_responses: Vec<CompletedToolResponse>,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShieldViolation {
    pub violation_level: String,
    pub user_message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompletedToolCall {
    pub tool_name: String,
    pub arguments: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompletedToolResponse {
    pub tool_name: String,
    pub content: serde_json::Value,
}

impl ShieldViolation {
    pub fn format(&self) -> String {
        format!("Violation: {}", self.user_message)
    }
}

/// The SSE event kinds a streaming query response can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SseEventKind {
    Start,
    Token,
    ToolCall,
    TurnComplete,
    Heartbeat,
    Error,
    End,
}

/// Wire shape: `{"event": <kind>, "data": {"id", "token", "role"?}}`.
#[derive(Debug, Clone, Serialize)]
pub struct SseMessage {
    pub event: SseEventKind,
    pub data: SseData,
}

#[derive(Debug, Clone, Serialize)]
pub struct SseData {
    pub id: u64,
    pub token: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<StepType>,
}

impl SseMessage {
    pub fn new(id: u64, event: SseEventKind, token: serde_json::Value, role: Option<StepType>) -> Self {
        Self {
            event,
            data: SseData { id, token, role },
        }
    }

    pub fn token(id: u64, text: impl Into<String>) -> Self {
        Self::new(id, SseEventKind::Token, serde_json::Value::String(text.into()), None)
    }

    pub fn empty_token(id: u64) -> Self {
        Self::token(id, String::new())
    }

    /// Render as a complete `data: <json>\n\n` SSE line.
    pub fn to_sse_line(&self) -> String {
        format!(
            "data: {}\n\n",
            serde_json::to_string(self).unwrap_or_else(|_| "{}".into())
        )
    }
}

/// Token usage reported by the upstream at turn completion, used for
/// quota consumption (§4.D) and the `llm_token_{sent,received}_total`
/// metrics (§4.L).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}
