pub mod client;
pub mod sse;

pub use client::{
    AgentHandle, CreateAgentParams, CreateTurnRequest, SessionInfo, ShieldInfo, ToolGroupDescriptor,
    TurnOutputMessage, TurnResult, UpstreamClient, VectorDbInfo,
};
