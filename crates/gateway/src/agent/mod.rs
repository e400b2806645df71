//! Agent registry (§4.F): the create-then-swap dance needed because the
//! upstream assigns agent ids at creation time, so reusing a
//! conversation's id as its agent id means creating a throwaway agent
//! first and discarding it once the real one is confirmed to exist.

use gw_domain::error::{GatewayError, Result};
use gw_upstream::{CreateAgentParams, UpstreamClient};

const GRANITE_PREFIX: &str = "granite";

/// `(agent_id, conversation_id, session_id)` — `agent_id` and
/// `conversation_id` are always equal per the binding invariant; kept
/// as two fields because callers read them for different purposes.
pub struct BoundAgent {
    pub agent_id: String,
    pub conversation_id: String,
    pub session_id: String,
}

pub struct AgentRegistry {
    client: UpstreamClient,
}

impl AgentRegistry {
    pub fn new(client: UpstreamClient) -> Self {
        Self { client }
    }

    fn uses_granite_tool_parser(model: &str) -> bool {
        model.to_ascii_lowercase().starts_with(GRANITE_PREFIX)
    }

    pub async fn get_or_create_agent(
        &self,
        model: &str,
        system_prompt: &str,
        input_shields: Vec<String>,
        output_shields: Vec<String>,
        conversation_id: Option<&str>,
        no_tools: bool,
    ) -> Result<BoundAgent> {
        let existing = match conversation_id {
            Some(id) => self.client.retrieve_agent(id).await?,
            None => None,
        };

        let params = CreateAgentParams {
            model: model.to_string(),
            instructions: system_prompt.to_string(),
            input_shields,
            output_shields,
            enable_tool_parser: !no_tools,
            use_granite_tool_parser: Self::uses_granite_tool_parser(model),
        };
        let created = self.client.create_agent(&params).await?;

        if existing.is_some() {
            let conv_id = conversation_id.expect("existing agent implies conversation_id was given").to_string();

            self.client.delete_agent(&created.agent_id).await?;

            let sessions = self.client.list_sessions(&conv_id).await?;
            let session = sessions.into_iter().next().ok_or(GatewayError::ConversationNotFound)?;

            Ok(BoundAgent {
                agent_id: conv_id.clone(),
                conversation_id: conv_id,
                session_id: session.session_id,
            })
        } else {
            let conv_id = created.agent_id;
            let session = self.client.create_session(&conv_id).await?;

            Ok(BoundAgent {
                agent_id: conv_id.clone(),
                conversation_id: conv_id,
                session_id: session.session_id,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn granite_family_is_case_insensitive() {
        assert!(AgentRegistry::uses_granite_tool_parser("Granite-8b"));
        assert!(AgentRegistry::uses_granite_tool_parser("granite-3-2b"));
        assert!(!AgentRegistry::uses_granite_tool_parser("llama-3.1-8b"));
    }
}
