//! Setup shared by the unary and streaming query handlers (§4.I steps
//! 1–7, reused verbatim by §4.J): authorization of model overrides,
//! conversation ownership, quota pre-check, model resolution, shields,
//! agent binding, and tool composition.

use axum::http::HeaderMap;
use gw_domain::attachment::Attachment;
use gw_domain::auth::{Action, AuthTuple, AuthorizedActions};
use gw_domain::conversation::{QueryRequest, UserConversation};
use gw_domain::error::{GatewayError, Result};
use gw_domain::registry::ModelInfo;
use gw_domain::tool::Message;
use gw_tools::{classify_shields, ToolComposer};
use gw_upstream::{CreateTurnRequest, ToolGroupDescriptor};

use crate::agent::BoundAgent;
use crate::state::AppState;

/// Tool name the upstream's RAG toolgroup reports on its completed-call
/// steps; used to recognize which tool responses to mine for referenced
/// documents (§4.M).
pub const KNOWLEDGE_SEARCH_TOOL_NAME: &str = "knowledge_search";

const SUMMARY_SYSTEM_PROMPT: &str =
    "Summarize the user's request in a short, descriptive topic title of a few words.";

pub struct TurnSetup {
    pub model: String,
    pub provider: String,
    pub bound_agent: BoundAgent,
    pub toolgroups: Option<Vec<ToolGroupDescriptor>>,
    pub provider_data_header: Option<serde_json::Value>,
    pub system_prompt: String,
    pub is_new_conversation: bool,
}

pub async fn prepare_turn(
    state: &AppState,
    auth: &AuthTuple,
    authorized: &AuthorizedActions,
    req: &QueryRequest,
    headers: &HeaderMap,
) -> Result<TurnSetup> {
    if req.requests_model_override() && !authorized.holds(Action::QueryOthersConversations) {
        return Err(GatewayError::Forbidden);
    }

    let existing = load_owned_conversation(state, auth, authorized, req.conversation_id.as_deref()).await?;
    let is_new_conversation = existing.is_none();

    for limiter in state.quota_limiters.iter() {
        limiter.ensure_available(&auth.user_id).await?;
    }

    let (provider, model) = resolve_model(state, req, existing.as_ref()).await?;

    let shields = state.upstream.list_shields().await?;
    let identifiers: Vec<String> = shields.into_iter().map(|s| s.identifier).collect();
    let classification = classify_shields(&identifiers);

    let system_prompt = req
        .system_prompt
        .clone()
        .unwrap_or_else(|| state.config.llm.default_system_prompt.clone());

    let bound_agent = state
        .agents
        .get_or_create_agent(
            &model,
            &system_prompt,
            classification.input_shields,
            classification.output_shields,
            req.conversation_id.as_deref(),
            req.no_tools,
        )
        .await?;

    let vector_dbs = state.upstream.list_vector_dbs().await?;
    let vector_db_ids: Vec<String> = vector_dbs.into_iter().map(|v| v.identifier).collect();
    let mcp_headers = headers.get("mcp-headers").and_then(|v| v.to_str().ok());
    let composer = ToolComposer::new(&state.config.mcp.servers);
    let composed = composer.compose(req.no_tools, &vector_db_ids, mcp_headers, Some(&auth.token));

    Ok(TurnSetup {
        model,
        provider,
        bound_agent,
        toolgroups: composed.toolgroups,
        provider_data_header: composed.provider_data_header,
        system_prompt,
        is_new_conversation,
    })
}

/// §4.I step 3: load the side-table row, 404 opaquely on mismatched
/// ownership unless the caller holds cross-user capability.
pub async fn load_owned_conversation(
    state: &AppState,
    auth: &AuthTuple,
    authorized: &AuthorizedActions,
    conv_id: Option<&str>,
) -> Result<Option<UserConversation>> {
    let Some(conv_id) = conv_id else {
        return Ok(None);
    };
    let skip_check = auth.skip_user_id_check || authorized.holds(Action::QueryOthersConversations);
    let conv = state
        .cache
        .get_conversation(&auth.user_id, conv_id, skip_check)
        .await?;
    match conv {
        Some(conv) => Ok(Some(conv)),
        None => Err(GatewayError::ConversationNotFound),
    }
}

async fn resolve_model(
    state: &AppState,
    req: &QueryRequest,
    existing: Option<&UserConversation>,
) -> Result<(String, String)> {
    let models = state.upstream.list_models().await?;
    let llm_models: Vec<&ModelInfo> = models.iter().filter(|m| m.model_type == "llm").collect();
    if llm_models.is_empty() {
        return Err(GatewayError::NoLlmAvailable);
    }

    let (provider, model) = if let (Some(p), Some(m)) = (&req.provider, &req.model) {
        (p.clone(), m.clone())
    } else if let Some(conv) = existing.filter(|c| !c.last_used_model.is_empty()) {
        (conv.last_used_provider.clone(), conv.last_used_model.clone())
    } else if let Some(default) = &state.config.llm.default_model {
        (default.provider.clone(), default.model.clone())
    } else {
        (llm_models[0].provider_id.clone(), llm_models[0].identifier.clone())
    };

    let found = llm_models
        .iter()
        .any(|m| m.provider_id == provider && m.identifier == model);
    if !found {
        return Err(GatewayError::ModelUnavailable(format!("{provider}/{model}")));
    }

    Ok((provider, model))
}

/// Turns request attachments into the upstream's `documents` array
/// (§4.I step 9's input side).
pub fn build_documents(attachments: &[Attachment]) -> Vec<serde_json::Value> {
    attachments
        .iter()
        .map(|a| serde_json::json!({"content": a.content, "mime_type": a.content_type}))
        .collect()
}

/// §4.I step 8: a one-shot topic-summary turn on a scratch agent, used
/// by both the unary and streaming handlers for a brand-new conversation.
/// Any failure collapses to an empty string rather than failing the turn.
pub async fn generate_topic_summary(state: &AppState, model: &str, query: &str) -> String {
    let outcome: Result<String> = async {
        let scratch = state
            .agents
            .get_or_create_agent(model, SUMMARY_SYSTEM_PROMPT, vec![], vec![], None, true)
            .await?;
        let request = CreateTurnRequest {
            messages: vec![Message::user(query.to_string())],
            documents: vec![],
            stream: false,
            toolgroups: None,
            tools: vec![],
        };
        let turn = state
            .upstream
            .create_turn(&scratch.agent_id, &scratch.session_id, &request, None)
            .await?;
        Ok(turn.output_message.content)
    }
    .await;

    outcome.unwrap_or_else(|e| {
        tracing::warn!(error = %e, "topic summary turn failed, using empty string");
        String::new()
    })
}
