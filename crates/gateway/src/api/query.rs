//! `POST /v1/query` — the unary query handler (§4.I).

use axum::extract::State;
use axum::http::HeaderMap;
use axum::{Extension, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use gw_domain::auth::{Action, AuthTuple, AuthorizedActions};
use gw_domain::conversation::{CacheEntry, QueryRequest, ReferencedDocument};
use gw_domain::error::{GatewayError, Result};
use gw_domain::stream::{StepDetails, StepType};
use gw_domain::tool::{Message, ToolCallSummary};
use gw_storage::{TranscriptMetadata, TranscriptRecord};
use gw_upstream::CreateTurnRequest;

use crate::api::shared::{build_documents, generate_topic_summary, prepare_turn, KNOWLEDGE_SEARCH_TOOL_NAME};
use crate::docs::parse_referenced_documents;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub conversation_id: String,
    pub response: String,
    pub rag_chunks: Vec<String>,
    pub tool_calls: Vec<ToolCallSummary>,
    pub referenced_documents: Vec<ReferencedDocument>,
    pub truncated: bool,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub available_quotas: Vec<u64>,
}

#[derive(Deserialize)]
struct RawStep {
    #[allow(dead_code)]
    step_type: StepType,
    step_details: StepDetails,
}

pub async fn query(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthTuple>,
    Extension(authorized): Extension<AuthorizedActions>,
    headers: HeaderMap,
    Json(req): Json<QueryRequest>,
) -> Result<Json<QueryResponse>> {
    if !authorized.holds(Action::Query) {
        return Err(GatewayError::Forbidden);
    }
    req.validate()?;

    let started_at = Utc::now();
    let setup = prepare_turn(&state, &auth, &authorized, &req, &headers).await?;

    let topic_summary = if setup.is_new_conversation {
        Some(generate_topic_summary(&state, &setup.model, &req.query).await)
    } else {
        None
    };

    let turn_request = CreateTurnRequest {
        messages: vec![Message::user(req.query.clone())],
        documents: build_documents(&req.attachments),
        stream: false,
        toolgroups: setup.toolgroups.clone(),
        tools: vec![],
    };

    let turn_result = state
        .upstream
        .create_turn(
            &setup.bound_agent.agent_id,
            &setup.bound_agent.session_id,
            &turn_request,
            setup.provider_data_header.as_ref(),
        )
        .await;

    let turn = match turn_result {
        Ok(turn) => turn,
        Err(GatewayError::UpstreamRateLimited(_)) => {
            return Err(GatewayError::UpstreamRateLimited(setup.model));
        }
        Err(e @ GatewayError::UpstreamUnavailable(_)) => {
            state.metrics.record_failure(&setup.provider, &setup.model);
            return Err(e);
        }
        Err(e) => return Err(e),
    };

    let response_text = turn.output_message.content.clone();
    let tool_calls = extract_tool_call_summaries(&turn.steps);
    let referenced_documents = extract_referenced_documents(&turn.steps);
    for _ in 0..count_shield_violations(&turn.steps) {
        state.metrics.record_validation_error(&setup.provider, &setup.model);
    }

    let completed_at = Utc::now();
    let conversation_id = setup.bound_agent.conversation_id.clone();

    if state.config.transcripts.enabled {
        if let Some(writer) = &state.transcripts {
            let record = TranscriptRecord {
                metadata: TranscriptMetadata {
                    user_id: auth.user_id.clone(),
                    conversation_id: conversation_id.clone(),
                    provider: setup.provider.clone(),
                    model: setup.model.clone(),
                    started_at,
                    completed_at,
                },
                query: req.query.clone(),
                validated: true,
                response: response_text.clone(),
                rag_chunks: vec![],
                truncated: false,
                attachments: req.attachments.clone(),
                tool_calls: tool_calls.clone(),
            };
            writer.write(&record)?;
        }
    }

    let cache_entry = CacheEntry {
        query: req.query.clone(),
        response: response_text.clone(),
        provider: setup.provider.clone(),
        model: setup.model.clone(),
        started_at,
        completed_at,
        referenced_documents: if referenced_documents.is_empty() {
            None
        } else {
            Some(referenced_documents.clone())
        },
        created_at: completed_at,
    };
    state
        .cache
        .insert(&auth.user_id, &conversation_id, cache_entry, auth.skip_user_id_check)
        .await?;

    if let Some(summary) = &topic_summary {
        state
            .cache
            .set_topic_summary(&auth.user_id, &conversation_id, summary, auth.skip_user_id_check)
            .await?;
    }

    let input_tokens = turn.usage.input_tokens;
    let output_tokens = turn.usage.output_tokens;
    for limiter in state.quota_limiters.iter() {
        limiter.consume(&auth.user_id, input_tokens, output_tokens).await?;
    }
    state.metrics.record_call(&setup.provider, &setup.model, input_tokens, output_tokens);

    let mut available_quotas = Vec::new();
    for limiter in state.quota_limiters.iter() {
        if let Some(remaining) = limiter.available(&auth.user_id).await? {
            available_quotas.push(remaining);
        }
    }

    Ok(Json(QueryResponse {
        conversation_id,
        response: response_text,
        rag_chunks: vec![],
        tool_calls,
        referenced_documents,
        truncated: false,
        input_tokens,
        output_tokens,
        available_quotas,
    }))
}

fn extract_tool_call_summaries(steps: &[serde_json::Value]) -> Vec<ToolCallSummary> {
    let mut out = Vec::new();
    for step in steps {
        let Ok(raw) = serde_json::from_value::<RawStep>(step.clone()) else {
            continue;
        };
        if let StepDetails::ToolExecution { tool_calls, tool_responses } = raw.step_details {
            for (i, call) in tool_calls.iter().enumerate() {
                let response = tool_responses.get(i).map(|r| r.content.to_string());
                out.push(ToolCallSummary {
                    id: i.to_string(),
                    name: call.tool_name.clone(),
                    args: call.arguments.clone(),
                    response,
                });
            }
        }
    }
    out
}

fn extract_referenced_documents(steps: &[serde_json::Value]) -> Vec<ReferencedDocument> {
    let mut seen = std::collections::HashSet::new();
    let mut docs = Vec::new();
    for step in steps {
        let Ok(raw) = serde_json::from_value::<RawStep>(step.clone()) else {
            continue;
        };
        if let StepDetails::ToolExecution { tool_responses, .. } = raw.step_details {
            for response in tool_responses {
                if response.tool_name != KNOWLEDGE_SEARCH_TOOL_NAME {
                    continue;
                }
                let text = response.content.as_str().unwrap_or_default();
                for doc in parse_referenced_documents(text) {
                    let key = (doc.doc_url.clone(), doc.doc_title.clone());
                    if seen.insert(key) {
                        docs.push(doc);
                    }
                }
            }
        }
    }
    docs
}

fn count_shield_violations(steps: &[serde_json::Value]) -> u64 {
    steps
        .iter()
        .filter(|step| {
            serde_json::from_value::<RawStep>((*step).clone())
                .ok()
                .map(|raw| matches!(raw.step_details, StepDetails::Shield { violation: Some(_) }))
                .unwrap_or(false)
        })
        .count() as u64
}
