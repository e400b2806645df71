//! `POST /v1/streaming_query` — the SSE state machine of §4.J.

use std::convert::Infallible;

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderMap};
use axum::response::Response;
use axum::{Extension, Json};
use chrono::Utc;
use futures_util::StreamExt;
use serde_json::json;

use gw_domain::auth::{Action, AuthTuple, AuthorizedActions};
use gw_domain::conversation::{CacheEntry, QueryRequest, ReferencedDocument};
use gw_domain::error::{GatewayError, Result};
use gw_domain::stream::{SseEventKind, SseMessage, StepDelta, StepDetails, StepType, ToolCallDeltaValue, Usage, UpstreamChunk};
use gw_domain::tool::Message;
use gw_storage::{TranscriptMetadata, TranscriptRecord};
use gw_upstream::CreateTurnRequest;

use crate::api::shared::{build_documents, generate_topic_summary, prepare_turn, KNOWLEDGE_SEARCH_TOOL_NAME};
use crate::docs::parse_referenced_documents;
use crate::state::AppState;

pub async fn streaming_query(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthTuple>,
    Extension(authorized): Extension<AuthorizedActions>,
    headers: HeaderMap,
    Json(req): Json<QueryRequest>,
) -> Result<Response> {
    if !authorized.holds(Action::StreamingQuery) {
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
        stream: true,
        toolgroups: setup.toolgroups.clone(),
        tools: vec![],
    };

    let chunk_stream = state
        .upstream
        .create_turn_stream(
            &setup.bound_agent.agent_id,
            &setup.bound_agent.session_id,
            &turn_request,
            setup.provider_data_header.as_ref(),
        )
        .await;

    let chunk_stream = match chunk_stream {
        Ok(s) => s,
        Err(GatewayError::UpstreamRateLimited(_)) => {
            return Err(GatewayError::UpstreamRateLimited(setup.model));
        }
        Err(e @ GatewayError::UpstreamUnavailable(_)) => {
            state.metrics.record_failure(&setup.provider, &setup.model);
            return Err(e);
        }
        Err(e) => return Err(e),
    };

    let conversation_id = setup.bound_agent.conversation_id.clone();
    let body = run_state_machine(
        state,
        auth,
        setup.provider,
        setup.model,
        conversation_id,
        topic_summary,
        req,
        started_at,
        chunk_stream,
    );

    Ok(Response::builder()
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .body(Body::from_stream(body.map(Ok::<String, Infallible>)))
        .unwrap())
}

/// Drives the upstream chunk stream to completion, yielding one `data:
/// <json>\n\n` line per emitted SSE event (§4.J). Persistence (transcript,
/// cache, quota) runs only after the upstream stream is fully drained —
/// a client disconnect drops this generator before that point runs, so
/// no partial transcript or cache entry survives an abort.
fn run_state_machine(
    state: AppState,
    auth: AuthTuple,
    provider: String,
    model: String,
    conversation_id: String,
    topic_summary: Option<String>,
    req: QueryRequest,
    started_at: chrono::DateTime<Utc>,
    mut chunks: gw_domain::stream::BoxStream<'static, Result<UpstreamChunk>>,
) -> impl futures_core::Stream<Item = String> {
    async_stream::stream! {
        let mut id: u64 = 0;
        let mut final_response = String::new();
        let mut seen_docs = std::collections::HashSet::new();
        let mut referenced_documents: Vec<ReferencedDocument> = Vec::new();
        let mut usage = Usage::default();

        yield SseMessage::new(id, SseEventKind::Start, json!({"conversation_id": conversation_id}), None).to_sse_line();
        id += 1;

        loop {
            let next = chunks.next().await;
            let Some(item) = next else { break };

            match item {
                Ok(chunk) => {
                    for msg in dispatch_chunk(&state, &provider, &model, id, chunk, &mut final_response, &mut seen_docs, &mut referenced_documents, &mut usage) {
                        id += 1;
                        yield msg.to_sse_line();
                    }
                }
                Err(e) => {
                    yield SseMessage::new(id, SseEventKind::Error, json!(e.to_string()), None).to_sse_line();
                    id += 1;
                }
            }
        }

        let completed_at = Utc::now();
        persist_turn(
            &state,
            &auth,
            &provider,
            &model,
            &conversation_id,
            topic_summary.as_deref(),
            &req,
            started_at,
            completed_at,
            &final_response,
            &referenced_documents,
            usage,
        )
        .await;

        yield SseMessage::new(
            id,
            SseEventKind::End,
            json!({
                "referenced_documents": referenced_documents,
                "input_tokens": 0,
                "output_tokens": 0,
                "available_quotas": serde_json::Value::Null,
            }),
            None,
        )
        .to_sse_line();
    }
}

fn dispatch_chunk(
    state: &AppState,
    provider: &str,
    model: &str,
    id: u64,
    chunk: UpstreamChunk,
    final_response: &mut String,
    seen_docs: &mut std::collections::HashSet<(String, String)>,
    referenced_documents: &mut Vec<ReferencedDocument>,
    usage: &mut Usage,
) -> Vec<SseMessage> {
    match chunk {
        UpstreamChunk::TurnStart | UpstreamChunk::TurnAwaitingInput => {
            vec![SseMessage::empty_token(id)]
        }
        UpstreamChunk::TurnComplete { turn } => {
            final_response.clear();
            final_response.push_str(&turn.output_message.content);
            *usage = turn.usage;
            vec![SseMessage::new(
                id,
                SseEventKind::TurnComplete,
                json!(turn.output_message.content),
                None,
            )]
        }
        UpstreamChunk::StepStart { step_type } => match step_type {
            StepType::ToolExecution => vec![SseMessage::new(id, SseEventKind::ToolCall, json!(""), None)],
            StepType::Inference => vec![SseMessage::empty_token(id)],
            StepType::ShieldCall => vec![SseMessage::new(id, SseEventKind::Heartbeat, json!(""), None)],
        },
        UpstreamChunk::StepProgress { step_type: StepType::Inference, delta } => match delta {
            StepDelta::Text { text } => vec![SseMessage::token(id, text)],
            StepDelta::ToolCall { tool_call: ToolCallDeltaValue::Raw(raw) } => {
                vec![SseMessage::new(id, SseEventKind::ToolCall, json!(raw), None)]
            }
            StepDelta::ToolCall { tool_call: ToolCallDeltaValue::Parsed { tool_name } } => {
                vec![SseMessage::new(id, SseEventKind::ToolCall, json!(tool_name), None)]
            }
        },
        UpstreamChunk::StepComplete { step_type: StepType::ShieldCall, step_details: StepDetails::Shield { violation } } => {
            match violation {
                None => vec![SseMessage::token(id, "No Violation")],
                Some(v) => {
                    state.metrics.record_validation_error(provider, model);
                    vec![SseMessage::token(id, v.format())]
                }
            }
        }
        UpstreamChunk::StepComplete { step_type: StepType::ToolExecution, step_details: StepDetails::ToolExecution { tool_calls, tool_responses } } => {
            let mut out = Vec::new();
            let mut next_id = id;
            for call in &tool_calls {
                out.push(SseMessage::new(
                    next_id,
                    SseEventKind::ToolCall,
                    json!({"tool_name": call.tool_name, "arguments": call.arguments}),
                    None,
                ));
                next_id += 1;
            }
            for response in &tool_responses {
                if response.tool_name == KNOWLEDGE_SEARCH_TOOL_NAME {
                    let text = response.content.as_str().unwrap_or_default();
                    for doc in parse_referenced_documents(text) {
                        let key = (doc.doc_url.clone(), doc.doc_title.clone());
                        if seen_docs.insert(key) {
                            referenced_documents.push(doc);
                        }
                    }
                    out.push(SseMessage::new(
                        next_id,
                        SseEventKind::ToolCall,
                        json!({"tool_name": response.tool_name, "response": "referenced documents retrieved"}),
                        None,
                    ));
                } else {
                    out.push(SseMessage::new(
                        next_id,
                        SseEventKind::ToolCall,
                        json!({"tool_name": response.tool_name, "response": response.content}),
                        None,
                    ));
                }
                next_id += 1;
            }
            // Re-number from `id` since the caller bumps `id` once per message.
            out.into_iter()
                .enumerate()
                .map(|(offset, mut msg)| {
                    msg.data.id = id + offset as u64;
                    msg
                })
                .collect()
        }
        _ => vec![SseMessage::new(id, SseEventKind::Heartbeat, json!(""), None)],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn test_state() -> AppState {
        let config = std::sync::Arc::new(gw_domain::config::Config::default());
        let upstream = gw_upstream::UpstreamClient::new("http://localhost:1", std::time::Duration::from_secs(1)).unwrap();
        AppState {
            config,
            upstream: upstream.clone(),
            cache: std::sync::Arc::new(gw_storage::NoopCache),
            transcripts: None,
            quota_limiters: std::sync::Arc::new(vec![]),
            auth: std::sync::Arc::new(crate::auth::NoopAuth),
            access_rules: std::sync::Arc::new(vec![]),
            agents: std::sync::Arc::new(crate::agent::AgentRegistry::new(upstream)),
            metrics: std::sync::Arc::new(crate::metrics::Metrics::new()),
            feedback_writer: std::sync::Arc::new(gw_storage::FeedbackWriter::new("/tmp/gateway-test-feedback")),
            feedback_enabled: std::sync::Arc::new(parking_lot::RwLock::new(false)),
        }
    }

    fn dispatch(state: &AppState, id: u64, chunk: UpstreamChunk) -> Vec<SseMessage> {
        let mut final_response = String::new();
        let mut seen_docs = HashSet::new();
        let mut referenced_documents = Vec::new();
        let mut usage = Usage::default();
        dispatch_chunk(state, "openai", "gpt-4o", id, chunk, &mut final_response, &mut seen_docs, &mut referenced_documents, &mut usage)
    }

    #[test]
    fn turn_start_emits_one_empty_token() {
        let state = test_state();
        let msgs = dispatch(&state, 0, UpstreamChunk::TurnStart);
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].event, SseEventKind::Token);
        assert_eq!(msgs[0].data.token, json!(""));
    }

    #[test]
    fn inference_step_start_emits_empty_token() {
        let state = test_state();
        let msgs = dispatch(&state, 1, UpstreamChunk::StepStart { step_type: StepType::Inference });
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].event, SseEventKind::Token);
    }

    #[test]
    fn text_delta_emits_token_with_text() {
        let state = test_state();
        let msgs = dispatch(
            &state,
            2,
            UpstreamChunk::StepProgress { step_type: StepType::Inference, delta: StepDelta::Text { text: "he".into() } },
        );
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].data.token, json!("he"));
    }

    #[test]
    fn turn_complete_emits_full_response() {
        let state = test_state();
        let msgs = dispatch(
            &state,
            4,
            UpstreamChunk::TurnComplete {
                turn: gw_domain::stream::UpstreamTurn {
                    output_message: gw_domain::stream::UpstreamMessage { content: "hello".into() },
                    usage: Usage { input_tokens: 3, output_tokens: 5 },
                },
            },
        );
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].event, SseEventKind::TurnComplete);
        assert_eq!(msgs[0].data.token, json!("hello"));
    }

    #[test]
    fn shield_violation_emits_token_and_records_metric() {
        let state = test_state();
        let before = state.metrics.llm_calls_validation_errors_total.with_label_values(&["openai", "gpt-4o"]).get();
        let msgs = dispatch(
            &state,
            5,
            UpstreamChunk::StepComplete {
                step_type: StepType::ShieldCall,
                step_details: StepDetails::Shield {
                    violation: Some(gw_domain::stream::ShieldViolation {
                        violation_level: "error".into(),
                        user_message: "unsafe".into(),
                    }),
                },
            },
        );
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].event, SseEventKind::Token);
        assert_eq!(msgs[0].data.token, json!("Violation: unsafe"));
        let after = state.metrics.llm_calls_validation_errors_total.with_label_values(&["openai", "gpt-4o"]).get();
        assert_eq!(after, before + 1);
    }

    #[test]
    fn shield_no_violation_emits_plain_token_without_metric() {
        let state = test_state();
        let before = state.metrics.llm_calls_validation_errors_total.with_label_values(&["openai", "gpt-4o"]).get();
        let msgs = dispatch(
            &state,
            6,
            UpstreamChunk::StepComplete { step_type: StepType::ShieldCall, step_details: StepDetails::Shield { violation: None } },
        );
        assert_eq!(msgs[0].data.token, json!("No Violation"));
        let after = state.metrics.llm_calls_validation_errors_total.with_label_values(&["openai", "gpt-4o"]).get();
        assert_eq!(after, before);
    }

    #[tokio::test]
    async fn full_sequence_ids_strictly_increase_from_zero_with_one_start_and_one_end() {
        let state = test_state();
        let chunks: Vec<Result<UpstreamChunk>> = vec![
            Ok(UpstreamChunk::TurnStart),
            Ok(UpstreamChunk::StepStart { step_type: StepType::Inference }),
            Ok(UpstreamChunk::StepProgress { step_type: StepType::Inference, delta: StepDelta::Text { text: "he".into() } }),
            Ok(UpstreamChunk::StepProgress { step_type: StepType::Inference, delta: StepDelta::Text { text: "llo".into() } }),
            Ok(UpstreamChunk::TurnComplete {
                turn: gw_domain::stream::UpstreamTurn {
                    output_message: gw_domain::stream::UpstreamMessage { content: "hello".into() },
                    usage: Usage::default(),
                },
            }),
        ];
        let stream: gw_domain::stream::BoxStream<'static, Result<UpstreamChunk>> = Box::pin(futures_util::stream::iter(chunks));

        let lines: Vec<String> = run_state_machine(
            state,
            AuthTuple { user_id: "u1".into(), user_name: "u1".into(), skip_user_id_check: true, token: String::new(), roles: HashSet::new() },
            "openai".into(),
            "gpt-4o".into(),
            "c1".into(),
            None,
            QueryRequest { query: "hi".into(), conversation_id: None, provider: None, model: None, system_prompt: None, attachments: vec![], no_tools: false },
            Utc::now(),
            stream,
        )
        .collect()
        .await;

        assert!(lines[0].contains("\"event\":\"start\""));
        assert!(lines.last().unwrap().contains("\"event\":\"end\""));

        let ids: Vec<u64> = lines
            .iter()
            .map(|line| {
                let body = line.trim_start_matches("data: ").trim_end();
                let value: serde_json::Value = serde_json::from_str(body).unwrap();
                value["data"]["id"].as_u64().unwrap()
            })
            .collect();
        for (i, id) in ids.iter().enumerate() {
            assert_eq!(*id, i as u64);
        }

        let start_count = lines.iter().filter(|l| l.contains("\"event\":\"start\"")).count();
        let end_count = lines.iter().filter(|l| l.contains("\"event\":\"end\"")).count();
        assert_eq!(start_count, 1);
        assert_eq!(end_count, 1);
    }
}

#[allow(clippy::too_many_arguments)]
async fn persist_turn(
    state: &AppState,
    auth: &AuthTuple,
    provider: &str,
    model: &str,
    conversation_id: &str,
    topic_summary: Option<&str>,
    req: &QueryRequest,
    started_at: chrono::DateTime<Utc>,
    completed_at: chrono::DateTime<Utc>,
    response: &str,
    referenced_documents: &[ReferencedDocument],
    usage: Usage,
) {
    if state.config.transcripts.enabled {
        if let Some(writer) = &state.transcripts {
            let record = TranscriptRecord {
                metadata: TranscriptMetadata {
                    user_id: auth.user_id.clone(),
                    conversation_id: conversation_id.to_string(),
                    provider: provider.to_string(),
                    model: model.to_string(),
                    started_at,
                    completed_at,
                },
                query: req.query.clone(),
                validated: true,
                response: response.to_string(),
                rag_chunks: vec![],
                truncated: false,
                attachments: req.attachments.clone(),
                tool_calls: vec![],
            };
            if let Err(e) = writer.write(&record) {
                tracing::error!(error = %e, "failed to write transcript for streaming turn");
            }
        }
    }

    let cache_entry = CacheEntry {
        query: req.query.clone(),
        response: response.to_string(),
        provider: provider.to_string(),
        model: model.to_string(),
        started_at,
        completed_at,
        referenced_documents: if referenced_documents.is_empty() {
            None
        } else {
            Some(referenced_documents.to_vec())
        },
        created_at: completed_at,
    };
    if let Err(e) = state
        .cache
        .insert(&auth.user_id, conversation_id, cache_entry, auth.skip_user_id_check)
        .await
    {
        tracing::error!(error = %e, "failed to persist cache entry for streaming turn");
    }

    if let Some(summary) = topic_summary {
        if let Err(e) = state
            .cache
            .set_topic_summary(&auth.user_id, conversation_id, summary, auth.skip_user_id_check)
            .await
        {
            tracing::error!(error = %e, "failed to persist topic summary for streaming turn");
        }
    }

    for limiter in state.quota_limiters.iter() {
        if let Err(e) = limiter.consume(&auth.user_id, usage.input_tokens, usage.output_tokens).await {
            tracing::error!(error = %e, "failed to consume quota for streaming turn");
        }
    }
    state.metrics.record_call(provider, model, usage.input_tokens, usage.output_tokens);
}
