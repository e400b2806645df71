//! `GET/DELETE/PUT /v2/conversations[/{id}]` (§6).

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use gw_domain::auth::{Action, AuthTuple, AuthorizedActions};
use gw_domain::conversation::{CacheEntry, ConversationData, UserConversation};
use gw_domain::error::{GatewayError, Result};

use crate::api::shared::load_owned_conversation;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ConversationDetail {
    pub conversation: UserConversation,
    pub history: Vec<CacheEntry>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateConversationRequest {
    pub topic_summary: String,
}

fn skip_check(auth: &AuthTuple, authorized: &AuthorizedActions) -> bool {
    auth.skip_user_id_check || authorized.holds(Action::QueryOthersConversations)
}

pub async fn list_conversations(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthTuple>,
    Extension(authorized): Extension<AuthorizedActions>,
) -> Result<Json<Vec<ConversationData>>> {
    if !authorized.holds(Action::ListConversations) {
        return Err(GatewayError::Forbidden);
    }
    let conversations = state.cache.list(&auth.user_id, skip_check(&auth, &authorized)).await?;
    Ok(Json(conversations))
}

pub async fn get_conversation(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthTuple>,
    Extension(authorized): Extension<AuthorizedActions>,
    Path(id): Path<String>,
) -> Result<Json<ConversationDetail>> {
    if !authorized.holds(Action::GetConversation) {
        return Err(GatewayError::Forbidden);
    }
    let conversation = load_owned_conversation(&state, &auth, &authorized, Some(&id))
        .await?
        .ok_or(GatewayError::ConversationNotFound)?;
    let history = state.cache.get(&auth.user_id, &id, skip_check(&auth, &authorized)).await?;
    Ok(Json(ConversationDetail { conversation, history }))
}

pub async fn delete_conversation(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthTuple>,
    Extension(authorized): Extension<AuthorizedActions>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    if !authorized.holds(Action::DeleteConversation) {
        return Err(GatewayError::Forbidden);
    }
    load_owned_conversation(&state, &auth, &authorized, Some(&id)).await?;
    let deleted = state.cache.delete(&auth.user_id, &id, skip_check(&auth, &authorized)).await?;
    if deleted {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(GatewayError::ConversationNotFound)
    }
}

pub async fn update_conversation(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthTuple>,
    Extension(authorized): Extension<AuthorizedActions>,
    Path(id): Path<String>,
    Json(req): Json<UpdateConversationRequest>,
) -> Result<Json<UserConversation>> {
    if !authorized.holds(Action::UpdateConversation) {
        return Err(GatewayError::Forbidden);
    }
    load_owned_conversation(&state, &auth, &authorized, Some(&id)).await?;
    let skip = skip_check(&auth, &authorized);
    state
        .cache
        .set_topic_summary(&auth.user_id, &id, &req.topic_summary, skip)
        .await?;
    let updated = state
        .cache
        .get_conversation(&auth.user_id, &id, skip)
        .await?
        .ok_or(GatewayError::ConversationNotFound)?;
    Ok(Json(updated))
}
