//! `GET /info, /models, /tools, /shields, /providers, /config` — thin
//! read-only passthroughs to the upstream and local config (§6).

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use gw_domain::error::Result;
use gw_domain::registry::{ModelInfo, ProviderInfo};

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct InfoResponse {
    pub version: String,
}

pub async fn info(State(state): State<AppState>) -> Result<Json<InfoResponse>> {
    let version = state.upstream.version().await?;
    Ok(Json(InfoResponse { version }))
}

pub async fn models(State(state): State<AppState>) -> Result<Json<Vec<ModelInfo>>> {
    Ok(Json(state.upstream.list_models().await?))
}

pub async fn tools(State(state): State<AppState>) -> Result<Json<Vec<String>>> {
    Ok(Json(state.upstream.list_toolgroups().await?))
}

#[derive(Debug, Serialize)]
pub struct ShieldResponse {
    pub identifier: String,
}

pub async fn shields(State(state): State<AppState>) -> Result<Json<Vec<ShieldResponse>>> {
    let shields = state
        .upstream
        .list_shields()
        .await?
        .into_iter()
        .map(|s| ShieldResponse { identifier: s.identifier })
        .collect();
    Ok(Json(shields))
}

pub async fn providers(State(state): State<AppState>) -> Result<Json<Vec<ProviderInfo>>> {
    Ok(Json(state.upstream.list_providers().await?))
}

pub async fn config(State(state): State<AppState>) -> Json<gw_domain::config::Config> {
    Json((*state.config).clone())
}
