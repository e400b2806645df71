//! `GET /readiness`, `GET /liveness` (§6) — unauthenticated probes.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use gw_domain::registry::{ProviderHealth, ReadinessReport};

use crate::state::AppState;

pub async fn readiness(State(state): State<AppState>) -> (StatusCode, Json<ReadinessReport>) {
    let providers = match state.upstream.list_providers().await {
        Ok(providers) => providers
            .into_iter()
            .map(|p| ProviderHealth { provider: p.identifier, ready: true, reason: None })
            .collect(),
        Err(e) => vec![ProviderHealth {
            provider: "upstream".into(),
            ready: false,
            reason: Some(e.to_string()),
        }],
    };
    let report = ReadinessReport::from_providers(providers);
    let status = if report.ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status, Json(report))
}

pub async fn liveness() -> StatusCode {
    StatusCode::OK
}
