//! `GET /metrics` (§4.L) — Prometheus text exposition.

use axum::extract::State;
use axum::http::header;
use axum::Extension;

use gw_domain::auth::{Action, AuthorizedActions};
use gw_domain::error::{GatewayError, Result};

use crate::state::AppState;

pub async fn metrics(
    State(state): State<AppState>,
    Extension(authorized): Extension<AuthorizedActions>,
) -> Result<([(header::HeaderName, &'static str); 1], String)> {
    if !authorized.holds(Action::GetMetrics) {
        return Err(GatewayError::Forbidden);
    }

    Ok(([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], state.metrics.render()))
}
