pub mod authorized;
pub mod conversations;
pub mod feedback;
pub mod health;
pub mod metrics;
pub mod passthrough;
pub mod query;
pub mod shared;
pub mod streaming;

use axum::middleware;
use axum::routing::{delete, get, post, put};
use axum::Router;

use crate::authz::require_auth;
use crate::state::AppState;

/// Build the full API router.
///
/// Routes fall into three groups: the unversioned health probes (no auth
/// at all), the unversioned `/authorized` and `/metrics` endpoints (auth
/// runs, but `/authorized` has no per-action gate and `/metrics` gates on
/// `GET_METRICS` inside its handler), and the versioned `/v1`/`/v2`
/// surface (auth runs, each handler holds its own `Action` check).
pub fn router(state: AppState) -> Router<AppState> {
    let probes = Router::new()
        .route("/readiness", get(health::readiness))
        .route("/liveness", get(health::liveness));

    let authenticated = Router::new()
        .route("/authorized", post(authorized::authorized))
        .route("/metrics", get(metrics::metrics))
        .route("/v1/query", post(query::query))
        .route("/v1/streaming_query", post(streaming::streaming_query))
        .route("/v1/feedback", post(feedback::submit_feedback))
        .route("/v1/feedback/status", get(feedback::feedback_status))
        .route("/v1/feedback/status", put(feedback::set_feedback_status))
        .route("/v2/conversations", get(conversations::list_conversations))
        .route("/v2/conversations/:id", get(conversations::get_conversation))
        .route("/v2/conversations/:id", delete(conversations::delete_conversation))
        .route("/v2/conversations/:id", put(conversations::update_conversation))
        .route("/info", get(passthrough::info))
        .route("/models", get(passthrough::models))
        .route("/tools", get(passthrough::tools))
        .route("/shields", get(passthrough::shields))
        .route("/providers", get(passthrough::providers))
        .route("/config", get(passthrough::config))
        .route_layer(middleware::from_fn_with_state(state, require_auth));

    probes
        .merge(authenticated)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
