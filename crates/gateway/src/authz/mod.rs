//! Authorization middleware (§4.C). Runs once per protected request:
//! authenticates, resolves roles and the full authorized-action set, and
//! stores both as request extensions. The per-action 403 check itself
//! happens in each handler, which is also where step 4's "consult
//! fine-grained capabilities" (e.g. `QUERY_OTHERS_CONVERSATIONS`) lives.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use gw_domain::auth::{actions_for, resolve_roles, AuthorizedActions};

use crate::state::AppState;

pub async fn require_auth(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let (mut parts, body) = request.into_parts();

    let auth = match state.auth.authenticate(&parts).await {
        Ok(auth) => auth,
        Err(e) => return e.into_response(),
    };

    let roles = resolve_roles(&auth);
    let authorized: AuthorizedActions = actions_for(&roles, &state.access_rules);

    parts.extensions.insert(auth);
    parts.extensions.insert(authorized);

    let request = Request::from_parts(parts, body);
    next.run(request).await
}
