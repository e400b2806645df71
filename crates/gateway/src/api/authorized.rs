//! `POST /authorized` (§6) — echoes back the identity `require_auth`
//! already resolved; any authenticated caller may call it.

use axum::Extension;
use axum::Json;
use serde::Serialize;

use gw_domain::auth::AuthTuple;

#[derive(Debug, Serialize)]
pub struct AuthorizedResponse {
    pub user_id: String,
    pub username: String,
}

pub async fn authorized(Extension(auth): Extension<AuthTuple>) -> Json<AuthorizedResponse> {
    Json(AuthorizedResponse { user_id: auth.user_id, username: auth.user_name })
}
