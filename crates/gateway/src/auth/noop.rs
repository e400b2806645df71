use super::{bearer_token, AuthModule};
use axum::http::request::Parts;
use gw_domain::auth::AuthTuple;
use gw_domain::error::Result;
use std::collections::HashSet;

const DEFAULT_UID: &str = "00000000-0000-0000-0000-000000000000";
const DEFAULT_NAME: &str = "default_user";

fn query_user_id(parts: &Parts) -> Option<String> {
    let query = parts.uri.query()?;
    query
        .split('&')
        .find_map(|pair| pair.strip_prefix("user_id="))
        .map(|v| v.to_string())
}

/// Dev-only: trusts the caller entirely, bypasses ownership checks. Logs
/// a prominent warning on every call so it's hard to miss in prod logs.
pub struct NoopAuth;

#[async_trait::async_trait]
impl AuthModule for NoopAuth {
    async fn authenticate(&self, parts: &Parts) -> Result<AuthTuple> {
        tracing::warn!("noop auth module active — every request is trusted as-is, DO NOT use in production");
        Ok(AuthTuple {
            user_id: query_user_id(parts).unwrap_or_else(|| DEFAULT_UID.to_string()),
            user_name: DEFAULT_NAME.to_string(),
            skip_user_id_check: true,
            token: String::new(),
            roles: HashSet::new(),
        })
    }
}

/// Same trust model as [`NoopAuth`], but also extracts the bearer token
/// so it can be forwarded to MCP servers (§4.G) even with auth disabled.
pub struct NoopWithTokenAuth;

#[async_trait::async_trait]
impl AuthModule for NoopWithTokenAuth {
    async fn authenticate(&self, parts: &Parts) -> Result<AuthTuple> {
        tracing::warn!("noop-with-token auth module active — every request is trusted as-is, DO NOT use in production");
        Ok(AuthTuple {
            user_id: query_user_id(parts).unwrap_or_else(|| DEFAULT_UID.to_string()),
            user_name: DEFAULT_NAME.to_string(),
            skip_user_id_check: true,
            token: bearer_token(parts).unwrap_or_default(),
            roles: HashSet::new(),
        })
    }
}
