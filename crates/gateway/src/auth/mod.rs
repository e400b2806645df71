//! Pluggable auth modules (§4.B). Each produces an [`AuthTuple`] from the
//! request parts; which one is active is a startup config choice, not a
//! per-request decision.

mod jwk;
mod k8s;
mod noop;

pub use jwk::JwkTokenAuth;
pub use k8s::K8sAuth;
pub use noop::{NoopAuth, NoopWithTokenAuth};

use axum::http::request::Parts;
use gw_domain::auth::AuthTuple;
use gw_domain::error::Result;

#[async_trait::async_trait]
pub trait AuthModule: Send + Sync {
    async fn authenticate(&self, parts: &Parts) -> Result<AuthTuple>;
}

pub(crate) fn bearer_token(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
}
