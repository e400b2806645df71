//! JWK-token auth module (§4.B `jwk-token`). Fetches a JWK set from a
//! configured URL, caches it for a TTL, and decodes/validates bearer
//! JWTs against it. A single async lock serializes refreshes so a cache
//! miss under concurrent load triggers one fetch, not a stampede.

use super::{bearer_token, AuthModule};
use axum::http::request::Parts;
use gw_domain::auth::AuthTuple;
use gw_domain::config::JwkAuthConfig;
use gw_domain::error::{GatewayError, Result};
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

const DEFAULT_UID: &str = "00000000-0000-0000-0000-000000000000";
const DEFAULT_NAME: &str = "anonymous";

pub struct JwkTokenAuth {
    http: reqwest::Client,
    config: JwkAuthConfig,
    cache: Mutex<Option<CachedJwks>>,
}

struct CachedJwks {
    keys: Vec<JwkKey>,
    fetched_at: Instant,
}

#[derive(Deserialize, Clone)]
struct JwkSet {
    keys: Vec<Value>,
}

#[derive(Clone)]
struct JwkKey {
    kid: Option<String>,
    alg: Option<String>,
    raw: Value,
}

impl From<Value> for JwkKey {
    fn from(raw: Value) -> Self {
        let kid = raw.get("kid").and_then(|v| v.as_str()).map(str::to_string);
        let alg = raw.get("alg").and_then(|v| v.as_str()).map(str::to_string);
        Self { kid, alg, raw }
    }
}

impl JwkTokenAuth {
    pub fn new(config: JwkAuthConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| GatewayError::UpstreamUnavailable(e.to_string()))?;
        Ok(Self {
            http,
            config,
            cache: Mutex::new(None),
        })
    }

    async fn keys(&self) -> Result<Vec<JwkKey>> {
        let ttl = Duration::from_secs(self.config.cache_ttl_secs);
        let mut guard = self.cache.lock().await;
        if let Some(cached) = guard.as_ref() {
            if cached.fetched_at.elapsed() < ttl {
                return Ok(cached.keys.clone());
            }
        }

        let response = self
            .http
            .get(&self.config.jwks_url)
            .send()
            .await
            .map_err(|e| GatewayError::UpstreamUnavailable(e.to_string()))?;
        if !response.status().is_success() {
            return Err(GatewayError::UpstreamUnavailable(format!(
                "jwks endpoint returned {}",
                response.status()
            )));
        }
        let set: JwkSet = response
            .json()
            .await
            .map_err(|e| GatewayError::UpstreamUnavailable(e.to_string()))?;

        let keys: Vec<JwkKey> = set.keys.into_iter().map(JwkKey::from).collect();
        *guard = Some(CachedJwks {
            keys: keys.clone(),
            fetched_at: Instant::now(),
        });
        Ok(keys)
    }

    fn resolve_key(keys: &[JwkKey], kid: Option<&str>, alg: Algorithm) -> Option<DecodingKey> {
        let candidate = if let Some(kid) = kid {
            keys.iter().find(|k| k.kid.as_deref() == Some(kid))
        } else {
            keys.iter().find(|k| {
                k.alg
                    .as_deref()
                    .map(|a| a.eq_ignore_ascii_case(&format!("{alg:?}")))
                    .unwrap_or(false)
            })
        };
        let key = candidate.or_else(|| keys.first())?;
        DecodingKey::from_jwk(&serde_json::from_value(key.raw.clone()).ok()?).ok()
    }

    fn extract_claim<'a>(claims: &'a Value, dotted_path: &str) -> Option<&'a Value> {
        dotted_path
            .split('.')
            .try_fold(claims, |node, segment| node.get(segment))
    }

    fn extract_roles(claims: &Value, dotted_path: &str) -> HashSet<String> {
        match Self::extract_claim(claims, dotted_path) {
            Some(Value::Array(values)) => values
                .iter()
                .filter_map(|v| v.as_str().map(|s| s.to_string()))
                .collect(),
            Some(Value::String(s)) => [s.clone()].into_iter().collect(),
            _ => HashSet::new(),
        }
    }
}

#[async_trait::async_trait]
impl AuthModule for JwkTokenAuth {
    async fn authenticate(&self, parts: &Parts) -> Result<AuthTuple> {
        let Some(token) = bearer_token(parts) else {
            return Ok(AuthTuple {
                user_id: DEFAULT_UID.to_string(),
                user_name: DEFAULT_NAME.to_string(),
                skip_user_id_check: false,
                token: String::new(),
                roles: HashSet::new(),
            });
        };

        let header = decode_header(&token).map_err(|e| GatewayError::MalformedRequest(e.to_string()))?;
        let keys = self.keys().await?;
        let key = Self::resolve_key(&keys, header.kid.as_deref(), header.alg)
            .ok_or(GatewayError::Unauthenticated)?;

        let mut validation = Validation::new(header.alg);
        validation.validate_exp = true;

        let decoded = decode::<Value>(&token, &key, &validation).map_err(|_| GatewayError::Unauthenticated)?;
        let claims = decoded.claims;

        let user_id = Self::extract_claim(&claims, &self.config.user_id_claim)
            .and_then(|v| v.as_str())
            .ok_or_else(|| GatewayError::MalformedRequest("jwt missing user_id claim".into()))?
            .to_string();
        let user_name = Self::extract_claim(&claims, &self.config.username_claim)
            .and_then(|v| v.as_str())
            .unwrap_or(DEFAULT_NAME)
            .to_string();
        let roles = Self::extract_roles(&claims, &self.config.role_claim);

        Ok(AuthTuple {
            user_id,
            user_name,
            skip_user_id_check: false,
            token,
            roles,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config() -> JwkAuthConfig {
        JwkAuthConfig {
            jwks_url: "https://issuer.example.com/.well-known/jwks.json".into(),
            user_id_claim: "sub".into(),
            username_claim: "preferred_username".into(),
            role_claim: "realm_access.roles".into(),
            cache_ttl_secs: 3600,
        }
    }

    #[test]
    fn extract_claim_walks_dotted_path() {
        let claims = json!({"realm_access": {"roles": ["admin", "user"]}});
        let value = JwkTokenAuth::extract_claim(&claims, "realm_access.roles").unwrap();
        assert_eq!(value.as_array().unwrap().len(), 2);
    }

    #[test]
    fn extract_claim_missing_path_is_none() {
        let claims = json!({"sub": "u1"});
        assert!(JwkTokenAuth::extract_claim(&claims, "realm_access.roles").is_none());
    }

    #[test]
    fn extract_roles_from_array_claim() {
        let claims = json!({"realm_access": {"roles": ["admin", "user"]}});
        let roles = JwkTokenAuth::extract_roles(&claims, "realm_access.roles");
        assert!(roles.contains("admin"));
        assert!(roles.contains("user"));
    }

    #[test]
    fn extract_roles_missing_claim_is_empty() {
        let claims = json!({});
        assert!(JwkTokenAuth::extract_roles(&claims, "realm_access.roles").is_empty());
    }

    #[tokio::test]
    async fn absent_authorization_header_returns_sentinel_tuple() {
        let auth = JwkTokenAuth::new(config()).unwrap();
        let (parts, _) = axum::http::Request::builder()
            .uri("/v1/models")
            .body(())
            .unwrap()
            .into_parts();
        let tuple = auth.authenticate(&parts).await.unwrap();
        assert_eq!(tuple.user_id, DEFAULT_UID);
        assert!(tuple.token.is_empty());
        assert!(tuple.roles.is_empty());
    }

    #[tokio::test]
    async fn malformed_bearer_token_is_malformed_request() {
        let auth = JwkTokenAuth::new(config()).unwrap();
        let (parts, _) = axum::http::Request::builder()
            .uri("/v1/models")
            .header("authorization", "Bearer not-a-jwt")
            .body(())
            .unwrap()
            .into_parts();
        let err = auth.authenticate(&parts).await.unwrap_err();
        assert!(matches!(err, GatewayError::MalformedRequest(_)));
    }
}
