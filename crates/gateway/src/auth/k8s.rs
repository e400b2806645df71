//! Kubernetes auth module (§4.B `k8s`): TokenReview to authenticate the
//! bearer token, SubjectAccessReview to authorize it against a configured
//! non-resource path. Neither the TokenReview nor SubjectAccessReview
//! wire shapes live anywhere else in this codebase's own manifest, so
//! this talks to the cluster API with plain `reqwest` rather than a
//! dedicated k8s client crate (none of the example pack carries one
//! either — see DESIGN.md).

use super::{bearer_token, AuthModule};
use axum::http::request::Parts;
use gw_domain::auth::AuthTuple;
use gw_domain::config::K8sAuthConfig;
use gw_domain::error::{GatewayError, Result};
use serde::{Deserialize, Serialize};

pub struct K8sAuth {
    http: reqwest::Client,
    config: K8sAuthConfig,
    service_account_token: String,
}

impl K8sAuth {
    pub fn new(config: K8sAuthConfig) -> Result<Self> {
        let service_account_token = std::env::var(&config.service_account_token_env)
            .map_err(|_| {
                GatewayError::ConfigurationMissing
            })?;
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| GatewayError::UpstreamUnavailable(e.to_string()))?;
        Ok(Self {
            http,
            config,
            service_account_token,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.cluster_api_url.trim_end_matches('/'), path)
    }

    async fn token_review(&self, token: &str) -> Result<TokenReviewStatus> {
        let body = TokenReviewRequest {
            api_version: "authentication.k8s.io/v1",
            kind: "TokenReview",
            spec: TokenReviewSpec { token },
        };
        let response = self
            .http
            .post(self.url("/apis/authentication.k8s.io/v1/tokenreviews"))
            .bearer_auth(&self.service_account_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::UpstreamUnavailable(e.to_string()))?;
        if !response.status().is_success() {
            return Err(GatewayError::Unauthenticated);
        }
        let parsed: TokenReviewResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::UpstreamUnavailable(e.to_string()))?;
        Ok(parsed.status)
    }

    async fn subject_access_review(&self, username: &str, groups: &[String]) -> Result<bool> {
        let body = SubjectAccessReviewRequest {
            api_version: "authorization.k8s.io/v1",
            kind: "SubjectAccessReview",
            spec: SubjectAccessReviewSpec {
                user: username,
                groups,
                non_resource_attributes: NonResourceAttributes {
                    path: &self.config.authorized_path,
                    verb: "get",
                },
            },
        };
        let response = self
            .http
            .post(self.url("/apis/authorization.k8s.io/v1/subjectaccessreviews"))
            .bearer_auth(&self.service_account_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::UpstreamUnavailable(e.to_string()))?;
        if !response.status().is_success() {
            return Err(GatewayError::Forbidden);
        }
        let parsed: SubjectAccessReviewResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::UpstreamUnavailable(e.to_string()))?;
        Ok(parsed.status.allowed)
    }
}

#[async_trait::async_trait]
impl AuthModule for K8sAuth {
    async fn authenticate(&self, parts: &Parts) -> Result<AuthTuple> {
        let token = bearer_token(parts).ok_or(GatewayError::Unauthenticated)?;

        let status = self.token_review(&token).await?;
        if !status.authenticated {
            return Err(GatewayError::Unauthenticated);
        }
        let user = status.user.ok_or(GatewayError::Unauthenticated)?;

        let allowed = self.subject_access_review(&user.username, &user.groups).await?;
        if !allowed {
            return Err(GatewayError::Forbidden);
        }

        let uid = if user.username == self.config.cluster_admin_name {
            self.config.cluster_id.clone()
        } else {
            user.uid
        };

        Ok(AuthTuple {
            user_id: uid,
            user_name: user.username,
            skip_user_id_check: false,
            token,
            roles: user.groups.into_iter().collect(),
        })
    }
}

#[derive(Serialize)]
struct TokenReviewRequest<'a> {
    #[serde(rename = "apiVersion")]
    api_version: &'static str,
    kind: &'static str,
    spec: TokenReviewSpec<'a>,
}

#[derive(Serialize)]
struct TokenReviewSpec<'a> {
    token: &'a str,
}

#[derive(Deserialize)]
struct TokenReviewResponse {
    status: TokenReviewStatus,
}

#[derive(Deserialize)]
struct TokenReviewStatus {
    authenticated: bool,
    #[serde(default)]
    user: Option<TokenReviewUser>,
}

#[derive(Deserialize)]
struct TokenReviewUser {
    username: String,
    #[serde(default)]
    uid: String,
    #[serde(default)]
    groups: Vec<String>,
}

#[derive(Serialize)]
struct SubjectAccessReviewRequest<'a> {
    #[serde(rename = "apiVersion")]
    api_version: &'static str,
    kind: &'static str,
    spec: SubjectAccessReviewSpec<'a>,
}

#[derive(Serialize)]
struct SubjectAccessReviewSpec<'a> {
    user: &'a str,
    groups: &'a [String],
    #[serde(rename = "nonResourceAttributes")]
    non_resource_attributes: NonResourceAttributes<'a>,
}

#[derive(Serialize)]
struct NonResourceAttributes<'a> {
    path: &'a str,
    verb: &'static str,
}

#[derive(Deserialize)]
struct SubjectAccessReviewResponse {
    status: SubjectAccessReviewStatus,
}

#[derive(Deserialize)]
struct SubjectAccessReviewStatus {
    allowed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> K8sAuthConfig {
        K8sAuthConfig {
            cluster_api_url: "https://k8s.example.com".into(),
            service_account_token_env: "K8S_SA_TOKEN_TEST_UNUSED".into(),
            cluster_admin_name: "kube:admin".into(),
            cluster_id: "cluster-123".into(),
            authorized_path: "/livez".into(),
        }
    }

    #[test]
    fn url_joins_base_and_path() {
        let cfg = config();
        let auth = K8sAuth {
            http: reqwest::Client::new(),
            service_account_token: "sa-token".into(),
            config: cfg,
        };
        assert_eq!(
            auth.url("/apis/authentication.k8s.io/v1/tokenreviews"),
            "https://k8s.example.com/apis/authentication.k8s.io/v1/tokenreviews"
        );
    }

    #[test]
    fn cluster_admin_substitution_logic() {
        let cfg = config();
        let user = TokenReviewUser {
            username: cfg.cluster_admin_name.clone(),
            uid: "real-admin-uid".into(),
            groups: vec![],
        };
        let uid = if user.username == cfg.cluster_admin_name {
            cfg.cluster_id.clone()
        } else {
            user.uid
        };
        assert_eq!(uid, "cluster-123");
    }
}
