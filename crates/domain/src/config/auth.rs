//! Authentication and authorization configuration (§4.B, §4.C).

use crate::auth::AccessRule;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub module: AuthModule,
    #[serde(default)]
    pub k8s: Option<K8sAuthConfig>,
    #[serde(default)]
    pub jwk: Option<JwkAuthConfig>,
    /// `(role, actions)` rows consulted by the Jwt/Generic access
    /// resolver. Empty (the default) falls back to the Noop resolver
    /// pair, which grants every action to every role.
    #[serde(default)]
    pub access_rules: Vec<AccessRuleConfig>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            module: AuthModule::Noop,
            k8s: None,
            jwk: None,
            access_rules: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum AuthModule {
    #[default]
    Noop,
    NoopWithToken,
    K8s,
    JwkToken,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct K8sAuthConfig {
    /// Base URL of the cluster API server.
    pub cluster_api_url: String,
    /// Service-account token used to perform TokenReview/SubjectAccessReview
    /// calls against the cluster API.
    pub service_account_token_env: String,
    /// Principal name treated as the cluster administrator; its `uid`
    /// is substituted with `cluster_id`.
    #[serde(default = "d_cluster_admin")]
    pub cluster_admin_name: String,
    pub cluster_id: String,
    /// Non-resource path checked via SubjectAccessReview (`verb=get`).
    #[serde(default = "d_sar_path")]
    pub authorized_path: String,
}

fn d_cluster_admin() -> String {
    "kube:admin".into()
}

fn d_sar_path() -> String {
    "/livez".into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwkAuthConfig {
    pub jwks_url: String,
    #[serde(default = "d_user_id_claim")]
    pub user_id_claim: String,
    #[serde(default = "d_username_claim")]
    pub username_claim: String,
    #[serde(default = "d_role_claim")]
    pub role_claim: String,
    #[serde(default = "d_jwk_ttl")]
    pub cache_ttl_secs: u64,
}

fn d_user_id_claim() -> String {
    "sub".into()
}
fn d_username_claim() -> String {
    "preferred_username".into()
}
fn d_role_claim() -> String {
    "realm_access.roles".into()
}
fn d_jwk_ttl() -> u64 {
    3600
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessRuleConfig {
    pub role: String,
    pub actions: Vec<String>,
}

impl AccessRuleConfig {
    /// Parse the configured action names into the closed [`Action`]
    /// set, skipping (and the caller should log) any name that doesn't
    /// match a known action.
    pub fn resolve(&self) -> AccessRule {
        let actions: HashSet<_> = self
            .actions
            .iter()
            .filter_map(|name| serde_json::from_value(serde_json::Value::String(name.clone())).ok())
            .collect();
        AccessRule {
            role: self.role.clone(),
            actions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Action;

    #[test]
    fn default_module_is_noop() {
        assert_eq!(AuthConfig::default().module, AuthModule::Noop);
    }

    #[test]
    fn access_rule_resolves_known_actions() {
        let rule = AccessRuleConfig {
            role: "user".into(),
            actions: vec!["QUERY".into(), "FEEDBACK".into(), "BOGUS".into()],
        };
        let resolved = rule.resolve();
        assert!(resolved.actions.contains(&Action::Query));
        assert!(resolved.actions.contains(&Action::Feedback));
        assert_eq!(resolved.actions.len(), 2);
    }
}
