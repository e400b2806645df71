//! RBAC primitives: the closed set of actions, role→action rules, and the
//! tuple every auth module produces.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Every role implicitly holds this wildcard in addition to whatever an
/// auth module resolved for the principal.
pub const WILDCARD_ROLE: &str = "*";

/// The closed set of operation names the authorization layer gates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    Query,
    StreamingQuery,
    Feedback,
    GetConversation,
    ListConversations,
    DeleteConversation,
    UpdateConversation,
    QueryOthersConversations,
    Admin,
    GetMetrics,
}

/// Produced once per request by an auth module (§4.B).
///
/// `skip_user_id_check` is a capability flag, not a user attribute: it
/// disables ownership enforcement and is only ever `true` under the
/// development no-op module.
#[derive(Debug, Clone)]
pub struct AuthTuple {
    pub user_id: String,
    pub user_name: String,
    pub skip_user_id_check: bool,
    pub token: String,
    /// Roles extracted by the auth module itself (e.g. from JWT claims or
    /// cluster groups). The wildcard role is added separately by the role
    /// resolver, never stored here.
    pub roles: HashSet<String>,
}

/// `(role, {Action…})` — one row of the access-control table.
#[derive(Debug, Clone)]
pub struct AccessRule {
    pub role: String,
    pub actions: HashSet<Action>,
}

/// The actions a set of roles resolves to, stored on the request so
/// downstream handlers can consult fine-grained capabilities (e.g.
/// whether `QUERY_OTHERS_CONVERSATIONS` is held) without re-running
/// resolution.
#[derive(Debug, Clone, Default)]
pub struct AuthorizedActions(pub HashSet<Action>);

impl AuthorizedActions {
    pub fn holds(&self, action: Action) -> bool {
        self.0.contains(&action)
    }
}

/// `access_resolver.check` + `access_resolver.actions_for` combined: given
/// a principal's roles (already unioned with the wildcard role) and the
/// table of rules, decide whether `action` is granted and compute the
/// full set of actions available to those roles.
pub fn actions_for(roles: &HashSet<String>, rules: &[AccessRule]) -> AuthorizedActions {
    let mut actions = HashSet::new();
    for rule in rules {
        if roles.contains(&rule.role) {
            actions.extend(rule.actions.iter().copied());
        }
    }
    AuthorizedActions(actions)
}

pub fn is_authorized(roles: &HashSet<String>, rules: &[AccessRule], action: Action) -> bool {
    actions_for(roles, rules).holds(action)
}

/// §4.C step 2: `roles = role_resolver(auth) ∪ {"*"}`. The role resolver
/// itself is just "whatever the auth module extracted"; this only adds
/// the wildcard every principal implicitly holds.
pub fn resolve_roles(auth: &AuthTuple) -> HashSet<String> {
    let mut roles = auth.roles.clone();
    roles.insert(WILDCARD_ROLE.to_string());
    roles
}

/// The `Noop` resolver pair (§4.C): every role resolves to the universe
/// of actions. Used when no JWT claim rules or access rules are configured.
pub fn noop_actions() -> AuthorizedActions {
    AuthorizedActions(
        [
            Action::Query,
            Action::StreamingQuery,
            Action::Feedback,
            Action::GetConversation,
            Action::ListConversations,
            Action::DeleteConversation,
            Action::UpdateConversation,
            Action::QueryOthersConversations,
            Action::Admin,
            Action::GetMetrics,
        ]
        .into_iter()
        .collect(),
    )
}
