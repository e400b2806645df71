//! Quota limiter configuration (§4.D). Each configured limiter is
//! instantiated as one entry in the gateway's `Vec<Box<dyn QuotaLimiter>>`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct QuotaConfig {
    /// Default daily token limit applied to any user without a
    /// per-user entry. `None` leaves that dimension uncapped.
    #[serde(default)]
    pub default_daily_tokens: Option<u64>,
    /// Per-user overrides keyed by `user_id`.
    #[serde(default)]
    pub per_user: HashMap<String, UserQuota>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct UserQuota {
    /// Daily token limit for this user. `None` = uncapped.
    pub daily_tokens: Option<u64>,
}

impl QuotaConfig {
    /// The effective daily token limit for `user_id`: their per-user
    /// override if one exists, else the configured default.
    pub fn limit_for(&self, user_id: &str) -> Option<u64> {
        match self.per_user.get(user_id) {
            Some(quota) => quota.daily_tokens,
            None => self.default_daily_tokens,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falls_back_to_default_for_unknown_user() {
        let config = QuotaConfig {
            default_daily_tokens: Some(1000),
            per_user: HashMap::new(),
        };
        assert_eq!(config.limit_for("u1"), Some(1000));
    }

    #[test]
    fn per_user_override_takes_precedence() {
        let mut per_user = HashMap::new();
        per_user.insert(
            "u1".to_string(),
            UserQuota {
                daily_tokens: Some(50),
            },
        );
        let config = QuotaConfig {
            default_daily_tokens: Some(1000),
            per_user,
        };
        assert_eq!(config.limit_for("u1"), Some(50));
        assert_eq!(config.limit_for("u2"), Some(1000));
    }

    #[test]
    fn uncapped_when_both_absent() {
        let config = QuotaConfig::default();
        assert_eq!(config.limit_for("u1"), None);
    }
}
