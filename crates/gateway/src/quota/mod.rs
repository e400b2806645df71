//! Quota limiters (§4.D): pre-flight `ensure_available`, post-flight
//! `consume`. A request runs every configured limiter before contacting
//! the upstream and every limiter again after, without cross-limiter
//! atomicity — partial consumption on a mid-list failure is acceptable.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use gw_domain::config::QuotaConfig;
use gw_domain::error::{GatewayError, Result};
use parking_lot::Mutex;
use std::collections::HashMap;

#[async_trait]
pub trait QuotaLimiter: Send + Sync {
    async fn ensure_available(&self, user_id: &str) -> Result<()>;
    async fn consume(&self, user_id: &str, input_tokens: u64, output_tokens: u64) -> Result<()>;
    async fn available(&self, user_id: &str) -> Result<Option<u64>>;
}

/// Per-user token budget that resets at UTC midnight. One row per user
/// tracks `(date, tokens_used)`; a stale date is treated as a fresh
/// budget rather than eagerly swept.
pub struct DailyTokenLimiter {
    config: QuotaConfig,
    usage: Mutex<HashMap<String, (NaiveDate, u64)>>,
}

impl DailyTokenLimiter {
    pub fn new(config: QuotaConfig) -> Self {
        Self {
            config,
            usage: Mutex::new(HashMap::new()),
        }
    }

    fn used_today(&self, user_id: &str) -> u64 {
        let today = Utc::now().date_naive();
        let mut usage = self.usage.lock();
        match usage.get(user_id) {
            Some((date, tokens)) if *date == today => *tokens,
            _ => {
                usage.insert(user_id.to_string(), (today, 0));
                0
            }
        }
    }
}

#[async_trait]
impl QuotaLimiter for DailyTokenLimiter {
    async fn ensure_available(&self, user_id: &str) -> Result<()> {
        let Some(limit) = self.config.limit_for(user_id) else {
            return Ok(());
        };
        let used = self.used_today(user_id);
        if used >= limit {
            return Err(GatewayError::QuotaExceeded(format!(
                "daily_tokens: {used}/{limit} used"
            )));
        }
        Ok(())
    }

    async fn consume(&self, user_id: &str, input_tokens: u64, output_tokens: u64) -> Result<()> {
        let today = Utc::now().date_naive();
        let mut usage = self.usage.lock();
        let entry = usage.entry(user_id.to_string()).or_insert((today, 0));
        if entry.0 != today {
            *entry = (today, 0);
        }
        entry.1 = entry.1.saturating_add(input_tokens + output_tokens);
        Ok(())
    }

    async fn available(&self, user_id: &str) -> Result<Option<u64>> {
        let Some(limit) = self.config.limit_for(user_id) else {
            return Ok(None);
        };
        let used = self.used_today(user_id);
        Ok(Some(limit.saturating_sub(used)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gw_domain::config::UserQuota;
    use std::collections::HashMap as StdHashMap;

    fn config(default_daily: Option<u64>) -> QuotaConfig {
        QuotaConfig {
            default_daily_tokens: default_daily,
            per_user: StdHashMap::new(),
        }
    }

    #[tokio::test]
    async fn uncapped_user_always_available() {
        let limiter = DailyTokenLimiter::new(config(None));
        assert!(limiter.ensure_available("u1").await.is_ok());
        assert_eq!(limiter.available("u1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn consume_reduces_availability() {
        let limiter = DailyTokenLimiter::new(config(Some(100)));
        limiter.consume("u1", 40, 10).await.unwrap();
        assert_eq!(limiter.available("u1").await.unwrap(), Some(50));
    }

    #[tokio::test]
    async fn exceeding_limit_is_quota_exceeded() {
        let limiter = DailyTokenLimiter::new(config(Some(50)));
        limiter.consume("u1", 50, 0).await.unwrap();
        let err = limiter.ensure_available("u1").await.unwrap_err();
        assert!(matches!(err, GatewayError::QuotaExceeded(_)));
    }

    #[tokio::test]
    async fn per_user_override_applies() {
        let mut per_user = StdHashMap::new();
        per_user.insert("vip".to_string(), UserQuota { daily_tokens: Some(1000) });
        let limiter = DailyTokenLimiter::new(QuotaConfig {
            default_daily_tokens: Some(10),
            per_user,
        });
        limiter.consume("vip", 500, 0).await.unwrap();
        assert!(limiter.ensure_available("vip").await.is_ok());
    }
}
