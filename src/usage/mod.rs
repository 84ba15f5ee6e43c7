use anyhow::Result;
use chrono::{DateTime, Datelike, TimeZone, Utc};
use clap::ValueEnum;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

use crate::config::Config;
use crate::store::Store;
use crate::wire::ActionType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PlanTier {
    Free,
    Pro,
}

impl PlanTier {
    fn parse(s: &str) -> PlanTier {
        match s {
            "pro" => PlanTier::Pro,
            _ => PlanTier::Free,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PlanTier::Free => "free",
            PlanTier::Pro => "pro",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageSummary {
    pub user_id: String,
    pub cumulative_tokens: u64,
    pub monthly_tokens: u64,
    pub tier: PlanTier,
    pub limit: u64,
    pub remaining: u64,
    pub over_limit: bool,
}

/// Start of the calendar month (UTC) containing `now`; monthly totals reset here.
pub fn period_start(now: DateTime<Utc>) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
        .single()
        .unwrap_or(now)
}

/// Per-user token accounting. Limits are advisory: exceeding one is logged,
/// never enforced.
#[derive(Clone)]
pub struct UsageTracker {
    store: Arc<Store>,
    free_limit: u64,
    pro_limit: u64,
}

impl UsageTracker {
    pub fn new(store: Arc<Store>, cfg: &Config) -> Self {
        Self { store, free_limit: cfg.free_token_limit, pro_limit: cfg.pro_token_limit }
    }

    fn limit_for(&self, tier: PlanTier) -> u64 {
        match tier {
            PlanTier::Free => self.free_limit,
            PlanTier::Pro => self.pro_limit,
        }
    }

    pub fn record(
        &self,
        user_id: &str,
        action: ActionType,
        tokens: u64,
        metadata: Option<&Value>,
    ) -> Result<UsageSummary> {
        self.store.insert_usage(user_id, action, tokens, metadata, Utc::now())?;
        let summary = self.summary(user_id)?;
        if summary.over_limit {
            tracing::warn!(
                user_id,
                monthly = summary.monthly_tokens,
                limit = summary.limit,
                "user is over their monthly token limit"
            );
        }
        Ok(summary)
    }

    /// Usage is telemetry: a failed write must never fail the caller's action.
    pub fn record_best_effort(
        &self,
        user_id: &str,
        action: ActionType,
        tokens: u64,
        metadata: Option<&Value>,
    ) {
        if let Err(e) = self.record(user_id, action, tokens, metadata) {
            tracing::warn!(user_id, error = %e, "usage tracking failed");
        }
    }

    /// Set the user's plan; driven by the `subscription` CLI command.
    pub fn set_tier(&self, user_id: &str, tier: PlanTier) -> Result<UsageSummary> {
        self.store.set_subscription(user_id, tier.as_str())?;
        tracing::info!(user_id, tier = tier.as_str(), "subscription tier updated");
        self.summary(user_id)
    }

    pub fn summary(&self, user_id: &str) -> Result<UsageSummary> {
        self.summary_at(user_id, Utc::now())
    }

    fn summary_at(&self, user_id: &str, now: DateTime<Utc>) -> Result<UsageSummary> {
        let tier = self
            .store
            .subscription_tier(user_id)?
            .map(|t| PlanTier::parse(&t))
            .unwrap_or(PlanTier::Free);
        let limit = self.limit_for(tier);
        let (cumulative, monthly) = self.store.usage_totals(user_id, period_start(now))?;
        Ok(UsageSummary {
            user_id: user_id.to_string(),
            cumulative_tokens: cumulative,
            monthly_tokens: monthly,
            tier,
            limit,
            remaining: limit.saturating_sub(monthly),
            over_limit: monthly > limit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn tracker() -> UsageTracker {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let cfg = Config { free_token_limit: 8_000, ..Config::default() };
        UsageTracker::new(store, &cfg)
    }

    #[test]
    fn concurrent_records_sum_exactly() {
        let t = tracker();
        let handles: Vec<_> = (0..2)
            .map(|_| {
                let t = t.clone();
                thread::spawn(move || t.record("u", ActionType::Chat, 5000, None).unwrap())
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(t.summary("u").unwrap().cumulative_tokens, 10_000);
    }

    #[test]
    fn over_limit_is_advisory() {
        let t = tracker();
        let s = t.record("u", ActionType::Chat, 9_000, None).unwrap();
        assert!(s.over_limit);
        assert_eq!(s.remaining, 0);
        // still recorded, nothing blocked
        let s = t.record("u", ActionType::Deploy, 1, None).unwrap();
        assert_eq!(s.monthly_tokens, 9_001);
    }

    #[test]
    fn pro_tier_uses_pro_limit() {
        let t = tracker();
        t.record("p", ActionType::Chat, 9_000, None).unwrap();
        let s = t.set_tier("p", PlanTier::Pro).unwrap();
        assert_eq!(s.tier, PlanTier::Pro);
        assert_eq!(s.limit, Config::default().pro_token_limit);
        assert!(!s.over_limit);
        assert_eq!(t.summary("p").unwrap().tier, PlanTier::Pro);

        let s = t.set_tier("p", PlanTier::Free).unwrap();
        assert_eq!(s.limit, 8_000);
        assert!(s.over_limit);
    }

    #[test]
    fn period_starts_on_the_first() {
        let now = Utc.with_ymd_and_hms(2026, 3, 17, 12, 30, 0).unwrap();
        assert_eq!(period_start(now), Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap());
    }
}
