//! Sell plans published by the worker.

use std::time::Duration;

use alloy::primitives::U256;
use serde::{Deserialize, Serialize};

use super::orders::wei_to_eth_per_second;
use super::resources::ResourceVector;

/// Identity level stamped onto created plans.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityLevel {
    #[default]
    Anonymous,
    Registered,
    Identified,
    Professional,
}

/// A sell plan: one slice of the worker's hardware offered at a price.
///
/// Plans are created only by the epoch engine; the worker service assigns
/// `id` on submission and the engine treats them as immutable afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskPlan {
    #[serde(default)]
    pub id: Option<String>,
    /// The BID this plan was packed against. Cleared before submission.
    #[serde(default)]
    pub order_id: Option<U256>,
    /// Price in wei per second.
    pub price_per_second: U256,
    /// Zero means a spot plan, evictable at epoch boundaries.
    #[serde(default)]
    pub duration_secs: u64,
    pub resources: ResourceVector,
    #[serde(default)]
    pub identity: IdentityLevel,
    #[serde(default)]
    pub tag: Option<String>,
    /// Unix seconds at creation, as reported by the worker.
    #[serde(default)]
    pub created_at_secs: u64,
}

impl AskPlan {
    pub fn is_spot(&self) -> bool {
        self.duration_secs == 0
    }

    /// How long the plan has sat unsold.
    pub fn unsold_for(&self, now_secs: u64) -> Duration {
        Duration::from_secs(now_secs.saturating_sub(self.created_at_secs))
    }

    pub fn pps_f64(&self) -> f64 {
        wei_to_eth_per_second(self.price_per_second)
    }
}

/// Big-integer sum of per-second prices over a set of plans.
pub fn sum_price<'a>(plans: impl IntoIterator<Item = &'a AskPlan>) -> U256 {
    plans
        .into_iter()
        .fold(U256::ZERO, |acc, plan| acc + plan.price_per_second)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(price: u64, duration_secs: u64) -> AskPlan {
        AskPlan {
            id: None,
            order_id: None,
            price_per_second: U256::from(price),
            duration_secs,
            resources: ResourceVector::default(),
            identity: IdentityLevel::default(),
            tag: None,
            created_at_secs: 0,
        }
    }

    #[test]
    fn test_sum_price_exact() {
        let plans = vec![plan(10, 0), plan(7, 3600), plan(25, 0)];
        assert_eq!(sum_price(&plans), U256::from(42u64));
        assert_eq!(sum_price(&[]), U256::ZERO);
    }

    #[test]
    fn test_spot_detection() {
        assert!(plan(1, 0).is_spot());
        assert!(!plan(1, 60).is_spot());
    }

    #[test]
    fn test_unsold_duration_saturates() {
        let mut p = plan(1, 0);
        p.created_at_secs = 1_000;
        assert_eq!(p.unsold_for(1_600), Duration::from_secs(600));
        // A clock that runs behind the worker's never yields a negative age.
        assert_eq!(p.unsold_for(500), Duration::ZERO);
    }
}
