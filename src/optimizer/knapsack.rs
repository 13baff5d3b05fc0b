//! The packing state: a device manager plus the plans packed so far.

use alloy::primitives::U256;

use crate::errors::CapacityError;
use crate::types::{sum_price, wei_to_eth_per_second, AskPlan, MarketOrder};

use super::device_manager::DeviceManager;

/// Accumulates accepted orders into sell plans against a residual-capacity
/// manager. Cloning deep-clones the manager so search strategies can
/// branch and roll back by keeping the original.
#[derive(Debug, Clone)]
pub struct Knapsack {
    manager: DeviceManager,
    plans: Vec<AskPlan>,
}

impl Knapsack {
    pub fn new(manager: DeviceManager) -> Self {
        Self {
            manager,
            plans: Vec::new(),
        }
    }

    /// Try to pack one order.
    ///
    /// On success the consumed resources are claimed from the manager and a
    /// plan carrying the order's price, duration (zero preserved for spot)
    /// and net flags is appended. On failure the knapsack is unchanged.
    pub fn put(&mut self, order: &MarketOrder) -> Result<(), CapacityError> {
        let resources = self.manager.consume(&order.benchmarks, order.net_flags)?;

        self.plans.push(AskPlan {
            id: None,
            order_id: Some(order.id),
            price_per_second: order.price_per_second,
            duration_secs: order.duration_secs,
            resources,
            identity: Default::default(),
            tag: None,
            created_at_secs: 0,
        });

        Ok(())
    }

    /// Big-integer sum of per-second prices over the packed plans.
    pub fn price(&self) -> U256 {
        sum_price(&self.plans)
    }

    /// Float price for the heuristics, scaled from wei to whole tokens.
    pub fn pps_f64(&self) -> f64 {
        wei_to_eth_per_second(self.price())
    }

    pub fn plans(&self) -> &[AskPlan] {
        &self.plans
    }

    pub fn into_plans(self) -> Vec<AskPlan> {
        self.plans
    }

    pub fn free(&self) -> &crate::types::ResourceVector {
        self.manager.free()
    }

    pub fn len(&self) -> usize {
        self.plans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }
}
