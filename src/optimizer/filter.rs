//! The fixed filter chain selecting orders a worker may accept.

use alloy::primitives::Address;

use crate::clients::Blacklist;
use crate::types::{MarketOrder, NetFlags, OrderKind};

use super::config::OrderPolicy;
use super::device_manager::DeviceManager;

/// Conjunctive short-circuit filter, applied in a fixed order:
///
/// 1. only BIDs;
/// 2. order policy (`SpotOnly` admits spot orders; every other policy is a
///    stub that rejects until defined);
/// 3. the author is not blacklisted;
/// 4. the worker's net flags cover the order's;
/// 5. the counterparty is unset, the worker itself, or the worker's master;
/// 6. the *total* worker capacity could satisfy the demand: orders that
///    can never fit are dropped even if capacity might open up later.
pub struct OrderFilter<'a> {
    policy: OrderPolicy,
    worker_addr: Address,
    master_addr: Address,
    worker_flags: NetFlags,
    blacklist: &'a dyn Blacklist,
    manager: &'a DeviceManager,
}

impl<'a> OrderFilter<'a> {
    pub fn new(
        policy: OrderPolicy,
        worker_addr: Address,
        master_addr: Address,
        blacklist: &'a dyn Blacklist,
        manager: &'a DeviceManager,
    ) -> Self {
        Self {
            policy,
            worker_addr,
            master_addr,
            worker_flags: manager.total().net_flags,
            blacklist,
            manager,
        }
    }

    pub fn admits(&self, order: &MarketOrder) -> bool {
        if order.kind != OrderKind::Bid {
            return false;
        }

        let policy_ok = match self.policy {
            OrderPolicy::SpotOnly => order.is_spot(),
        };
        if !policy_ok {
            return false;
        }

        if !self.blacklist.is_allowed(order.author) {
            return false;
        }

        if !self.worker_flags.admits(order.net_flags) {
            return false;
        }

        let counterparty_ok = order.counterparty == Address::ZERO
            || order.counterparty == self.worker_addr
            || order.counterparty == self.master_addr;
        if !counterparty_ok {
            return false;
        }

        self.manager.contains(&order.benchmarks, order.net_flags)
    }

    /// The subset of `orders` this worker may accept, in input order.
    pub fn matching(&self, orders: &[MarketOrder]) -> Vec<MarketOrder> {
        orders
            .iter()
            .filter(|order| self.admits(order))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use alloy::primitives::{address, U256};
    use smallvec::smallvec;

    use crate::clients::StaticBlacklist;
    use crate::types::{ordinal, BenchmarkMapping, BenchmarkVector, ResourceVector};

    use super::*;

    const WORKER: Address = address!("1000000000000000000000000000000000000001");
    const MASTER: Address = address!("1000000000000000000000000000000000000002");
    const STRANGER: Address = address!("1000000000000000000000000000000000000003");

    fn manager() -> DeviceManager {
        let total = ResourceVector {
            cpu_cores: 8,
            ram_bytes: 16 << 30,
            net_flags: NetFlags::from_parts(true, true, false),
            ..Default::default()
        };
        DeviceManager::new(total.clone(), total, Arc::new(BenchmarkMapping::default()))
    }

    fn bid(cores: u64) -> MarketOrder {
        let mut benchmarks: BenchmarkVector = smallvec![0; 8];
        benchmarks[ordinal::CPU_CORES] = cores;
        MarketOrder {
            id: U256::from(1u64),
            kind: OrderKind::Bid,
            author: STRANGER,
            counterparty: Address::ZERO,
            price_per_second: U256::from(10u64),
            duration_secs: 0,
            benchmarks,
            net_flags: NetFlags::default(),
        }
    }

    fn assert_admits(blacklist: &StaticBlacklist, manager: &DeviceManager, order: &MarketOrder, expected: bool) {
        let filter = OrderFilter::new(OrderPolicy::SpotOnly, WORKER, MASTER, blacklist, manager);
        assert_eq!(filter.admits(order), expected, "order: {order:?}");
    }

    #[test]
    fn test_admits_plain_spot_bid() {
        let blacklist = StaticBlacklist::permissive();
        let m = manager();
        assert_admits(&blacklist, &m, &bid(4), true);
    }

    #[test]
    fn test_rejects_asks() {
        let blacklist = StaticBlacklist::permissive();
        let m = manager();
        let mut order = bid(4);
        order.kind = OrderKind::Ask;
        assert_admits(&blacklist, &m, &order, false);
    }

    #[test]
    fn test_spot_only_policy_rejects_forward_orders() {
        let blacklist = StaticBlacklist::permissive();
        let m = manager();
        let mut order = bid(4);
        order.duration_secs = 3600;
        assert_admits(&blacklist, &m, &order, false);
    }

    #[test]
    fn test_blacklisted_author_rejected() {
        let blacklist = StaticBlacklist::new([STRANGER]);
        let m = manager();
        // Price does not buy a pass.
        let mut order = bid(1);
        order.price_per_second = U256::from(1_000_000u64);
        assert_admits(&blacklist, &m, &order, false);
    }

    #[test]
    fn test_flag_mismatch_rejected_even_when_resources_fit() {
        let blacklist = StaticBlacklist::permissive();
        let m = manager();
        let mut order = bid(1);
        order.net_flags = NetFlags::from_parts(false, false, true);
        assert_admits(&blacklist, &m, &order, false);
    }

    #[test]
    fn test_counterparty_gate() {
        let blacklist = StaticBlacklist::permissive();
        let m = manager();

        for (counterparty, expected) in [
            (Address::ZERO, true),
            (WORKER, true),
            (MASTER, true),
            (STRANGER, false),
        ] {
            let mut order = bid(1);
            order.counterparty = counterparty;
            assert_admits(&blacklist, &m, &order, expected);
        }
    }

    #[test]
    fn test_oversized_orders_dropped() {
        let blacklist = StaticBlacklist::permissive();
        let m = manager();
        assert_admits(&blacklist, &m, &bid(9), false);
    }

    #[test]
    fn test_matching_preserves_input_order() {
        let blacklist = StaticBlacklist::permissive();
        let m = manager();
        let filter =
            OrderFilter::new(OrderPolicy::SpotOnly, WORKER, MASTER, &blacklist, &m);

        let mut a = bid(1);
        a.id = U256::from(1u64);
        let mut oversized = bid(9);
        oversized.id = U256::from(2u64);
        let mut b = bid(2);
        b.id = U256::from(3u64);

        let matched = filter.matching(&[a, oversized, b]);
        let ids: Vec<u64> = matched.iter().map(|o| o.id.to::<u64>()).collect();
        assert_eq!(ids, vec![1, 3]);
    }
}
