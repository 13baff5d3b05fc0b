//! Shared fixtures for the optimizer test suites.

use std::sync::Arc;

use alloy::primitives::{Address, U256};
use smallvec::smallvec;

use crate::types::{
    ordinal, BenchmarkMapping, BenchmarkVector, MarketOrder, NetFlags, OrderKind, ResourceVector,
};

use super::device_manager::DeviceManager;
use super::knapsack::Knapsack;

/// A spot BID demanding `cores` CPU cores at `price` wei/s.
pub(crate) fn bid(id: u64, cores: u64, price: u64) -> MarketOrder {
    let mut benchmarks: BenchmarkVector = smallvec![0; 8];
    benchmarks[ordinal::CPU_CORES] = cores;
    MarketOrder {
        id: U256::from(id),
        kind: OrderKind::Bid,
        author: Address::ZERO,
        counterparty: Address::ZERO,
        price_per_second: U256::from(price),
        duration_secs: 0,
        benchmarks,
        net_flags: NetFlags::default(),
    }
}

/// A CPU-only worker vector.
pub(crate) fn cores_vector(cores: u64) -> ResourceVector {
    ResourceVector {
        cpu_cores: cores,
        ram_bytes: 1 << 40,
        net_flags: NetFlags::from_parts(true, true, true),
        ..Default::default()
    }
}

/// A fresh knapsack over a CPU-only worker with `cores` free cores.
pub(crate) fn knapsack_with_cores(cores: u64) -> Knapsack {
    let total = cores_vector(cores);
    Knapsack::new(DeviceManager::new(
        total.clone(),
        total,
        Arc::new(BenchmarkMapping::default()),
    ))
}
