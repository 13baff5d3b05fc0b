//! Marketplace orders.

use alloy::primitives::{Address, U256};
use serde::{Deserialize, Serialize};

use super::benchmarks::BenchmarkVector;
use super::resources::NetFlags;

/// Order side. The engine only ever sells against BIDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderKind {
    Bid,
    Ask,
}

/// A live marketplace order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketOrder {
    pub id: U256,
    pub kind: OrderKind,
    pub author: Address,
    /// Zero address means the order is open to any counterparty.
    #[serde(default)]
    pub counterparty: Address,
    /// Price in wei per second.
    pub price_per_second: U256,
    /// Zero means a spot order.
    #[serde(default)]
    pub duration_secs: u64,
    #[serde(default)]
    pub benchmarks: BenchmarkVector,
    #[serde(default)]
    pub net_flags: NetFlags,
}

impl MarketOrder {
    pub fn is_spot(&self) -> bool {
        self.duration_secs == 0
    }

    /// Price per second as a float, scaled from wei to whole tokens.
    pub fn pps_f64(&self) -> f64 {
        wei_to_eth_per_second(self.price_per_second)
    }
}

/// Convert a wei-per-second price into a float of whole tokens per second.
///
/// Exactness is not required here: callers are heuristics that only need a
/// consistent ordering. Accounting paths stay on [`U256`].
pub fn wei_to_eth_per_second(price: U256) -> f64 {
    let mut value = 0f64;
    for (i, limb) in price.as_limbs().iter().enumerate() {
        value += (*limb as f64) * 2f64.powi(64 * i as i32);
    }
    value * 1e-18
}
