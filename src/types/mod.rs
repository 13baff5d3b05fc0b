//! Domain types shared across the optimizer.
//!
//! - `resources`: the resource vector and its algebra
//! - `benchmarks`: fixed-ordinal benchmark vectors and the catalog mapping
//! - `orders`: marketplace orders
//! - `plans`: sell plans published by the worker

mod benchmarks;
mod orders;
mod plans;
mod resources;

pub use benchmarks::{
    ordinal, ordinal_benchmarks, Aggregation, BenchmarkDef, BenchmarkMapping, BenchmarkVector,
};
pub use orders::{wei_to_eth_per_second, MarketOrder, OrderKind};
pub use plans::{sum_price, AskPlan, IdentityLevel};
pub use resources::{Dimension, GpuDevice, NetFlags, ResourceRequest, ResourceVector};
