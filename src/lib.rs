#![deny(unreachable_pub)]

//! Autonomous sell-plan optimizer for heterogeneous compute capacity.
//!
//! A worker node on a decentralized compute marketplace exposes a pool of
//! hardware (CPU cores, GPUs, RAM, network, storage). The marketplace
//! publishes buy orders that demand benchmark-expressed resource vectors and
//! pay a price per second. Each epoch this crate decides which sell plans the
//! worker should publish so that revenue per second is maximized within the
//! worker's free capacity and policy constraints.
//!
//! The heavy lifting happens in [`optimizer`]: a multi-dimensional packing
//! problem solved by four cooperating search strategies (branch-and-bound,
//! greedy with least-squares price prediction, and two genetic variants),
//! coordinated by a two-track natural/virtual epoch engine with a
//! price-threshold swing rule.

// Core modules
mod errors;
mod prelude;

// Shared utilities
pub mod logging;
pub mod types;

// Feature modules
pub mod clients;
pub mod optimizer;

// Re-exports
pub use errors::{CapacityError, ConfigError, EngineError, MethodError, RpcError};
pub use optimizer::{
    DeviceManager, EngineConfig, GenomeKind, Knapsack, MethodSpec, OptimizationConfig,
    OrderFilter, OrderPolicy, SearchBudget, Tagger, WorkerEngine,
};
pub use types::{
    ordinal_benchmarks, Aggregation, AskPlan, BenchmarkDef, BenchmarkMapping, BenchmarkVector,
    Dimension, GpuDevice, IdentityLevel, MarketOrder, NetFlags, OrderKind, ResourceRequest,
    ResourceVector,
};
