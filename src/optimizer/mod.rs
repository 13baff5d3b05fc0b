//! The optimization engine.
//!
//! Module map, in dependency order:
//! - `device_manager`: residual free capacity, atomic consume-or-reject
//! - `knapsack`: packing state accumulated by the search strategies
//! - `filter`: the fixed chain selecting orders a worker may accept
//! - `methods`: the four search strategies plus the batch coordinator
//! - `config`: typed engine configuration, tagged method specs
//! - `tagger`: process-wide plan tags
//! - `engine`: the per-epoch two-track orchestrator

mod config;
mod device_manager;
mod engine;
mod filter;
mod knapsack;
mod tagger;

pub mod methods;

#[cfg(test)]
pub(crate) mod test_support;


pub use config::{
    BatchConfig, BranchBoundConfig, EngineConfig, GeneticConfig, GenomeKind, GreedyConfig,
    MethodSpec, OptimizationConfig, OrderPolicy,
};
pub use device_manager::DeviceManager;
pub use engine::{OptimizationInput, WorkerEngine};
pub use filter::OrderFilter;
pub use knapsack::Knapsack;
pub use methods::{MethodFactory, OptimizationMethod, SearchBudget};
pub use tagger::Tagger;
