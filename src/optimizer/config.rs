//! Engine configuration.
//!
//! The optimization model is a tagged variant (`type = "batch" | "greedy" |
//! "genetic" | "branch_bound"`); an unknown tag is a hard deserialization
//! error, never a silent fallback. When no model is configured the engine
//! uses the size-switching default factory.

use alloy::primitives::U256;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::types::IdentityLevel;

/// Which orders the worker is willing to serve at all.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderPolicy {
    /// Only spot orders (duration zero). The only policy defined today.
    #[default]
    SpotOnly,
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Skip every mutating call after optimization.
    pub dry_run: bool,

    /// Swing threshold in wei per second: replacement mode engages when the
    /// virtual track beats the current price by at least this much.
    pub price_threshold_wei: U256,

    /// Unsold-plan age after which a plan is swept.
    #[serde(default = "default_stale_threshold_secs")]
    pub stale_threshold_secs: u64,

    /// Deadline for the concurrent input gather.
    #[serde(default = "default_prelude_timeout_secs")]
    pub prelude_timeout_secs: u64,

    /// Wall-clock pause between epochs in the run loop.
    #[serde(default = "default_epoch_interval_secs")]
    pub epoch_interval_secs: u64,

    pub order_policy: OrderPolicy,

    /// Identity level stamped onto created plans.
    pub identity: IdentityLevel,

    pub optimization: OptimizationConfig,
}

fn default_stale_threshold_secs() -> u64 {
    300
}

fn default_prelude_timeout_secs() -> u64 {
    30
}

fn default_epoch_interval_secs() -> u64 {
    60
}

impl EngineConfig {
    pub fn stale_threshold(&self) -> Duration {
        Duration::from_secs(self.stale_threshold_secs)
    }

    pub fn prelude_timeout(&self) -> Duration {
        Duration::from_secs(self.prelude_timeout_secs)
    }

    pub fn epoch_interval(&self) -> Duration {
        Duration::from_secs(self.epoch_interval_secs)
    }
}

/// Optimization sub-config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizationConfig {
    /// Explicit model choice. `None` selects the size-switching default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<MethodSpec>,

    /// Seed for the stochastic methods. Fixed seed + fixed input gives a
    /// reproducible packing within one build.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

/// A configured optimization model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MethodSpec {
    Batch(BatchConfig),
    Greedy(GreedyConfig),
    Genetic(GeneticConfig),
    BranchBound(BranchBoundConfig),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BranchBoundConfig {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GreedyConfig {
    /// Consecutive rejected inserts tolerated before the scan stops.
    pub exhaustion_limit: usize,

    /// Ridge regularization for the price model.
    pub regularization: f64,
}

impl Default for GreedyConfig {
    fn default() -> Self {
        Self {
            exhaustion_limit: 128,
            regularization: 1e-3,
        }
    }
}

/// Genome representation for the genetic model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenomeKind {
    /// Permutation of order indices, evaluated by greedy insert in genome
    /// order.
    #[default]
    PackedOrders,
    /// Include/skip bitstring, evaluated in original order.
    DecisionOrders,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneticConfig {
    pub genome: GenomeKind,
    pub population_size: usize,
    pub max_generations: usize,
    pub max_age_secs: u64,
}

impl Default for GeneticConfig {
    fn default() -> Self {
        Self::for_genome(GenomeKind::PackedOrders)
    }
}

impl GeneticConfig {
    /// The standard tuning for each genome representation.
    pub fn for_genome(genome: GenomeKind) -> Self {
        match genome {
            GenomeKind::PackedOrders => Self {
                genome,
                population_size: 256,
                max_generations: 128,
                max_age_secs: 300,
            },
            GenomeKind::DecisionOrders => Self {
                genome,
                population_size: 512,
                max_generations: 64,
                max_age_secs: 300,
            },
        }
    }

    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_secs)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Sub-methods to run. Empty selects the standard trio: greedy, genetic
    /// over packed orders, genetic over decision bits.
    pub methods: Vec<MethodSpec>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_round_trips() {
        let config = EngineConfig::default();
        let encoded = toml::to_string(&config).expect("serialize");
        let decoded: EngineConfig = toml::from_str(&encoded).expect("deserialize");
        assert_eq!(decoded.stale_threshold_secs, 300);
        assert!(decoded.optimization.model.is_none());
    }

    #[test]
    fn test_tagged_model_parses() {
        let raw = r#"
            dry_run = true
            price_threshold_wei = "5"

            [optimization.model]
            type = "genetic"
            genome = "decision_orders"
            population_size = 64
        "#;
        let config: EngineConfig = toml::from_str(raw).expect("parse");
        assert!(config.dry_run);
        assert_eq!(config.price_threshold_wei, U256::from(5u64));
        match config.optimization.model {
            Some(MethodSpec::Genetic(genetic)) => {
                assert_eq!(genetic.genome, GenomeKind::DecisionOrders);
                assert_eq!(genetic.population_size, 64);
            }
            other => panic!("expected genetic model, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_model_tag_is_an_error() {
        let raw = r#"
            [optimization.model]
            type = "simulated_annealing"
        "#;
        assert!(toml::from_str::<EngineConfig>(raw).is_err());
    }

    #[test]
    fn test_genome_defaults_differ() {
        let packed = GeneticConfig::for_genome(GenomeKind::PackedOrders);
        let decision = GeneticConfig::for_genome(GenomeKind::DecisionOrders);
        assert_eq!(packed.population_size, 256);
        assert_eq!(packed.max_generations, 128);
        assert_eq!(decision.population_size, 512);
        assert_eq!(decision.max_generations, 64);
    }
}
