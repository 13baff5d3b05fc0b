//! The search strategies that pack orders into a knapsack.
//!
//! Every method implements [`OptimizationMethod`] over prefiltered orders.
//! The factory picks a method per run: small inputs get the exact
//! branch-and-bound, large ones the batch of heuristics.

mod batch;
mod branch_bound;
mod genetic;
mod greedy;
mod regression;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::errors::MethodError;
use crate::types::MarketOrder;

use super::config::{GeneticConfig, GenomeKind, GreedyConfig, MethodSpec};
use super::knapsack::Knapsack;

pub use batch::BatchModel;
pub use branch_bound::BranchBoundModel;
pub use genetic::{DecisionOrdersGenome, GeneticModel, PackedOrdersGenome};
pub use greedy::GreedyLlsModel;
pub use regression::PriceModel;

/// Inputs below this size get the exact solver; everything else is batched
/// through the heuristics.
pub const BATCH_DISPATCH_THRESHOLD: usize = 128;

/// Cooperative stop signal for long-running searches.
///
/// Methods poll `expired` at least every 100 ms of wall time and return
/// their best-so-far without error once it fires. Cancellation is a shared
/// flag so one handle can stop both optimization tracks on shutdown.
#[derive(Debug, Clone, Default)]
pub struct SearchBudget {
    deadline: Option<Instant>,
    cancelled: Arc<AtomicBool>,
}

impl SearchBudget {
    /// No deadline; stops only on explicit cancellation.
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn with_deadline(limit: Duration) -> Self {
        Self {
            deadline: Some(Instant::now() + limit),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// A budget sharing this one's cancellation flag but with its own,
    /// possibly tighter, deadline.
    pub fn narrowed(&self, limit: Duration) -> Self {
        let candidate = Instant::now() + limit;
        let deadline = match self.deadline {
            Some(existing) => existing.min(candidate),
            None => candidate,
        };
        Self {
            deadline: Some(deadline),
            cancelled: Arc::clone(&self.cancelled),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn expired(&self) -> bool {
        if self.cancelled.load(Ordering::Relaxed) {
            return true;
        }
        matches!(self.deadline, Some(deadline) if Instant::now() >= deadline)
    }
}

/// One packing strategy.
pub trait OptimizationMethod: Send {
    /// Pack `orders` (already prefiltered) into `knapsack`, maximizing its
    /// price. Implementations observe `budget` and return best-so-far when
    /// it expires.
    fn optimize(
        &self,
        knapsack: &mut Knapsack,
        orders: &[MarketOrder],
        budget: &SearchBudget,
    ) -> Result<(), MethodError>;

    /// Short name for log records.
    fn name(&self) -> &'static str;
}

/// Builds the method for one optimization run.
///
/// `all_orders` is the full market snapshot (the greedy model trains its
/// price predictor on it); `matched` is the prefiltered subset the method
/// will actually pack.
pub trait MethodFactory: Send + Sync {
    fn create(
        &self,
        all_orders: &[MarketOrder],
        matched: &[MarketOrder],
    ) -> Box<dyn OptimizationMethod>;
}

/// The size-switching default: exact search under
/// [`BATCH_DISPATCH_THRESHOLD`], otherwise the heuristic batch.
#[derive(Debug, Clone, Default)]
pub struct DefaultMethodFactory {
    pub seed: u64,
}

impl DefaultMethodFactory {
    pub fn with_seed(seed: u64) -> Self {
        Self { seed }
    }
}

impl MethodFactory for DefaultMethodFactory {
    fn create(
        &self,
        all_orders: &[MarketOrder],
        matched: &[MarketOrder],
    ) -> Box<dyn OptimizationMethod> {
        if matched.len() < BATCH_DISPATCH_THRESHOLD {
            return Box::new(BranchBoundModel::default());
        }

        Box::new(BatchModel::new(vec![
            Box::new(GreedyLlsModel::new(
                all_orders.to_vec(),
                GreedyConfig::default(),
            )),
            Box::new(GeneticModel::<PackedOrdersGenome>::new(
                GeneticConfig::for_genome(GenomeKind::PackedOrders),
                self.seed,
            )),
            Box::new(GeneticModel::<DecisionOrdersGenome>::new(
                GeneticConfig::for_genome(GenomeKind::DecisionOrders),
                self.seed,
            )),
        ]))
    }
}

/// Factory for an explicitly configured model, honored regardless of
/// input size.
pub struct SpecMethodFactory {
    spec: MethodSpec,
    seed: u64,
}

impl SpecMethodFactory {
    pub fn new(spec: MethodSpec, seed: u64) -> Self {
        Self { spec, seed }
    }

    fn build(
        &self,
        spec: &MethodSpec,
        all_orders: &[MarketOrder],
    ) -> Box<dyn OptimizationMethod> {
        match spec {
            MethodSpec::BranchBound(_) => Box::new(BranchBoundModel::default()),
            MethodSpec::Greedy(config) => {
                Box::new(GreedyLlsModel::new(all_orders.to_vec(), config.clone()))
            }
            MethodSpec::Genetic(config) => match config.genome {
                GenomeKind::PackedOrders => Box::new(GeneticModel::<PackedOrdersGenome>::new(
                    config.clone(),
                    self.seed,
                )),
                GenomeKind::DecisionOrders => Box::new(
                    GeneticModel::<DecisionOrdersGenome>::new(config.clone(), self.seed),
                ),
            },
            MethodSpec::Batch(config) => {
                let specs: Vec<MethodSpec> = if config.methods.is_empty() {
                    vec![
                        MethodSpec::Greedy(GreedyConfig::default()),
                        MethodSpec::Genetic(GeneticConfig::for_genome(GenomeKind::PackedOrders)),
                        MethodSpec::Genetic(GeneticConfig::for_genome(GenomeKind::DecisionOrders)),
                    ]
                } else {
                    config.methods.clone()
                };
                let methods = specs
                    .iter()
                    .map(|sub| self.build(sub, all_orders))
                    .collect();
                Box::new(BatchModel::new(methods))
            }
        }
    }
}

impl MethodFactory for SpecMethodFactory {
    fn create(
        &self,
        all_orders: &[MarketOrder],
        _matched: &[MarketOrder],
    ) -> Box<dyn OptimizationMethod> {
        self.build(&self.spec, all_orders)
    }
}
