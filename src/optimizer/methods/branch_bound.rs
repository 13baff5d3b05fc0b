//! Exact branch-and-bound search for small inputs.

use alloy::primitives::U256;
use tracing::debug;

use crate::errors::MethodError;
use crate::types::MarketOrder;

use super::super::knapsack::Knapsack;
use super::{OptimizationMethod, SearchBudget};

/// Depth-first branch-and-bound over a price-sorted order list.
///
/// Each node branches into include/skip. The upper bound is the sum of
/// remaining per-second prices: loose, but admissible, so pruning never
/// discards the optimum. Leaves update the best-so-far; equal prices prefer
/// fewer plans. When the budget expires the best-so-far is returned.
#[derive(Debug, Clone, Default)]
pub struct BranchBoundModel {}

struct Search<'a> {
    orders: Vec<&'a MarketOrder>,
    /// `suffix[i]` = sum of prices of `orders[i..]`.
    suffix: Vec<U256>,
    budget: &'a SearchBudget,
    best: Option<Knapsack>,
    best_price: U256,
}

impl<'a> Search<'a> {
    fn new(orders: &'a [MarketOrder], budget: &'a SearchBudget) -> Self {
        let mut sorted: Vec<&MarketOrder> = orders.iter().collect();
        sorted.sort_by(|a, b| b.price_per_second.cmp(&a.price_per_second));

        let mut suffix = vec![U256::ZERO; sorted.len() + 1];
        for i in (0..sorted.len()).rev() {
            suffix[i] = suffix[i + 1] + sorted[i].price_per_second;
        }

        Self {
            orders: sorted,
            suffix,
            budget,
            best: None,
            best_price: U256::ZERO,
        }
    }

    fn record_leaf(&mut self, leaf: &Knapsack) {
        let price = leaf.price();
        let better = match &self.best {
            None => true,
            Some(best) => price > self.best_price || (price == self.best_price && leaf.len() < best.len()),
        };
        if better {
            self.best_price = price;
            self.best = Some(leaf.clone());
        }
    }

    fn visit(&mut self, index: usize, current: &Knapsack) {
        if self.budget.expired() {
            return;
        }

        if index == self.orders.len() {
            self.record_leaf(current);
            return;
        }

        if self.best.is_some() && current.price() + self.suffix[index] <= self.best_price {
            return;
        }

        // Include branch first: the price-descending order makes promising
        // packings appear early, which tightens pruning.
        let mut included = current.clone();
        if included.put(self.orders[index]).is_ok() {
            self.visit(index + 1, &included);
        }

        self.visit(index + 1, current);
    }
}

impl OptimizationMethod for BranchBoundModel {
    fn optimize(
        &self,
        knapsack: &mut Knapsack,
        orders: &[MarketOrder],
        budget: &SearchBudget,
    ) -> Result<(), MethodError> {
        let mut search = Search::new(orders, budget);
        let root = knapsack.clone();
        search.visit(0, &root);

        if let Some(best) = search.best {
            debug!(
                orders = orders.len(),
                plans = best.len(),
                "branch-and-bound finished"
            );
            *knapsack = best;
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        "BBM"
    }
}
