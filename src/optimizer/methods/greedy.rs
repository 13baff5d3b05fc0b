//! Greedy packing guided by a least-squares price predictor.

use tracing::debug;

use crate::errors::MethodError;
use crate::types::MarketOrder;

use super::super::config::GreedyConfig;
use super::super::knapsack::Knapsack;
use super::regression::PriceModel;
use super::{OptimizationMethod, SearchBudget};

/// Trains a price predictor on the full market snapshot, then inserts the
/// matched orders most-overpaid-first. A rejected insert does not stop the
/// scan; the method keeps probing smaller orders until
/// `exhaustion_limit` consecutive rejects.
pub struct GreedyLlsModel {
    all_orders: Vec<MarketOrder>,
    config: GreedyConfig,
}

impl GreedyLlsModel {
    pub fn new(all_orders: Vec<MarketOrder>, config: GreedyConfig) -> Self {
        Self { all_orders, config }
    }
}

impl OptimizationMethod for GreedyLlsModel {
    fn optimize(
        &self,
        knapsack: &mut Knapsack,
        orders: &[MarketOrder],
        budget: &SearchBudget,
    ) -> Result<(), MethodError> {
        let model = PriceModel::fit(&self.all_orders, self.config.regularization)?;

        let mut ranked: Vec<(&MarketOrder, f64)> = orders
            .iter()
            .map(|order| (order, model.residual(order)))
            .collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        let mut consecutive_rejects = 0usize;
        let mut accepted = 0usize;
        for (order, residual) in ranked {
            if budget.expired() {
                break;
            }
            if consecutive_rejects >= self.config.exhaustion_limit {
                break;
            }

            match knapsack.put(order) {
                Ok(()) => {
                    consecutive_rejects = 0;
                    accepted += 1;
                }
                Err(err) => {
                    consecutive_rejects += 1;
                    debug!(order = %order.id, residual, %err, "greedy insert rejected");
                }
            }
        }

        debug!(
            accepted,
            matched = orders.len(),
            trained_on = self.all_orders.len(),
            "greedy packing finished"
        );

        Ok(())
    }

    fn name(&self) -> &'static str {
        "LLS"
    }
}

#[cfg(test)]
mod tests {
    use alloy::primitives::U256;

    use super::super::super::test_support::{bid, knapsack_with_cores};
    use super::*;

    fn run(cores: u64, all: Vec<MarketOrder>, matched: &[MarketOrder]) -> Knapsack {
        let mut knapsack = knapsack_with_cores(cores);
        GreedyLlsModel::new(all, GreedyConfig::default())
            .optimize(&mut knapsack, matched, &SearchBudget::unbounded())
            .expect("optimize");
        knapsack
    }

    #[test]
    fn test_prefers_overpaid_orders() {
        // Both orders want all 8 cores. The market trend is 3 wei per core;
        // order 100 pays double the trend, order 101 half. Only one fits.
        let mut all: Vec<MarketOrder> = (1..=8).map(|c| bid(c, c, c * 3)).collect();
        let overpaid = bid(100, 8, 48);
        let underpaid = bid(101, 8, 12);
        all.push(overpaid.clone());
        all.push(underpaid.clone());

        let packed = run(8, all, &[underpaid, overpaid]);

        assert_eq!(packed.len(), 1);
        assert_eq!(packed.plans()[0].order_id, Some(U256::from(100u64)));
    }

    #[test]
    fn test_scan_continues_past_rejects() {
        // The best-residual order is too big, but smaller ones behind it
        // still fit.
        let big = bid(1, 16, 100);
        let small_a = bid(2, 4, 6);
        let small_b = bid(3, 4, 5);
        let all = vec![big.clone(), small_a.clone(), small_b.clone()];

        let packed = run(8, all.clone(), &all);

        assert_eq!(packed.len(), 2);
        assert_eq!(packed.price(), U256::from(11u64));
    }

    #[test]
    fn test_exhaustion_limit_stops_the_scan() {
        // The two best-residual orders (50 and 49 wei) are oversized; the
        // fitting 2-core order ranks behind them, past the reject limit.
        let mut matched: Vec<MarketOrder> = (0..4).map(|i| bid(i, 16, 50 - i)).collect();
        matched.push(bid(99, 2, 1));
        let all = matched.clone();

        let mut knapsack = knapsack_with_cores(8);
        let config = GreedyConfig {
            exhaustion_limit: 2,
            ..Default::default()
        };
        GreedyLlsModel::new(all, config)
            .optimize(&mut knapsack, &matched, &SearchBudget::unbounded())
            .expect("optimize");

        assert!(knapsack.is_empty(), "scan must stop after 2 rejects");
    }

    #[test]
    fn test_empty_training_set_is_an_error() {
        let mut knapsack = knapsack_with_cores(8);
        let err = GreedyLlsModel::new(Vec::new(), GreedyConfig::default())
            .optimize(&mut knapsack, &[], &SearchBudget::unbounded())
            .unwrap_err();
        assert!(matches!(err, MethodError::Regression(_)));
    }
}
