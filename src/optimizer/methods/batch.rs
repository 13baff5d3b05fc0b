//! Best-of coordinator over several packing strategies.

use tracing::{debug, warn};

use crate::errors::MethodError;
use crate::types::MarketOrder;

use super::super::knapsack::Knapsack;
use super::{OptimizationMethod, SearchBudget};

/// Runs every sub-method on an independent clone of the incoming knapsack
/// and keeps the highest-priced result. A failing sub-method is logged and
/// skipped; the batch only fails when all of them do.
///
/// Sub-methods run sequentially for determinism. Price ties keep the
/// earliest method's result.
pub struct BatchModel {
    methods: Vec<Box<dyn OptimizationMethod>>,
}

impl BatchModel {
    pub fn new(methods: Vec<Box<dyn OptimizationMethod>>) -> Self {
        Self { methods }
    }
}

impl OptimizationMethod for BatchModel {
    fn optimize(
        &self,
        knapsack: &mut Knapsack,
        orders: &[MarketOrder],
        budget: &SearchBudget,
    ) -> Result<(), MethodError> {
        let mut winner: Option<Knapsack> = None;

        for method in &self.methods {
            let mut candidate = knapsack.clone();
            match method.optimize(&mut candidate, orders, budget) {
                Ok(()) => {
                    debug!(
                        method = method.name(),
                        price = candidate.pps_f64(),
                        plans = candidate.len(),
                        "sub-method finished"
                    );
                    let better = winner
                        .as_ref()
                        .map(|w| candidate.price() > w.price())
                        .unwrap_or(true);
                    if better {
                        winner = Some(candidate);
                    }
                }
                Err(err) => {
                    warn!(method = method.name(), %err, "sub-method failed, skipping");
                }
            }
        }

        match winner {
            Some(best) => {
                *knapsack = best;
                Ok(())
            }
            None => Err(MethodError::AllMethodsFailed),
        }
    }

    fn name(&self) -> &'static str {
        "BM"
    }
}

#[cfg(test)]
mod tests {
    use alloy::primitives::U256;

    use super::super::super::test_support::{bid, knapsack_with_cores};
    use super::*;

    /// Packs nothing and reports success.
    struct IdleMethod;

    impl OptimizationMethod for IdleMethod {
        fn optimize(
            &self,
            _knapsack: &mut Knapsack,
            _orders: &[MarketOrder],
            _budget: &SearchBudget,
        ) -> Result<(), MethodError> {
            Ok(())
        }

        fn name(&self) -> &'static str {
            "idle"
        }
    }

    /// Packs the single order at the given index.
    struct TakeOne(usize);

    impl OptimizationMethod for TakeOne {
        fn optimize(
            &self,
            knapsack: &mut Knapsack,
            orders: &[MarketOrder],
            _budget: &SearchBudget,
        ) -> Result<(), MethodError> {
            let _ = knapsack.put(&orders[self.0]);
            Ok(())
        }

        fn name(&self) -> &'static str {
            "take-one"
        }
    }

    /// Always fails.
    struct BrokenMethod;

    impl OptimizationMethod for BrokenMethod {
        fn optimize(
            &self,
            _knapsack: &mut Knapsack,
            _orders: &[MarketOrder],
            _budget: &SearchBudget,
        ) -> Result<(), MethodError> {
            Err(MethodError::Regression("broken on purpose".into()))
        }

        fn name(&self) -> &'static str {
            "broken"
        }
    }

    #[test]
    fn test_keeps_best_priced_result() {
        let orders = vec![bid(1, 1, 5), bid(2, 1, 9)];
        let batch = BatchModel::new(vec![Box::new(TakeOne(0)), Box::new(TakeOne(1))]);

        let mut knapsack = knapsack_with_cores(4);
        batch
            .optimize(&mut knapsack, &orders, &SearchBudget::unbounded())
            .expect("optimize");

        assert_eq!(knapsack.price(), U256::from(9u64));
    }

    #[test]
    fn test_failed_sub_method_is_skipped() {
        let orders = vec![bid(1, 1, 5)];
        let batch = BatchModel::new(vec![Box::new(BrokenMethod), Box::new(TakeOne(0))]);

        let mut knapsack = knapsack_with_cores(4);
        batch
            .optimize(&mut knapsack, &orders, &SearchBudget::unbounded())
            .expect("one healthy method is enough");

        assert_eq!(knapsack.price(), U256::from(5u64));
    }

    #[test]
    fn test_all_failing_is_an_error() {
        let orders = vec![bid(1, 1, 5)];
        let batch = BatchModel::new(vec![Box::new(BrokenMethod), Box::new(BrokenMethod)]);

        let mut knapsack = knapsack_with_cores(4);
        let err = batch
            .optimize(&mut knapsack, &orders, &SearchBudget::unbounded())
            .unwrap_err();
        assert!(matches!(err, MethodError::AllMethodsFailed));
        assert!(knapsack.is_empty(), "failure leaves the input untouched");
    }

    #[test]
    fn test_price_tie_keeps_first_method() {
        // Both sub-methods reach the same price through different orders;
        // the earlier one's packing must survive.
        let orders = vec![bid(1, 1, 5), bid(2, 1, 5)];
        let batch = BatchModel::new(vec![Box::new(TakeOne(0)), Box::new(TakeOne(1))]);

        let mut knapsack = knapsack_with_cores(4);
        batch
            .optimize(&mut knapsack, &orders, &SearchBudget::unbounded())
            .expect("optimize");

        assert_eq!(knapsack.plans()[0].order_id, Some(U256::from(1u64)));
    }
}
