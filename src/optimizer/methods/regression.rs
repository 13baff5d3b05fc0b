//! Least-squares price prediction over benchmark vectors.
//!
//! The greedy model ranks orders by how much the market overpays them
//! relative to the resources they demand. The predictor behind that ranking
//! is a ridge regression (benchmark vector → price per second) solved
//! directly by normal equations; only the induced residual ordering
//! matters, not the absolute fit.

use nalgebra::{DMatrix, DVector};

use crate::errors::MethodError;
use crate::types::MarketOrder;

/// A fitted linear price predictor.
#[derive(Debug, Clone)]
pub struct PriceModel {
    /// Coefficients; index 0 is the intercept.
    weights: DVector<f64>,
    /// Feature width the model was trained with.
    features: usize,
}

impl PriceModel {
    /// Fit on the full order set.
    ///
    /// `regularization` keeps the normal equations well-posed on collinear
    /// or rank-deficient inputs (e.g. every order demanding the same
    /// shape).
    pub fn fit(orders: &[MarketOrder], regularization: f64) -> Result<Self, MethodError> {
        if orders.is_empty() {
            return Err(MethodError::Regression("no orders to train on".into()));
        }

        let features = orders
            .iter()
            .map(|o| o.benchmarks.len())
            .max()
            .unwrap_or(0);
        let width = features + 1;

        let mut x = DMatrix::zeros(orders.len(), width);
        let mut y = DVector::zeros(orders.len());
        for (row, order) in orders.iter().enumerate() {
            x[(row, 0)] = 1.0;
            for (col, &value) in order.benchmarks.iter().enumerate() {
                x[(row, col + 1)] = value as f64;
            }
            y[row] = order.pps_f64();
        }

        let xt = x.transpose();
        let gram = &xt * &x + DMatrix::identity(width, width) * regularization;
        let rhs = &xt * &y;

        let weights = gram
            .lu()
            .solve(&rhs)
            .ok_or_else(|| MethodError::Regression("normal equations are singular".into()))?;

        Ok(Self { weights, features })
    }

    /// Predicted price per second, in the same float scale as
    /// [`MarketOrder::pps_f64`].
    pub fn predict(&self, order: &MarketOrder) -> f64 {
        let mut value = self.weights[0];
        for (col, &feature) in order.benchmarks.iter().take(self.features).enumerate() {
            value += self.weights[col + 1] * feature as f64;
        }
        value
    }

    /// Actual minus predicted price: positive for orders that pay more
    /// than their resource shape suggests.
    pub fn residual(&self, order: &MarketOrder) -> f64 {
        order.pps_f64() - self.predict(order)
    }
}
