//! Mean-variance optimizer port trait.

use crate::domain::error::SolverFailure;

/// External max-Sharpe solver. Inputs are positional in universe order;
/// `covariance` is square with the same dimension as `expected_returns`.
pub trait SolverPort {
    fn max_sharpe(
        &self,
        expected_returns: &[f64],
        covariance: &[Vec<f64>],
    ) -> Result<Vec<f64>, SolverFailure>;

    /// Snap tiny weights to zero and round; the default keeps raw weights.
    fn clean(&self, raw_weights: &[f64]) -> Vec<f64> {
        raw_weights.to_vec()
    }
}
