//! Whole-share discretization port trait.

use crate::domain::error::RebalanceError;
use crate::domain::weights::{AllocationShares, WeightVector};

pub trait DiscretizationPort {
    fn allocate(
        &self,
        weights: &WeightVector,
        latest_prices: &[(String, f64)],
        capital: f64,
    ) -> Result<AllocationShares, RebalanceError>;
}
