//! Weight vectors, daily weight series and share allocations.

use chrono::NaiveDate;

/// Tolerance on `sum(weights) == 1`.
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// Per-instrument weights for one rebalancing period, in universe order.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightVector {
    entries: Vec<(String, f64)>,
}

impl WeightVector {
    pub fn new(instruments: &[String], weights: &[f64]) -> Self {
        WeightVector {
            entries: instruments
                .iter()
                .cloned()
                .zip(weights.iter().copied())
                .collect(),
        }
    }

    pub fn equal(instruments: &[String]) -> Self {
        let w = 1.0 / instruments.len().max(1) as f64;
        Self::new(instruments, &vec![w; instruments.len()])
    }

    /// Weight of `instrument`; instruments not in the vector weigh 0.
    pub fn get(&self, instrument: &str) -> f64 {
        self.entries
            .iter()
            .find(|(id, _)| id == instrument)
            .map(|(_, w)| *w)
            .unwrap_or(0.0)
    }

    pub fn entries(&self) -> &[(String, f64)] {
        &self.entries
    }

    pub fn sum(&self) -> f64 {
        self.entries.iter().map(|(_, w)| w).sum()
    }

    pub fn is_normalized(&self) -> bool {
        self.entries
            .iter()
            .all(|(_, w)| w.is_finite() && (0.0..=1.0 + WEIGHT_SUM_TOLERANCE).contains(w))
            && (self.sum() - 1.0).abs() <= WEIGHT_SUM_TOLERANCE
    }

    /// Weights laid out in the order of `instruments`.
    pub fn aligned_to(&self, instruments: &[String]) -> Vec<f64> {
        instruments.iter().map(|id| self.get(id)).collect()
    }
}

/// One weight row per trading day.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyWeightSeries {
    pub instruments: Vec<String>,
    pub dates: Vec<NaiveDate>,
    pub rows: Vec<Vec<f64>>,
}

impl DailyWeightSeries {
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }
}

/// Whole-share holdings for one period plus uninvested cash.
#[derive(Debug, Clone, PartialEq)]
pub struct AllocationShares {
    pub shares: Vec<(String, u64)>,
    pub leftover: f64,
}

impl AllocationShares {
    pub fn get(&self, instrument: &str) -> u64 {
        self.shares
            .iter()
            .find(|(id, _)| id == instrument)
            .map(|(_, n)| *n)
            .unwrap_or(0)
    }
}
