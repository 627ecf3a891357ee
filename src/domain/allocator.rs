//! Allocator: validates estimator output, calls the solver, and cleans the
//! result into a normalized long-only weight vector.

use crate::domain::error::{RebalanceError, SolverFailure};
use crate::domain::estimator::Estimates;
use crate::domain::weights::WeightVector;
use crate::ports::solver_port::SolverPort;
use chrono::NaiveDate;
use log::warn;
use std::fmt;
use std::str::FromStr;

const SYMMETRY_TOL: f64 = 1e-9;

/// What to do when the solver fails for one period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SolverFallback {
    /// Abort the whole backtest.
    #[default]
    Abort,
    /// Hold equal weights for the failed period.
    EqualWeight,
}

impl FromStr for SolverFallback {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "abort" => Ok(SolverFallback::Abort),
            "equal_weight" | "equal" => Ok(SolverFallback::EqualWeight),
            other => Err(format!(
                "unknown solver error policy '{}', expected abort or equal_weight",
                other
            )),
        }
    }
}

impl fmt::Display for SolverFallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolverFallback::Abort => write!(f, "abort"),
            SolverFallback::EqualWeight => write!(f, "equal_weight"),
        }
    }
}

pub struct Allocator<'a> {
    solver: &'a dyn SolverPort,
    fallback: SolverFallback,
}

impl<'a> Allocator<'a> {
    pub fn new(solver: &'a dyn SolverPort, fallback: SolverFallback) -> Self {
        Self { solver, fallback }
    }

    /// Max-Sharpe weights for the period starting `period_start`.
    pub fn optimize(
        &self,
        estimates: &Estimates,
        period_start: NaiveDate,
    ) -> Result<WeightVector, RebalanceError> {
        validate_estimates(estimates)?;
        match self.solve(estimates) {
            Ok(weights) => Ok(WeightVector::new(&estimates.instruments, &weights)),
            Err(failure) => match self.fallback {
                SolverFallback::Abort => Err(RebalanceError::Solver {
                    period_start,
                    failure,
                }),
                SolverFallback::EqualWeight => {
                    warn!(
                        "solver failed for period starting {} ({}); holding equal weights",
                        period_start, failure
                    );
                    Ok(WeightVector::equal(&estimates.instruments))
                }
            },
        }
    }

    fn solve(&self, estimates: &Estimates) -> Result<Vec<f64>, SolverFailure> {
        let n = estimates.instruments.len();
        let raw = self
            .solver
            .max_sharpe(&estimates.expected_returns, &estimates.covariance)?;
        if raw.len() != n {
            return Err(SolverFailure::WrongLength {
                expected: n,
                got: raw.len(),
            });
        }
        normalize(&self.solver.clean(&raw))
    }
}

/// Rescales cleaned weights to sum to 1, rejecting negative or non-finite entries.
pub fn normalize(weights: &[f64]) -> Result<Vec<f64>, SolverFailure> {
    if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
        return Err(SolverFailure::InvalidWeight);
    }
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return Err(SolverFailure::InvalidWeight);
    }
    Ok(weights.iter().map(|w| w / total).collect())
}

fn validate_estimates(estimates: &Estimates) -> Result<(), RebalanceError> {
    let n = estimates.instruments.len();
    let mismatch = |reason: String| RebalanceError::DataAlignment { reason };
    if n == 0 {
        return Err(mismatch("empty instrument universe".into()));
    }
    if estimates.expected_returns.len() != n {
        return Err(mismatch(format!(
            "{} expected returns for {} instruments",
            estimates.expected_returns.len(),
            n
        )));
    }
    if estimates.covariance.len() != n || estimates.covariance.iter().any(|row| row.len() != n) {
        return Err(mismatch(format!("covariance matrix is not {}x{}", n, n)));
    }
    for i in 0..n {
        for j in i + 1..n {
            let (a, b) = (estimates.covariance[i][j], estimates.covariance[j][i]);
            if (a - b).abs() > SYMMETRY_TOL * a.abs().max(b.abs()).max(1.0) {
                return Err(mismatch(format!(
                    "covariance not symmetric between {} and {}",
                    estimates.instruments[i], estimates.instruments[j]
                )));
            }
        }
    }
    if estimates
        .expected_returns
        .iter()
        .chain(estimates.covariance.iter().flatten())
        .any(|v| !v.is_finite())
    {
        return Err(RebalanceError::data("non-finite estimate"));
    }
    Ok(())
}
