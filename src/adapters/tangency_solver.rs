//! Long-only maximum Sharpe (tangency) solver.
//!
//! The tangency portfolio is found as the quadratic program
//! `minimize w'Σw  subject to (μ − rf)'w = 1, w >= 0`, solved with Clarabel,
//! then rescaled to sum to 1.

use crate::domain::error::SolverFailure;
use crate::ports::solver_port::SolverPort;
use clarabel::algebra::CscMatrix;
use clarabel::solver::{
    DefaultSettingsBuilder, DefaultSolver, IPSolver, NonnegativeConeT, SolverStatus, ZeroConeT,
};
use log::debug;

const CLEAN_DECIMALS: i32 = 5;
const MIN_VARIANCE: f64 = 1e-12;

#[derive(Debug, Clone)]
pub struct TangencySolver {
    pub risk_free_rate: f64,
    pub weight_cutoff: f64,
    pub max_iterations: usize,
}

impl Default for TangencySolver {
    fn default() -> Self {
        TangencySolver {
            risk_free_rate: 0.02,
            weight_cutoff: 1e-4,
            max_iterations: 10_000,
        }
    }
}

/// Upper triangle of the covariance in compressed column form.
fn upper_triangle(cov: &[Vec<f64>]) -> CscMatrix<f64> {
    let n = cov.len();
    let mut data = Vec::new();
    let mut indices = Vec::new();
    let mut indptr = vec![0];
    for j in 0..n {
        for (i, row) in cov.iter().enumerate().take(j + 1) {
            let val = row[j];
            if val != 0.0 {
                data.push(val);
                indices.push(i);
            }
        }
        indptr.push(data.len());
    }
    CscMatrix::new(n, n, indptr, indices, data)
}

/// Row 0 is the excess-return equality, rows 1..=n are `-w_j <= 0`.
fn constraints(excess: &[f64]) -> CscMatrix<f64> {
    let n = excess.len();
    let mut data = Vec::with_capacity(2 * n);
    let mut indices = Vec::with_capacity(2 * n);
    let mut indptr = vec![0];
    for (j, e) in excess.iter().enumerate() {
        if *e != 0.0 {
            data.push(*e);
            indices.push(0);
        }
        data.push(-1.0);
        indices.push(1 + j);
        indptr.push(data.len());
    }
    CscMatrix::new(1 + n, n, indptr, indices, data)
}

fn variance(w: &[f64], cov: &[Vec<f64>]) -> f64 {
    w.iter()
        .zip(cov)
        .map(|(wi, row)| wi * row.iter().zip(w).map(|(c, wj)| c * wj).sum::<f64>())
        .sum()
}

impl SolverPort for TangencySolver {
    fn max_sharpe(
        &self,
        expected_returns: &[f64],
        covariance: &[Vec<f64>],
    ) -> Result<Vec<f64>, SolverFailure> {
        let n = expected_returns.len();
        let excess: Vec<f64> = expected_returns
            .iter()
            .map(|m| m - self.risk_free_rate)
            .collect();
        if !excess.iter().any(|e| *e > 0.0) {
            return Err(SolverFailure::NoPositiveExcessReturn {
                risk_free_rate: self.risk_free_rate,
            });
        }

        let p = upper_triangle(covariance);
        let q = vec![0.0; n];
        let a = constraints(&excess);
        let mut b = vec![1.0];
        b.extend(vec![0.0; n]);
        let cones = [ZeroConeT(1), NonnegativeConeT(n)];

        let max_iter = u32::try_from(self.max_iterations).unwrap_or(u32::MAX);
        let settings = DefaultSettingsBuilder::default()
            .max_iter(max_iter)
            .verbose(false)
            .build()
            .map_err(|e| SolverFailure::Unsolved {
                status: format!("invalid settings: {}", e),
            })?;
        let mut solver = DefaultSolver::new(&p, &q, &a, &b, &cones, settings).map_err(|e| {
            SolverFailure::Unsolved {
                status: format!("{:?}", e),
            }
        })?;
        solver.solve();

        debug!(
            "tangency QP over {} instruments: {:?} after {} iterations",
            n, solver.solution.status, solver.info.iterations
        );
        match &solver.solution.status {
            SolverStatus::Solved => {}
            SolverStatus::MaxIterations | SolverStatus::MaxTime => {
                return Err(SolverFailure::NonConvergence {
                    iterations: self.max_iterations,
                });
            }
            other => {
                return Err(SolverFailure::Unsolved {
                    status: format!("{:?}", other),
                });
            }
        }

        let x: Vec<f64> = solver.solution.x.iter().map(|w| w.max(0.0)).collect();
        let total: f64 = x.iter().sum();
        if !(total.is_finite() && total > 0.0) {
            return Err(SolverFailure::InvalidWeight);
        }
        let weights: Vec<f64> = x.iter().map(|w| w / total).collect();
        if variance(&weights, covariance) <= MIN_VARIANCE {
            return Err(SolverFailure::SingularCovariance);
        }
        Ok(weights)
    }

    fn clean(&self, raw_weights: &[f64]) -> Vec<f64> {
        let scale = 10f64.powi(CLEAN_DECIMALS);
        raw_weights
            .iter()
            .map(|w| {
                if w.abs() < self.weight_cutoff {
                    0.0
                } else {
                    (w * scale).round() / scale
                }
            })
            .collect()
    }
}
