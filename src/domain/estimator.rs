//! Estimator adapter: expected returns and covariance from a price window.
//!
//! Expected returns are the exponentially weighted mean of daily simple
//! returns, compounded to an annual figure. Covariance is the sample
//! covariance of the last `cov_lookback` daily returns, annualised.

use crate::domain::error::RebalanceError;
use crate::domain::prices::PriceTable;
use statrs::statistics::Statistics;

#[derive(Debug, Clone, PartialEq)]
pub struct EstimatorConfig {
    pub ema_span: usize,
    pub frequency: f64,
    pub cov_lookback: usize,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        EstimatorConfig {
            ema_span: 500,
            frequency: 252.0,
            cov_lookback: 126,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Estimates {
    pub instruments: Vec<String>,
    pub expected_returns: Vec<f64>,
    pub covariance: Vec<Vec<f64>>,
}

pub struct Estimator {
    config: EstimatorConfig,
}

impl Estimator {
    pub fn new(config: EstimatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EstimatorConfig {
        &self.config
    }

    pub fn estimate(&self, window: &PriceTable) -> Result<Estimates, RebalanceError> {
        let n = window.instruments().len();
        let returns = window.simple_returns();
        let minimum = n.max(2);
        if returns.len() < minimum {
            return Err(RebalanceError::InsufficientData {
                context: format!(
                    "estimation window {}..={}",
                    window.dates().first().map(|d| d.to_string()).unwrap_or_default(),
                    window.dates().last().map(|d| d.to_string()).unwrap_or_default()
                ),
                observations: returns.len(),
                minimum,
            });
        }

        let columns = transpose(&returns, n);
        let expected_returns = columns
            .iter()
            .map(|col| {
                let daily = ewm_mean(col, self.config.ema_span);
                (1.0 + daily).powf(self.config.frequency) - 1.0
            })
            .collect();

        let lookback = self.config.cov_lookback.max(minimum).min(returns.len());
        let recent: Vec<&[f64]> = columns
            .iter()
            .map(|col| &col[col.len() - lookback..])
            .collect();
        let covariance = sample_covariance(&recent, self.config.frequency);

        Ok(Estimates {
            instruments: window.instruments().to_vec(),
            expected_returns,
            covariance,
        })
    }
}

fn transpose(rows: &[Vec<f64>], width: usize) -> Vec<Vec<f64>> {
    (0..width)
        .map(|j| rows.iter().map(|row| row[j]).collect())
        .collect()
}

/// Adjusted exponentially weighted mean at the last observation,
/// `alpha = 2 / (span + 1)`.
pub fn ewm_mean(values: &[f64], span: usize) -> f64 {
    let alpha = 2.0 / (span as f64 + 1.0);
    let decay = 1.0 - alpha;
    let mut weight = 1.0;
    let mut num = 0.0;
    let mut den = 0.0;
    for v in values.iter().rev() {
        num += weight * v;
        den += weight;
        weight *= decay;
    }
    if den > 0.0 { num / den } else { 0.0 }
}

/// Sample (n - 1) covariance matrix of the given columns, scaled by `frequency`.
pub fn sample_covariance(columns: &[&[f64]], frequency: f64) -> Vec<Vec<f64>> {
    let n = columns.len();
    let mut cov = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in i..n {
            let c = columns[i].iter().covariance(columns[j].iter()) * frequency;
            cov[i][j] = c;
            cov[j][i] = c;
        }
    }
    cov
}
