//! Risk/return diagnostics over a compounded value series.

use crate::domain::compositor::PortfolioValueSeries;
use chrono::Datelike;
use statrs::statistics::Statistics;
use std::collections::BTreeMap;

/// Annualisation constant for the Sharpe ratio. Kept at 250 for parity with
/// historical reports although NYSE averages about 252 sessions a year.
pub const DEFAULT_TRADING_DAYS_PER_YEAR: f64 = 250.0;

pub const DEFAULT_DRAWDOWN_WINDOW: usize = 252;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiagnosticsConfig {
    pub trading_days_per_year: f64,
    pub drawdown_window: usize,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        DiagnosticsConfig {
            trading_days_per_year: DEFAULT_TRADING_DAYS_PER_YEAR,
            drawdown_window: DEFAULT_DRAWDOWN_WINDOW,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostics {
    pub total_return: f64,
    pub max_drawdown: f64,
    pub sharpe_ratio: f64,
    pub skew: f64,
    pub kurtosis: f64,
    pub average_annual_return: f64,
}

impl Diagnostics {
    pub fn compute(series: &PortfolioValueSeries, config: &DiagnosticsConfig) -> Self {
        let values = series.values();
        let dated_returns = series.daily_returns();
        let returns: Vec<f64> = dated_returns.iter().map(|(_, r)| *r).collect();

        let total_return = match (series.first(), series.last()) {
            (Some(first), Some(last)) if first.value != 0.0 => last.value / first.value - 1.0,
            _ => 0.0,
        };

        Diagnostics {
            total_return,
            max_drawdown: max_drawdown(&values, config.drawdown_window),
            sharpe_ratio: annualized_sharpe(&returns, config.trading_days_per_year),
            skew: skew(&returns),
            kurtosis: kurtosis(&returns),
            average_annual_return: average_annual_return(&dated_returns),
        }
    }
}

/// `value[t] / max(value[t-w+1..=t]) - 1`, with a partial window at the start.
pub fn rolling_drawdown(values: &[f64], window: usize) -> Vec<f64> {
    let window = window.max(1);
    (0..values.len())
        .map(|t| {
            let lo = (t + 1).saturating_sub(window);
            let peak = values[lo..=t]
                .iter()
                .copied()
                .fold(f64::NEG_INFINITY, f64::max);
            if peak > 0.0 { values[t] / peak - 1.0 } else { 0.0 }
        })
        .collect()
}

/// Most negative rolling drawdown, 0 for an empty or monotone series.
pub fn max_drawdown(values: &[f64], window: usize) -> f64 {
    rolling_drawdown(values, window)
        .into_iter()
        .fold(0.0, f64::min)
}

/// `mean / sample stdev * sqrt(trading_days_per_year)`; 0 when undefined.
pub fn annualized_sharpe(returns: &[f64], trading_days_per_year: f64) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let sd = returns.std_dev();
    if sd.is_nan() || sd <= 0.0 {
        return 0.0;
    }
    returns.mean() / sd * trading_days_per_year.sqrt()
}

fn central_moments(returns: &[f64]) -> Option<(f64, f64, f64)> {
    if returns.is_empty() {
        return None;
    }
    let n = returns.len() as f64;
    let mean = returns.mean();
    let (mut m2, mut m3, mut m4) = (0.0, 0.0, 0.0);
    for r in returns {
        let d = r - mean;
        m2 += d * d;
        m3 += d * d * d;
        m4 += d * d * d * d;
    }
    let (m2, m3, m4) = (m2 / n, m3 / n, m4 / n);
    if m2 > 0.0 { Some((m2, m3, m4)) } else { None }
}

/// Biased Fisher-Pearson skewness `m3 / m2^1.5`.
pub fn skew(returns: &[f64]) -> f64 {
    central_moments(returns)
        .map(|(m2, m3, _)| m3 / m2.powf(1.5))
        .unwrap_or(0.0)
}

/// Biased excess kurtosis `m4 / m2^2 - 3`.
pub fn kurtosis(returns: &[f64]) -> f64 {
    central_moments(returns)
        .map(|(m2, _, m4)| m4 / (m2 * m2) - 3.0)
        .unwrap_or(0.0)
}

/// Daily returns summed per calendar year, averaged over years.
pub fn average_annual_return(returns: &[(chrono::NaiveDate, f64)]) -> f64 {
    let mut by_year: BTreeMap<i32, f64> = BTreeMap::new();
    for (date, r) in returns {
        *by_year.entry(date.year()).or_insert(0.0) += r;
    }
    if by_year.is_empty() {
        return 0.0;
    }
    by_year.values().sum::<f64>() / by_year.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::compositor::compound;
    use approx::assert_abs_diff_eq;
    use chrono::NaiveDate;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn drawdown_scenario() {
        assert_abs_diff_eq!(max_drawdown(&[100.0, 120.0, 90.0, 130.0], 4), -0.25, epsilon = 1e-12);
        assert_abs_diff_eq!(max_drawdown(&[100.0, 120.0, 90.0, 130.0], 252), -0.25, epsilon = 1e-12);
    }

    #[test]
    fn short_window_forgets_old_peak() {
        // window 2: peak over [120, 90] is 120; over [90, 80] it is 90
        let dd = rolling_drawdown(&[120.0, 90.0, 80.0], 2);
        assert_abs_diff_eq!(dd[1], -0.25, epsilon = 1e-12);
        assert_abs_diff_eq!(dd[2], 80.0 / 90.0 - 1.0, epsilon = 1e-12);
    }

    #[test]
    fn monotone_series_has_no_drawdown() {
        assert_eq!(max_drawdown(&[1.0, 2.0, 3.0], 252), 0.0);
        assert_eq!(max_drawdown(&[], 252), 0.0);
    }

    #[test]
    fn sharpe_uses_sample_stdev() {
        let r = [0.01, -0.01, 0.02, 0.0];
        let mean = 0.005;
        let var = r.iter().map(|x| (x - mean) * (x - mean)).sum::<f64>() / 3.0;
        assert_abs_diff_eq!(
            annualized_sharpe(&r, 250.0),
            mean / var.sqrt() * 250f64.sqrt(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn sharpe_of_constant_returns_is_zero() {
        assert_eq!(annualized_sharpe(&[0.01, 0.01, 0.01], 250.0), 0.0);
        assert_eq!(annualized_sharpe(&[0.01], 250.0), 0.0);
    }

    #[test]
    fn symmetric_distribution_has_no_skew() {
        assert_abs_diff_eq!(skew(&[-2.0, -1.0, 0.0, 1.0, 2.0]), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn biased_moments_match_hand_computation() {
        // m2 = 2.5, m4 = 8.5 for [-2, -1, 1, 2] around 0
        let r = [-2.0, -1.0, 1.0, 2.0];
        assert_abs_diff_eq!(kurtosis(&r), 8.5 / 6.25 - 3.0, epsilon = 1e-12);
        let right = [0.0, 0.0, 0.0, 4.0];
        // mean 1: deviations -1,-1,-1,3 → m2 = 3, m3 = 6
        assert_abs_diff_eq!(skew(&right), 6.0 / 3f64.powf(1.5), epsilon = 1e-12);
    }

    #[test]
    fn annual_return_averages_yearly_sums() {
        let r = [
            (d(2020, 6, 1), 0.1),
            (d(2020, 7, 1), 0.05),
            (d(2021, 1, 4), -0.05),
        ];
        assert_abs_diff_eq!(average_annual_return(&r), (0.15 - 0.05) / 2.0, epsilon = 1e-12);
    }

    #[test]
    fn compute_on_value_series() {
        let series = compound(
            d(2024, 1, 1),
            &[(d(2024, 1, 2), 0.2), (d(2024, 1, 3), -0.25), (d(2024, 1, 4), 0.5)],
            100.0,
        );
        let diag = Diagnostics::compute(&series, &DiagnosticsConfig::default());
        assert_abs_diff_eq!(diag.total_return, 100.0 * 1.2 * 0.75 * 1.5 / 100.0 - 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(diag.max_drawdown, -0.25, epsilon = 1e-12);
        assert!(diag.sharpe_ratio > 0.0);
    }
}
