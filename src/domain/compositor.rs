//! Return and benchmark compositors.
//!
//! The portfolio return of a day is the weight-by-return dot product; the
//! value series compounds it forward from the initial capital in one scan.

use crate::domain::error::RebalanceError;
use crate::domain::prices::ReturnTable;
use crate::domain::weights::DailyWeightSeries;
use crate::ports::signal_port::SignalGate;
use chrono::NaiveDate;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValuePoint {
    pub date: NaiveDate,
    pub value: f64,
}

/// Cumulative value, one point per session plus the leading base-date point
/// holding the initial capital.
#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioValueSeries {
    pub points: Vec<ValuePoint>,
}

impl PortfolioValueSeries {
    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value).collect()
    }

    pub fn first(&self) -> Option<&ValuePoint> {
        self.points.first()
    }

    pub fn last(&self) -> Option<&ValuePoint> {
        self.points.last()
    }

    /// Day-over-day simple returns, dated by the later point.
    pub fn daily_returns(&self) -> Vec<(NaiveDate, f64)> {
        self.points
            .windows(2)
            .map(|w| {
                let r = if w[0].value != 0.0 {
                    w[1].value / w[0].value - 1.0
                } else {
                    0.0
                };
                (w[1].date, r)
            })
            .collect()
    }
}

/// Compounds `value[t] = value[t-1] * (1 + r[t])` starting at `base_date`.
pub fn compound(
    base_date: NaiveDate,
    returns: &[(NaiveDate, f64)],
    initial_capital: f64,
) -> PortfolioValueSeries {
    let mut points = Vec::with_capacity(returns.len() + 1);
    points.push(ValuePoint {
        date: base_date,
        value: initial_capital,
    });
    let mut value = initial_capital;
    for (date, r) in returns {
        value *= 1.0 + r;
        points.push(ValuePoint { date: *date, value });
    }
    PortfolioValueSeries { points }
}

/// Weighted daily portfolio returns, with gated-off days forced to zero.
pub fn portfolio_returns(
    weights: &DailyWeightSeries,
    returns: &ReturnTable,
    gate: Option<&dyn SignalGate>,
) -> Result<Vec<(NaiveDate, f64)>, RebalanceError> {
    if weights.dates.len() != returns.dates.len() {
        return Err(RebalanceError::DataAlignment {
            reason: format!(
                "{} weight rows but {} return rows",
                weights.dates.len(),
                returns.dates.len()
            ),
        });
    }
    if let Some((w, r)) = weights
        .dates
        .iter()
        .zip(&returns.dates)
        .find(|(w, r)| w != r)
    {
        return Err(RebalanceError::DataAlignment {
            reason: format!("weight date {} does not match return date {}", w, r),
        });
    }

    let columns = weights
        .instruments
        .iter()
        .map(|id| {
            returns
                .instruments
                .iter()
                .position(|r| r == id)
                .ok_or_else(|| RebalanceError::DataAlignment {
                    reason: format!("no daily returns for weighted instrument {}", id),
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(weights
        .dates
        .iter()
        .zip(weights.rows.iter().zip(&returns.rows))
        .map(|(date, (w_row, r_row))| {
            let active = gate.is_none_or(|g| g.is_active(*date));
            let r = if active {
                w_row
                    .iter()
                    .zip(&columns)
                    .map(|(w, &c)| w * r_row[c])
                    .sum()
            } else {
                0.0
            };
            (*date, r)
        })
        .collect())
}

/// Portfolio value series. `returns` must cover exactly the weight dates.
pub fn compose(
    weights: &DailyWeightSeries,
    returns: &ReturnTable,
    initial_capital: f64,
    gate: Option<&dyn SignalGate>,
) -> Result<PortfolioValueSeries, RebalanceError> {
    let daily = portfolio_returns(weights, returns, gate)?;
    Ok(compound(returns.base_date, &daily, initial_capital))
}

/// Single-instrument value series with implicit weight 1 and no gate.
pub fn compose_benchmark(
    returns: &ReturnTable,
    benchmark: &str,
    initial_capital: f64,
) -> Result<PortfolioValueSeries, RebalanceError> {
    let column = returns.column(benchmark)?;
    Ok(compound(returns.base_date, &column, initial_capital))
}
