//! Backtest driver: partition, estimate, allocate, expand, compound.
//!
//! BacktestConfig carries every run parameter; the external collaborators are
//! passed in as port trait objects through [`Collaborators`].

use crate::domain::allocator::{Allocator, SolverFallback};
use crate::domain::calendar::CalendarAligner;
use crate::domain::compositor::{compose, compose_benchmark, PortfolioValueSeries};
use crate::domain::diagnostics::{Diagnostics, DiagnosticsConfig};
use crate::domain::error::RebalanceError;
use crate::domain::estimator::{Estimator, EstimatorConfig};
use crate::domain::expander::expand;
use crate::domain::partition::{partition, PeriodLength, PeriodPlan, RebalancePeriod};
use crate::domain::prices::PriceTable;
use crate::domain::weights::{AllocationShares, DailyWeightSeries, WeightVector};
use crate::ports::calendar_port::CalendarPort;
use crate::ports::discretization_port::DiscretizationPort;
use crate::ports::signal_port::SignalGate;
use crate::ports::solver_port::SolverPort;
use chrono::NaiveDate;
use log::{debug, info, warn};
use std::fmt;
use std::str::FromStr;

/// Which prices feed the estimator for a holding period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EstimationWindow {
    /// The holding period itself (look-ahead; reproduces historical reports).
    #[default]
    InSample,
    /// The period immediately preceding the holding period.
    Trailing,
}

impl FromStr for EstimationWindow {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "in_sample" | "insample" => Ok(EstimationWindow::InSample),
            "trailing" | "out_of_sample" => Ok(EstimationWindow::Trailing),
            other => Err(format!(
                "unknown estimation window '{}', expected in_sample or trailing",
                other
            )),
        }
    }
}

impl fmt::Display for EstimationWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EstimationWindow::InSample => write!(f, "in_sample"),
            EstimationWindow::Trailing => write!(f, "trailing"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BacktestConfig {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub initial_capital: f64,
    pub tickers: Vec<String>,
    pub benchmark: String,
    pub period: PeriodLength,
    pub estimation_window: EstimationWindow,
    pub on_solver_error: SolverFallback,
    pub estimator: EstimatorConfig,
    pub diagnostics: DiagnosticsConfig,
}

/// External collaborators of one run.
pub struct Collaborators<'a> {
    pub calendar: &'a dyn CalendarPort,
    pub solver: &'a dyn SolverPort,
    pub discretizer: &'a dyn DiscretizationPort,
    pub gate: Option<&'a dyn SignalGate>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PeriodAllocation {
    pub period: RebalancePeriod,
    pub estimation: RebalancePeriod,
    pub weights: WeightVector,
    pub shares: AllocationShares,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestResult {
    pub periods: Vec<PeriodAllocation>,
    pub daily_weights: DailyWeightSeries,
    pub portfolio: PortfolioValueSeries,
    pub benchmark: PortfolioValueSeries,
}

impl BacktestResult {
    pub fn portfolio_diagnostics(&self, config: &DiagnosticsConfig) -> Diagnostics {
        Diagnostics::compute(&self.portfolio, config)
    }

    pub fn benchmark_diagnostics(&self, config: &DiagnosticsConfig) -> Diagnostics {
        Diagnostics::compute(&self.benchmark, config)
    }

    pub fn latest(&self) -> Option<&PeriodAllocation> {
        self.periods.last()
    }
}

fn estimation_period(
    plan: &PeriodPlan,
    mode: EstimationWindow,
    instruments: usize,
) -> Result<RebalancePeriod, RebalanceError> {
    match mode {
        EstimationWindow::InSample => Ok(plan.holding),
        EstimationWindow::Trailing => plan.lookback.ok_or_else(|| RebalanceError::InsufficientData {
            context: format!("trailing estimation window before {}", plan.holding.start),
            observations: 0,
            minimum: instruments.max(2),
        }),
    }
}

/// Runs the full simulation over `prices`. Any failing period aborts the run.
pub fn run_backtest(
    prices: &PriceTable,
    config: &BacktestConfig,
    ports: &Collaborators<'_>,
) -> Result<BacktestResult, RebalanceError> {
    if config.tickers.is_empty() {
        return Err(RebalanceError::invalid("backtest", "tickers", "no tickers configured"));
    }
    if !(config.initial_capital.is_finite() && config.initial_capital > 0.0) {
        return Err(RebalanceError::invalid(
            "backtest",
            "initial_capital",
            "initial capital must be positive",
        ));
    }
    if config.estimation_window == EstimationWindow::InSample {
        warn!("estimation window is in_sample: each period's weights are fitted on that period's own prices");
    }

    let aligner = CalendarAligner::new(ports.calendar);
    let plans = partition(&aligner, config.start_date, config.end_date, config.period)?;
    info!(
        "{} {} periods from {} to {}",
        plans.len(),
        config.period,
        plans[0].holding.start,
        plans[plans.len() - 1].holding.end
    );

    let universe = prices.select(&config.tickers)?;
    let mut columns = config.tickers.clone();
    if !columns.contains(&config.benchmark) {
        columns.push(config.benchmark.clone());
    }
    let returns = prices.select(&columns)?.log_returns()?;

    let estimator = Estimator::new(config.estimator.clone());
    let allocator = Allocator::new(ports.solver, config.on_solver_error);

    let mut periods = Vec::with_capacity(plans.len());
    for plan in &plans {
        let estimation = estimation_period(plan, config.estimation_window, config.tickers.len())?;
        let window = universe.slice(estimation.start, estimation.end);
        let estimates = estimator.estimate(&window)?;
        let weights = allocator.optimize(&estimates, plan.holding.start)?;
        let latest = window.latest_prices().ok_or_else(|| RebalanceError::InsufficientData {
            context: format!("latest prices for {}", estimation),
            observations: 0,
            minimum: 1,
        })?;
        let shares = ports
            .discretizer
            .allocate(&weights, &latest, config.initial_capital)?;
        info!(
            "period {}: {}",
            plan.holding,
            weights
                .entries()
                .iter()
                .filter(|(_, w)| *w > 0.0)
                .map(|(id, w)| format!("{}={:.4}", id, w))
                .collect::<Vec<_>>()
                .join(" ")
        );
        debug!("period {} leftover cash {:.2}", plan.holding, shares.leftover);
        periods.push(PeriodAllocation {
            period: plan.holding,
            estimation,
            weights,
            shares,
        });
    }

    let schedule: Vec<(RebalancePeriod, WeightVector)> = periods
        .iter()
        .map(|p| (p.period, p.weights.clone()))
        .collect();
    let daily_weights = expand(&schedule, &aligner, &config.tickers)?;
    let (first, last) = match (daily_weights.dates.first(), daily_weights.dates.last()) {
        (Some(f), Some(l)) => (*f, *l),
        _ => {
            return Err(RebalanceError::EmptyRange {
                start: config.start_date,
                end: config.end_date,
            });
        }
    };
    let horizon_returns = returns.slice(first, last)?;
    debug!(
        "{} daily weight rows, {} return rows",
        daily_weights.len(),
        horizon_returns.len()
    );

    let portfolio = compose(&daily_weights, &horizon_returns, config.initial_capital, ports.gate)?;
    let benchmark = compose_benchmark(&horizon_returns, &config.benchmark, config.initial_capital)?;

    Ok(BacktestResult {
        periods,
        daily_weights,
        portfolio,
        benchmark,
    })
}
