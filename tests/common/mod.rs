#![allow(dead_code)]

use chrono::{Datelike, NaiveDate, Weekday};
use rebalancer::adapters::nyse_calendar::NyseCalendar;
use rebalancer::domain::allocator::SolverFallback;
use rebalancer::domain::backtest::{BacktestConfig, EstimationWindow};
use rebalancer::domain::diagnostics::DiagnosticsConfig;
use rebalancer::domain::error::{RebalanceError, SolverFailure};
use rebalancer::domain::estimator::EstimatorConfig;
use rebalancer::domain::partition::PeriodLength;
use rebalancer::domain::prices::PriceTable;
use rebalancer::domain::regime::MacroObservation;
use rebalancer::domain::weights::{AllocationShares, WeightVector};
use rebalancer::ports::calendar_port::CalendarPort;
use rebalancer::ports::data_port::DataPort;
use rebalancer::ports::discretization_port::DiscretizationPort;
use rebalancer::ports::solver_port::SolverPort;
use std::cell::Cell;
use std::fs;
use std::path::{Path, PathBuf};

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn ids(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

/// Monday to Friday, minus the listed holidays.
pub struct WeekdayCalendar {
    pub holidays: Vec<NaiveDate>,
}

impl WeekdayCalendar {
    pub fn new() -> Self {
        Self { holidays: vec![] }
    }

    pub fn with_holiday(mut self, day: NaiveDate) -> Self {
        self.holidays.push(day);
        self
    }
}

impl CalendarPort for WeekdayCalendar {
    fn schedule(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<NaiveDate>, RebalanceError> {
        Ok(start
            .iter_days()
            .take_while(|d| *d <= end)
            .filter(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun))
            .filter(|d| !self.holidays.contains(d))
            .collect())
    }
}

/// Returns the same answer every call and counts calls.
pub struct ScriptedSolver {
    pub answer: Result<Vec<f64>, SolverFailure>,
    pub calls: Cell<usize>,
}

impl ScriptedSolver {
    pub fn weights(weights: &[f64]) -> Self {
        Self {
            answer: Ok(weights.to_vec()),
            calls: Cell::new(0),
        }
    }

    pub fn failing(failure: SolverFailure) -> Self {
        Self {
            answer: Err(failure),
            calls: Cell::new(0),
        }
    }
}

impl SolverPort for ScriptedSolver {
    fn max_sharpe(&self, _: &[f64], _: &[Vec<f64>]) -> Result<Vec<f64>, SolverFailure> {
        self.calls.set(self.calls.get() + 1);
        self.answer.clone()
    }
}

/// Holds everything as cash.
pub struct NoopDiscretizer;

impl DiscretizationPort for NoopDiscretizer {
    fn allocate(
        &self,
        _: &WeightVector,
        _: &[(String, f64)],
        capital: f64,
    ) -> Result<AllocationShares, RebalanceError> {
        Ok(AllocationShares {
            shares: vec![],
            leftover: capital,
        })
    }
}

pub struct MockDataPort {
    pub prices: PriceTable,
    pub macro_series: Vec<MacroObservation>,
}

impl MockDataPort {
    pub fn new(prices: PriceTable) -> Self {
        Self {
            prices,
            macro_series: vec![],
        }
    }

    pub fn with_macro(mut self, series: Vec<MacroObservation>) -> Self {
        self.macro_series = series;
        self
    }
}

impl DataPort for MockDataPort {
    fn load_prices(&self, instruments: &[String]) -> Result<PriceTable, RebalanceError> {
        self.prices.select(instruments)
    }

    fn load_macro_series(&self) -> Result<Vec<MacroObservation>, RebalanceError> {
        Ok(self.macro_series.clone())
    }
}

/// Deterministic trending, oscillating prices on the calendar's sessions.
/// Column `k` drifts by `drifts[k]` per session in log terms.
pub fn synthetic_prices(
    calendar: &dyn CalendarPort,
    tickers: &[&str],
    drifts: &[f64],
    from: NaiveDate,
    to: NaiveDate,
) -> PriceTable {
    let dates = calendar.schedule(from, to).unwrap();
    let rows = (0..dates.len())
        .map(|t| {
            let t = t as f64;
            drifts
                .iter()
                .enumerate()
                .map(|(k, drift)| {
                    let k = k as f64;
                    let wobble = 0.02 * (t * (0.7 + 0.31 * k) + k).sin()
                        + 0.01 * (t * (0.13 + 0.05 * k)).cos();
                    (50.0 + 25.0 * k) * (drift * t + wobble).exp()
                })
                .collect()
        })
        .collect();
    PriceTable::new(ids(tickers), dates, rows).unwrap()
}

pub fn nyse_prices(tickers: &[&str], drifts: &[f64], from: NaiveDate, to: NaiveDate) -> PriceTable {
    synthetic_prices(&NyseCalendar::new(), tickers, drifts, from, to)
}

pub fn sample_config(tickers: &[&str]) -> BacktestConfig {
    BacktestConfig {
        start_date: date(2006, 1, 1),
        end_date: date(2007, 12, 31),
        initial_capital: 5000.0,
        tickers: ids(tickers),
        benchmark: tickers[0].to_string(),
        period: PeriodLength::SixMonths,
        estimation_window: EstimationWindow::InSample,
        on_solver_error: SolverFallback::Abort,
        estimator: EstimatorConfig::default(),
        diagnostics: DiagnosticsConfig::default(),
    }
}

/// Wide price CSV in the layout the CSV adapter reads.
pub fn prices_csv(table: &PriceTable) -> String {
    let mut out = format!("date,{}\n", table.instruments().join(","));
    for (d, row) in table.dates().iter().zip(table.rows()) {
        let cells: Vec<String> = row.iter().map(|p| format!("{:.6}", p)).collect();
        out.push_str(&format!("{},{}\n", d, cells.join(",")));
    }
    out
}

pub fn write_fixture(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}
