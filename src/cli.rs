//! CLI definition and dispatch.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use log::{debug, info};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvDataAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::greedy_allocator::GreedyAllocator;
use crate::adapters::nyse_calendar::NyseCalendar;
use crate::adapters::price_calendar::PriceIndexCalendar;
use crate::adapters::tangency_solver::TangencySolver;
use crate::domain::allocator::SolverFallback;
use crate::domain::backtest::{self as backtest_engine, BacktestConfig, BacktestResult, Collaborators, EstimationWindow};
use crate::domain::config_validation::{calendar_source, parse_date, validate_config, CalendarSource};
use crate::domain::diagnostics::{Diagnostics, DiagnosticsConfig};
use crate::domain::error::RebalanceError;
use crate::domain::estimator::EstimatorConfig;
use crate::domain::partition::PeriodLength;
use crate::domain::regime::{unemployment_trend_signal, DailyGate, DEFAULT_MA_WINDOW};
use crate::ports::calendar_port::CalendarPort;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::signal_port::SignalGate;

#[derive(Parser, Debug)]
#[command(name = "rebalancer", about = "Periodic max-Sharpe rebalancing backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the rebalancing backtest
    Run {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Validate a configuration file without loading data
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// List trading sessions between two dates
    Sessions {
        #[arg(long)]
        start: NaiveDate,
        #[arg(long)]
        end: NaiveDate,
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Run { config } => run_backtest(&config),
        Command::Validate { config } => run_validate(&config),
        Command::Sessions { start, end, config } => run_sessions(start, end, config.as_ref()),
    }
}

fn fail(err: &RebalanceError) -> ExitCode {
    eprintln!("error: {err}");
    ExitCode::from(err)
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| fail(&e))
}

/// Relative data paths are taken from the directory holding the config file.
pub fn resolve_path(base_dir: &Path, raw: &str) -> PathBuf {
    let path = PathBuf::from(raw);
    if path.is_absolute() {
        path
    } else {
        base_dir.join(path)
    }
}

fn parse_choice<T: std::str::FromStr<Err = String>>(
    adapter: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: T,
) -> Result<T, RebalanceError> {
    match adapter.get_string(section, key) {
        Some(raw) => raw
            .parse()
            .map_err(|reason| RebalanceError::invalid(section, key, reason)),
        None => Ok(default),
    }
}

fn positive_usize(adapter: &dyn ConfigPort, section: &str, key: &str, default: usize) -> Result<usize, RebalanceError> {
    let value = adapter.get_int(section, key, default as i64);
    usize::try_from(value)
        .ok()
        .filter(|v| *v > 0)
        .ok_or_else(|| RebalanceError::invalid(section, key, format!("{} must be at least 1", key)))
}

pub fn build_backtest_config(adapter: &dyn ConfigPort) -> Result<BacktestConfig, RebalanceError> {
    let start_date = parse_date(adapter.get_string("backtest", "start_date").as_deref(), "backtest", "start_date")?;
    let end_date = parse_date(adapter.get_string("backtest", "end_date").as_deref(), "backtest", "end_date")?;
    let tickers = adapter
        .get_list("backtest", "tickers")
        .filter(|t| !t.is_empty())
        .ok_or_else(|| RebalanceError::missing("backtest", "tickers"))?;
    let benchmark = adapter
        .get_string("backtest", "benchmark")
        .unwrap_or_else(|| tickers[0].clone());
    let period = parse_choice(adapter, "backtest", "period", PeriodLength::SixMonths)?;

    let estimator = EstimatorConfig {
        ema_span: positive_usize(adapter, "estimator", "ema_span", 500)?,
        frequency: adapter.get_double("estimator", "frequency", 252.0),
        cov_lookback: positive_usize(adapter, "estimator", "cov_lookback", period.nominal_sessions())?,
    };
    let diagnostics = DiagnosticsConfig {
        trading_days_per_year: adapter.get_double(
            "diagnostics",
            "trading_days_per_year",
            DiagnosticsConfig::default().trading_days_per_year,
        ),
        drawdown_window: positive_usize(
            adapter,
            "diagnostics",
            "drawdown_window",
            DiagnosticsConfig::default().drawdown_window,
        )?,
    };

    Ok(BacktestConfig {
        start_date,
        end_date,
        initial_capital: adapter.get_double("backtest", "initial_capital", 5000.0),
        tickers,
        benchmark,
        period,
        estimation_window: parse_choice(adapter, "backtest", "estimation_window", EstimationWindow::InSample)?,
        on_solver_error: parse_choice(adapter, "backtest", "on_solver_error", SolverFallback::Abort)?,
        estimator,
        diagnostics,
    })
}

pub fn build_solver(adapter: &dyn ConfigPort) -> Result<TangencySolver, RebalanceError> {
    let defaults = TangencySolver::default();
    Ok(TangencySolver {
        risk_free_rate: adapter.get_double("optimizer", "risk_free_rate", defaults.risk_free_rate),
        weight_cutoff: adapter.get_double("optimizer", "weight_cutoff", defaults.weight_cutoff),
        max_iterations: positive_usize(adapter, "optimizer", "max_iterations", defaults.max_iterations)?,
    })
}

/// Everything `run` prints, computed before any output is written.
pub struct RunReport {
    pub config: BacktestConfig,
    pub result: BacktestResult,
    pub portfolio: Diagnostics,
    pub benchmark: Diagnostics,
}

/// Stages after config load: validate, load data, build ports, simulate.
pub fn run_pipeline(adapter: &dyn ConfigPort, base_dir: &Path) -> Result<RunReport, RebalanceError> {
    // Stage 1: validate
    validate_config(adapter)?;
    let bt_config = build_backtest_config(adapter)?;
    let solver = build_solver(adapter)?;

    // Stage 2: load data
    let prices_path = adapter
        .get_string("data", "prices")
        .map(|p| resolve_path(base_dir, &p))
        .ok_or_else(|| RebalanceError::missing("data", "prices"))?;
    let macro_path = adapter
        .get_string("data", "macro_series")
        .map(|p| resolve_path(base_dir, &p));
    let data = CsvDataAdapter::new(prices_path.clone(), macro_path);

    let mut columns = bt_config.tickers.clone();
    if !columns.contains(&bt_config.benchmark) {
        columns.push(bt_config.benchmark.clone());
    }
    info!("Loading prices for {} from {}", columns.join(", "), prices_path.display());
    let prices = data.load_prices(&columns)?;
    debug!("{} price rows", prices.len());

    // Stage 3: calendar and signal gate
    let calendar: Box<dyn CalendarPort> = match calendar_source(adapter)? {
        CalendarSource::Nyse => Box::new(NyseCalendar::new()),
        CalendarSource::Prices => Box::new(PriceIndexCalendar::from_prices(&prices)),
    };
    let gate = if adapter.get_bool("signal", "enabled", false) {
        let ma_window = positive_usize(adapter, "signal", "ma_window", DEFAULT_MA_WINDOW)?;
        let series = data.load_macro_series()?;
        info!("Regime gate: {} macro observations, {}-month average", series.len(), ma_window);
        Some(DailyGate::new(unemployment_trend_signal(&series, ma_window)?))
    } else {
        None
    };

    // Stage 4: simulate
    info!(
        "Running backtest: {} tickers, {} to {}, {} periods, {} estimation",
        bt_config.tickers.len(),
        bt_config.start_date,
        bt_config.end_date,
        bt_config.period,
        bt_config.estimation_window
    );
    let discretizer = GreedyAllocator::new();
    let ports = Collaborators {
        calendar: calendar.as_ref(),
        solver: &solver,
        discretizer: &discretizer,
        gate: gate.as_ref().map(|g| g as &dyn SignalGate),
    };
    let result = backtest_engine::run_backtest(&prices, &bt_config, &ports)?;

    // Stage 5: diagnostics
    let portfolio = result.portfolio_diagnostics(&bt_config.diagnostics);
    let benchmark = result.benchmark_diagnostics(&bt_config.diagnostics);
    Ok(RunReport {
        config: bt_config,
        result,
        portfolio,
        benchmark,
    })
}

pub fn format_report(report: &RunReport) -> String {
    let mut out = String::new();
    let p = &report.portfolio;
    let b = &report.benchmark;
    let bench = format!("Benchmark ({})", report.config.benchmark);

    let _ = writeln!(out, "=== Diagnostics ===");
    let _ = writeln!(out, "{:<22}{:>14}{:>18}", "", "Portfolio", bench);
    let rows: [(&str, f64, f64, bool); 6] = [
        ("Total Return:", p.total_return, b.total_return, true),
        ("Avg Annual Return:", p.average_annual_return, b.average_annual_return, true),
        ("Max Drawdown:", p.max_drawdown, b.max_drawdown, true),
        ("Sharpe Ratio:", p.sharpe_ratio, b.sharpe_ratio, false),
        ("Skew:", p.skew, b.skew, false),
        ("Kurtosis:", p.kurtosis, b.kurtosis, false),
    ];
    for (label, pv, bv, pct) in rows {
        if pct {
            let _ = writeln!(out, "{:<22}{:>13.2}%{:>17.2}%", label, pv * 100.0, bv * 100.0);
        } else {
            let _ = writeln!(out, "{:<22}{:>14.4}{:>18.4}", label, pv, bv);
        }
    }
    if let (Some(pf), Some(bf)) = (report.result.portfolio.last(), report.result.benchmark.last()) {
        let _ = writeln!(out, "{:<22}{:>14.2}{:>18.2}", "Final Value:", pf.value, bf.value);
    }

    let _ = writeln!(out, "\n=== Periods ===");
    for alloc in &report.result.periods {
        let held = alloc
            .weights
            .entries()
            .iter()
            .filter(|(_, w)| *w > 0.0)
            .map(|(id, w)| format!("{} {:.2}%", id, w * 100.0))
            .collect::<Vec<_>>()
            .join(", ");
        let _ = writeln!(out, "{}  {}", alloc.period, held);
    }

    if let Some(latest) = report.result.latest() {
        let _ = writeln!(out, "\n=== Latest Allocation ({}) ===", latest.period);
        for (id, w) in latest.weights.entries() {
            let _ = writeln!(
                out,
                "{:<8}{:>10.5}{:>8} shares",
                id,
                w,
                latest.shares.get(id)
            );
        }
        let _ = writeln!(out, "Leftover cash: {:.2}", latest.shares.leftover);
    }
    out
}

fn run_backtest(config_path: &Path) -> ExitCode {
    info!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let base_dir = config_path.parent().unwrap_or_else(|| Path::new("."));

    match run_pipeline(&adapter, base_dir) {
        Ok(report) => {
            print!("{}", format_report(&report));
            ExitCode::SUCCESS
        }
        Err(e) => fail(&e),
    }
}

fn run_validate(config_path: &Path) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let checked = validate_config(&adapter)
        .and_then(|_| build_backtest_config(&adapter))
        .and_then(|cfg| build_solver(&adapter).map(|_| cfg));
    match checked {
        Ok(cfg) => {
            println!("Config valid: {}", config_path.display());
            println!("  horizon:    {} to {}", cfg.start_date, cfg.end_date);
            println!("  tickers:    {}", cfg.tickers.join(", "));
            println!("  benchmark:  {}", cfg.benchmark);
            println!("  period:     {}", cfg.period);
            println!("  estimation: {}", cfg.estimation_window);
            println!("  on error:   {}", cfg.on_solver_error);
            ExitCode::SUCCESS
        }
        Err(e) => fail(&e),
    }
}

fn sessions(
    start: NaiveDate,
    end: NaiveDate,
    config_path: Option<&PathBuf>,
) -> Result<Vec<NaiveDate>, RebalanceError> {
    if start > end {
        return Err(RebalanceError::invalid(
            "sessions",
            "start",
            format!("start {} is after end {}", start, end),
        ));
    }
    let Some(path) = config_path else {
        return NyseCalendar::new().schedule(start, end);
    };
    let adapter = FileConfigAdapter::from_file(path)?;
    match calendar_source(&adapter)? {
        CalendarSource::Nyse => NyseCalendar::new().schedule(start, end),
        CalendarSource::Prices => {
            let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
            let prices_path = adapter
                .get_string("data", "prices")
                .map(|p| resolve_path(base_dir, &p))
                .ok_or_else(|| RebalanceError::missing("data", "prices"))?;
            let tickers = adapter
                .get_list("backtest", "tickers")
                .filter(|t| !t.is_empty())
                .ok_or_else(|| RebalanceError::missing("backtest", "tickers"))?;
            let prices = CsvDataAdapter::new(prices_path, None).load_prices(&tickers)?;
            PriceIndexCalendar::from_prices(&prices).schedule(start, end)
        }
    }
}

fn run_sessions(start: NaiveDate, end: NaiveDate, config_path: Option<&PathBuf>) -> ExitCode {
    match sessions(start, end, config_path) {
        Ok(days) => {
            for day in &days {
                println!("{}", day);
            }
            info!("{} sessions", days.len());
            ExitCode::SUCCESS
        }
        Err(e) => fail(&e),
    }
}
