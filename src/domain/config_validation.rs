//! Configuration validation.
//!
//! Validates every config section before any data is loaded.

use crate::domain::allocator::SolverFallback;
use crate::domain::backtest::EstimationWindow;
use crate::domain::error::RebalanceError;
use crate::domain::partition::PeriodLength;
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;
use std::collections::HashSet;
use std::str::FromStr;

pub fn validate_config(config: &dyn ConfigPort) -> Result<(), RebalanceError> {
    validate_data(config)?;
    validate_backtest(config)?;
    validate_estimator(config)?;
    validate_optimizer(config)?;
    validate_diagnostics(config)?;
    validate_calendar(config)?;
    validate_signal(config)?;
    Ok(())
}

/// Fails when a key is present but not a number; missing keys pass.
fn check_numeric<T: FromStr>(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<(), RebalanceError> {
    match config.get_string(section, key) {
        Some(raw) if raw.parse::<T>().is_err() => Err(RebalanceError::invalid(
            section,
            key,
            format!("'{}' is not a valid number", raw),
        )),
        _ => Ok(()),
    }
}

fn check_choice<T: FromStr<Err = String>>(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<(), RebalanceError> {
    match config.get_string(section, key) {
        Some(raw) => raw
            .parse::<T>()
            .map(|_| ())
            .map_err(|reason| RebalanceError::invalid(section, key, reason)),
        None => Ok(()),
    }
}

pub fn parse_date(value: Option<&str>, section: &str, field: &str) -> Result<NaiveDate, RebalanceError> {
    match value {
        None => Err(RebalanceError::missing(section, field)),
        Some(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|_| {
            RebalanceError::invalid(
                section,
                field,
                format!("invalid {} format, expected YYYY-MM-DD", field),
            )
        }),
    }
}

fn validate_data(config: &dyn ConfigPort) -> Result<(), RebalanceError> {
    if config.get_string("data", "prices").is_none() {
        return Err(RebalanceError::missing("data", "prices"));
    }
    Ok(())
}

fn validate_backtest(config: &dyn ConfigPort) -> Result<(), RebalanceError> {
    let start = parse_date(config.get_string("backtest", "start_date").as_deref(), "backtest", "start_date")?;
    let end = parse_date(config.get_string("backtest", "end_date").as_deref(), "backtest", "end_date")?;
    if start >= end {
        return Err(RebalanceError::invalid(
            "backtest",
            "start_date",
            "start_date must be before end_date",
        ));
    }

    check_numeric::<f64>(config, "backtest", "initial_capital")?;
    let capital = config.get_double("backtest", "initial_capital", 5000.0);
    if !(capital.is_finite() && capital > 0.0) {
        return Err(RebalanceError::invalid(
            "backtest",
            "initial_capital",
            "initial_capital must be positive",
        ));
    }

    let tickers = config
        .get_list("backtest", "tickers")
        .filter(|t| !t.is_empty())
        .ok_or_else(|| RebalanceError::missing("backtest", "tickers"))?;
    let mut seen = HashSet::new();
    if let Some(dup) = tickers.iter().find(|t| !seen.insert(t.as_str())) {
        return Err(RebalanceError::invalid(
            "backtest",
            "tickers",
            format!("duplicate ticker {}", dup),
        ));
    }

    check_choice::<PeriodLength>(config, "backtest", "period")?;
    check_choice::<EstimationWindow>(config, "backtest", "estimation_window")?;
    check_choice::<SolverFallback>(config, "backtest", "on_solver_error")?;
    Ok(())
}

fn validate_estimator(config: &dyn ConfigPort) -> Result<(), RebalanceError> {
    for key in ["ema_span", "cov_lookback"] {
        check_numeric::<i64>(config, "estimator", key)?;
        if config.get_int("estimator", key, 1) < 1 {
            return Err(RebalanceError::invalid(
                "estimator",
                key,
                format!("{} must be at least 1", key),
            ));
        }
    }
    check_numeric::<f64>(config, "estimator", "frequency")?;
    if config.get_double("estimator", "frequency", 252.0) <= 0.0 {
        return Err(RebalanceError::invalid(
            "estimator",
            "frequency",
            "frequency must be positive",
        ));
    }
    Ok(())
}

fn validate_optimizer(config: &dyn ConfigPort) -> Result<(), RebalanceError> {
    check_numeric::<f64>(config, "optimizer", "risk_free_rate")?;
    let rf = config.get_double("optimizer", "risk_free_rate", 0.02);
    if !(-1.0..1.0).contains(&rf) {
        return Err(RebalanceError::invalid(
            "optimizer",
            "risk_free_rate",
            "risk_free_rate must be between -1 and 1",
        ));
    }
    check_numeric::<f64>(config, "optimizer", "weight_cutoff")?;
    let cutoff = config.get_double("optimizer", "weight_cutoff", 1e-4);
    if !(0.0..1.0).contains(&cutoff) {
        return Err(RebalanceError::invalid(
            "optimizer",
            "weight_cutoff",
            "weight_cutoff must be in [0, 1)",
        ));
    }
    check_numeric::<i64>(config, "optimizer", "max_iterations")?;
    if config.get_int("optimizer", "max_iterations", 10_000) < 1 {
        return Err(RebalanceError::invalid(
            "optimizer",
            "max_iterations",
            "max_iterations must be at least 1",
        ));
    }
    Ok(())
}

fn validate_diagnostics(config: &dyn ConfigPort) -> Result<(), RebalanceError> {
    check_numeric::<f64>(config, "diagnostics", "trading_days_per_year")?;
    if config.get_double("diagnostics", "trading_days_per_year", 250.0) <= 0.0 {
        return Err(RebalanceError::invalid(
            "diagnostics",
            "trading_days_per_year",
            "trading_days_per_year must be positive",
        ));
    }
    check_numeric::<i64>(config, "diagnostics", "drawdown_window")?;
    if config.get_int("diagnostics", "drawdown_window", 252) < 1 {
        return Err(RebalanceError::invalid(
            "diagnostics",
            "drawdown_window",
            "drawdown_window must be at least 1",
        ));
    }
    Ok(())
}

/// Which calendar resolves period boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalendarSource {
    Nyse,
    Prices,
}

pub fn calendar_source(config: &dyn ConfigPort) -> Result<CalendarSource, RebalanceError> {
    match config.get_string("calendar", "source").as_deref().map(str::trim) {
        None | Some("nyse") => Ok(CalendarSource::Nyse),
        Some("prices") => Ok(CalendarSource::Prices),
        Some(other) => Err(RebalanceError::invalid(
            "calendar",
            "source",
            format!("unknown calendar '{}', expected nyse or prices", other),
        )),
    }
}

fn validate_calendar(config: &dyn ConfigPort) -> Result<(), RebalanceError> {
    calendar_source(config).map(|_| ())
}

fn validate_signal(config: &dyn ConfigPort) -> Result<(), RebalanceError> {
    check_numeric::<i64>(config, "signal", "ma_window")?;
    if config.get_int("signal", "ma_window", 12) < 1 {
        return Err(RebalanceError::invalid(
            "signal",
            "ma_window",
            "ma_window must be at least 1",
        ));
    }
    if config.get_bool("signal", "enabled", false) && config.get_string("data", "macro_series").is_none() {
        return Err(RebalanceError::missing("data", "macro_series"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    const VALID: &str = "\
[data]
prices = prices.csv

[backtest]
start_date = 2005-01-01
end_date = 2020-12-31
tickers = SPY, TLT, GLD
";

    fn make_config(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    fn with(extra: &str) -> FileConfigAdapter {
        make_config(&format!("{}{}", VALID, extra))
    }

    fn invalid_key(result: Result<(), RebalanceError>) -> String {
        match result {
            Err(RebalanceError::ConfigInvalid { key, .. }) => key,
            other => panic!("expected ConfigInvalid, got {:?}", other),
        }
    }

    #[test]
    fn minimal_config_passes() {
        assert!(validate_config(&make_config(VALID)).is_ok());
    }

    #[test]
    fn full_config_passes() {
        let cfg = with(
            "initial_capital = 5000\nperiod = one_year\nestimation_window = trailing\n\
             on_solver_error = equal_weight\n\n[estimator]\nema_span = 500\ncov_lookback = 252\n\n\
             [optimizer]\nrisk_free_rate = 0.02\n\n[calendar]\nsource = prices\n",
        );
        assert!(validate_config(&cfg).is_ok());
    }

    #[test]
    fn missing_prices_path_fails() {
        let cfg = make_config("[backtest]\nstart_date = 2005-01-01\nend_date = 2006-01-01\ntickers = SPY\n");
        assert!(matches!(
            validate_config(&cfg),
            Err(RebalanceError::ConfigMissing { key, .. }) if key == "prices"
        ));
    }

    #[test]
    fn start_after_end_fails() {
        let cfg = make_config(
            "[data]\nprices = p.csv\n[backtest]\nstart_date = 2021-01-01\nend_date = 2020-01-01\ntickers = SPY\n",
        );
        assert_eq!(invalid_key(validate_config(&cfg)), "start_date");
    }

    #[test]
    fn bad_date_format_fails() {
        let cfg = make_config(
            "[data]\nprices = p.csv\n[backtest]\nstart_date = 01/01/2005\nend_date = 2020-01-01\ntickers = SPY\n",
        );
        assert_eq!(invalid_key(validate_config(&cfg)), "start_date");
    }

    #[test]
    fn non_positive_capital_fails() {
        assert_eq!(invalid_key(validate_config(&with("initial_capital = 0\n"))), "initial_capital");
        assert_eq!(invalid_key(validate_config(&with("initial_capital = lots\n"))), "initial_capital");
    }

    #[test]
    fn duplicate_ticker_fails() {
        let cfg = make_config(
            "[data]\nprices = p.csv\n[backtest]\nstart_date = 2005-01-01\nend_date = 2020-01-01\ntickers = SPY, TLT, SPY\n",
        );
        assert_eq!(invalid_key(validate_config(&cfg)), "tickers");
    }

    #[test]
    fn missing_tickers_fails() {
        let cfg = make_config(
            "[data]\nprices = p.csv\n[backtest]\nstart_date = 2005-01-01\nend_date = 2020-01-01\n",
        );
        assert!(matches!(
            validate_config(&cfg),
            Err(RebalanceError::ConfigMissing { key, .. }) if key == "tickers"
        ));
    }

    #[test]
    fn unknown_choices_fail() {
        assert_eq!(invalid_key(validate_config(&with("period = quarterly\n"))), "period");
        assert_eq!(
            invalid_key(validate_config(&with("estimation_window = oracle\n"))),
            "estimation_window"
        );
        assert_eq!(
            invalid_key(validate_config(&with("on_solver_error = retry\n"))),
            "on_solver_error"
        );
        assert_eq!(invalid_key(validate_config(&with("\n[calendar]\nsource = lse\n"))), "source");
    }

    #[test]
    fn calendar_source_parsing() {
        assert_eq!(calendar_source(&make_config("")).unwrap(), CalendarSource::Nyse);
        assert_eq!(
            calendar_source(&make_config("[calendar]\nsource =  prices \n")).unwrap(),
            CalendarSource::Prices
        );
        assert!(calendar_source(&make_config("[calendar]\nsource = tse\n")).is_err());
    }

    #[test]
    fn validation_accepts_exactly_the_selectable_calendars() {
        for source in ["nyse", "prices", "tse", "NYSE"] {
            let cfg = with(&format!("\n[calendar]\nsource = {}\n", source));
            assert_eq!(validate_config(&cfg).is_ok(), calendar_source(&cfg).is_ok(), "{}", source);
        }
    }

    #[test]
    fn estimator_and_optimizer_ranges() {
        assert_eq!(invalid_key(validate_config(&with("\n[estimator]\nema_span = 0\n"))), "ema_span");
        assert_eq!(
            invalid_key(validate_config(&with("\n[optimizer]\nrisk_free_rate = 1.5\n"))),
            "risk_free_rate"
        );
        assert_eq!(
            invalid_key(validate_config(&with("\n[optimizer]\nmax_iterations = 0\n"))),
            "max_iterations"
        );
        assert_eq!(
            invalid_key(validate_config(&with("\n[diagnostics]\ntrading_days_per_year = -250\n"))),
            "trading_days_per_year"
        );
    }

    #[test]
    fn enabled_signal_needs_macro_series() {
        let cfg = with("\n[signal]\nenabled = true\n");
        assert!(matches!(
            validate_config(&cfg),
            Err(RebalanceError::ConfigMissing { key, .. }) if key == "macro_series"
        ));
        let text = format!(
            "{}\n[signal]\nenabled = true\nma_window = 12\n",
            VALID.replace("prices = prices.csv", "prices = prices.csv\nmacro_series = UNRATE.csv")
        );
        assert!(validate_config(&make_config(&text)).is_ok());
    }
}
