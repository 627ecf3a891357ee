//! Macro regime gate (unemployment trend).
//!
//! A month is risk-off when the unemployment rate is at or above its trailing
//! moving average, the current month included. The monthly decision takes
//! effect on the first session of the month and holds until the next one.

use crate::domain::error::RebalanceError;
use crate::ports::signal_port::SignalGate;
use chrono::{Datelike, NaiveDate};
use log::debug;
use std::collections::BTreeMap;

pub const DEFAULT_MA_WINDOW: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MacroObservation {
    pub date: NaiveDate,
    pub value: f64,
}

/// Active flag per observation month, `(year, month)` keyed.
#[derive(Debug, Clone, PartialEq)]
pub struct MonthlySignal {
    months: BTreeMap<(i32, u32), bool>,
}

impl MonthlySignal {
    pub fn get(&self, year: i32, month: u32) -> Option<bool> {
        self.months.get(&(year, month)).copied()
    }

    pub fn len(&self) -> usize {
        self.months.len()
    }

    pub fn is_empty(&self) -> bool {
        self.months.is_empty()
    }

    pub fn inactive_months(&self) -> usize {
        self.months.values().filter(|a| !**a).count()
    }
}

/// Monthly signal: inactive when `value >= mean(last ma_window values)`,
/// active while fewer than `ma_window` observations exist.
pub fn unemployment_trend_signal(
    observations: &[MacroObservation],
    ma_window: usize,
) -> Result<MonthlySignal, RebalanceError> {
    if ma_window == 0 {
        return Err(RebalanceError::invalid(
            "signal",
            "ma_window",
            "moving average window must be at least 1",
        ));
    }
    for pair in observations.windows(2) {
        if pair[1].date <= pair[0].date {
            return Err(RebalanceError::data(format!(
                "macro series dates not strictly increasing at {}",
                pair[1].date
            )));
        }
        if (pair[0].date.year(), pair[0].date.month()) == (pair[1].date.year(), pair[1].date.month()) {
            return Err(RebalanceError::data(format!(
                "macro series has more than one observation in {}",
                pair[1].date.format("%Y-%m")
            )));
        }
    }

    let mut months = BTreeMap::new();
    for (i, obs) in observations.iter().enumerate() {
        let active = if i + 1 >= ma_window {
            let window = &observations[i + 1 - ma_window..=i];
            let ma = window.iter().map(|o| o.value).sum::<f64>() / ma_window as f64;
            obs.value < ma
        } else {
            true
        };
        months.insert((obs.date.year(), obs.date.month()), active);
    }
    Ok(MonthlySignal { months })
}

/// Daily view of a [`MonthlySignal`]: each session takes the signal of the
/// latest observed month not after it. Sessions before the first observation
/// are active.
pub struct DailyGate {
    signal: MonthlySignal,
}

impl DailyGate {
    pub fn new(signal: MonthlySignal) -> Self {
        debug!(
            "regime gate over {} months, {} risk-off",
            signal.len(),
            signal.inactive_months()
        );
        Self { signal }
    }
}

impl SignalGate for DailyGate {
    fn is_active(&self, date: NaiveDate) -> bool {
        self.signal
            .months
            .range(..=(date.year(), date.month()))
            .next_back()
            .map(|(_, active)| *active)
            .unwrap_or(true)
    }
}
