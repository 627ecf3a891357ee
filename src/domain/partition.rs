//! Period partitioner.
//!
//! Splits the backtest horizon into contiguous, non-overlapping rebalancing
//! periods of a fixed nominal length. Nominal boundaries are stepped from the
//! horizon start in whole months; each period covers the sessions in
//! `[boundary_k, boundary_{k+1})`. One extra boundary before the horizon seeds
//! the lookback of the first period and is never emitted as a holding period.
//! A trailing partial period is dropped.

use crate::domain::calendar::{CalendarAligner, Roll};
use crate::domain::error::RebalanceError;
use chrono::{Duration, Months, NaiveDate};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodLength {
    SixMonths,
    OneYear,
}

impl PeriodLength {
    pub fn months(self) -> u32 {
        match self {
            PeriodLength::SixMonths => 6,
            PeriodLength::OneYear => 12,
        }
    }

    /// Approximate session count of one period, used as the default
    /// covariance lookback.
    pub fn nominal_sessions(self) -> usize {
        match self {
            PeriodLength::SixMonths => 126,
            PeriodLength::OneYear => 252,
        }
    }
}

impl FromStr for PeriodLength {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "six_months" | "6m" | "semiannual" => Ok(PeriodLength::SixMonths),
            "one_year" | "1y" | "annual" => Ok(PeriodLength::OneYear),
            other => Err(format!(
                "unknown period '{}', expected six_months or one_year",
                other
            )),
        }
    }
}

impl fmt::Display for PeriodLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeriodLength::SixMonths => write!(f, "six_months"),
            PeriodLength::OneYear => write!(f, "one_year"),
        }
    }
}

/// First and last trading session of a period, both inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RebalancePeriod {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl fmt::Display for RebalancePeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}

/// A holding period and the period immediately before it. `lookback` is
/// `None` only for the first plan when the calendar has no sessions in the
/// seed period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodPlan {
    pub lookback: Option<RebalancePeriod>,
    pub holding: RebalancePeriod,
}

fn nominal_boundary(
    horizon_start: NaiveDate,
    length: PeriodLength,
    k: u32,
) -> Result<NaiveDate, RebalanceError> {
    horizon_start
        .checked_add_months(Months::new(length.months() * k))
        .ok_or_else(|| RebalanceError::invalid("backtest", "end_date", "date out of range"))
}

fn resolve_period(
    aligner: &CalendarAligner<'_>,
    nominal_start: NaiveDate,
    nominal_end: NaiveDate,
) -> Result<RebalancePeriod, RebalanceError> {
    let empty = || RebalanceError::EmptyRange {
        start: nominal_start,
        end: nominal_end,
    };
    // only a failed session search means the period is empty
    let widen = |e: RebalanceError| match e {
        RebalanceError::EmptyRange { .. } => empty(),
        other => other,
    };
    let start = aligner
        .resolve_session(nominal_start, Roll::Forward)
        .map_err(widen)?;
    let end = aligner
        .resolve_session(nominal_end, Roll::Backward)
        .map_err(widen)?;
    if start > end {
        return Err(empty());
    }
    Ok(RebalancePeriod { start, end })
}

pub fn partition(
    aligner: &CalendarAligner<'_>,
    horizon_start: NaiveDate,
    horizon_end: NaiveDate,
    length: PeriodLength,
) -> Result<Vec<PeriodPlan>, RebalanceError> {
    if horizon_start >= horizon_end {
        return Err(RebalanceError::invalid(
            "backtest",
            "start_date",
            "start_date must be before end_date",
        ));
    }

    let seed_start = horizon_start
        .checked_sub_months(Months::new(length.months()))
        .ok_or_else(|| RebalanceError::invalid("backtest", "start_date", "date out of range"))?;
    let seed_end = horizon_start - Duration::days(1);
    let mut lookback = match resolve_period(aligner, seed_start, seed_end) {
        Ok(seed) => Some(seed),
        Err(RebalanceError::EmptyRange { .. }) => None,
        Err(e) => return Err(e),
    };

    let mut plans = Vec::new();
    let mut k = 0u32;
    loop {
        let nominal_start = nominal_boundary(horizon_start, length, k)?;
        let nominal_end = nominal_boundary(horizon_start, length, k + 1)? - Duration::days(1);
        if nominal_end > horizon_end {
            break;
        }
        let holding = resolve_period(aligner, nominal_start, nominal_end)?;
        plans.push(PeriodPlan { lookback, holding });
        lookback = Some(holding);
        k += 1;
    }

    if plans.is_empty() {
        return Err(RebalanceError::invalid(
            "backtest",
            "end_date",
            format!(
                "horizon {} to {} is shorter than one {} period",
                horizon_start, horizon_end, length
            ),
        ));
    }
    Ok(plans)
}
