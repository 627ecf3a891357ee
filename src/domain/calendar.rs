//! Calendar aligner: resolves nominal dates to actual trading sessions.

use crate::domain::error::RebalanceError;
use crate::ports::calendar_port::CalendarPort;
use chrono::{Duration, NaiveDate};

/// How far to search for a session around a nominal date. Covers any
/// holiday cluster on a real exchange calendar.
const RESOLVE_SEARCH_DAYS: i64 = 14;

/// Direction in which a non-session date is rolled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Roll {
    /// First session on or after the nominal date (period starts).
    Forward,
    /// Last session on or before the nominal date (period ends).
    Backward,
}

pub struct CalendarAligner<'a> {
    calendar: &'a dyn CalendarPort,
}

impl<'a> CalendarAligner<'a> {
    pub fn new(calendar: &'a dyn CalendarPort) -> Self {
        Self { calendar }
    }

    pub fn resolve_session(&self, nominal: NaiveDate, roll: Roll) -> Result<NaiveDate, RebalanceError> {
        let window = Duration::days(RESOLVE_SEARCH_DAYS);
        let resolved = match roll {
            Roll::Forward => self
                .calendar
                .schedule(nominal, nominal + window)?
                .first()
                .copied(),
            Roll::Backward => self
                .calendar
                .schedule(nominal - window, nominal)?
                .last()
                .copied(),
        };
        resolved.ok_or(match roll {
            Roll::Forward => RebalanceError::EmptyRange {
                start: nominal,
                end: nominal + window,
            },
            Roll::Backward => RebalanceError::EmptyRange {
                start: nominal - window,
                end: nominal,
            },
        })
    }

    /// Sessions within `[start, end]` inclusive. Fails on an inverted or empty range.
    pub fn sessions_between(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<NaiveDate>, RebalanceError> {
        if start > end {
            return Err(RebalanceError::invalid(
                "backtest",
                "start_date",
                format!("period start {} is after period end {}", start, end),
            ));
        }
        let sessions = self.calendar.schedule(start, end)?;
        if sessions.is_empty() {
            return Err(RebalanceError::EmptyRange { start, end });
        }
        Ok(sessions)
    }
}
