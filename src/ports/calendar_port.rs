//! Trading calendar port trait.

use crate::domain::error::RebalanceError;
use chrono::NaiveDate;

pub trait CalendarPort {
    /// Ordered trading sessions within `[start, end]` inclusive.
    fn schedule(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<NaiveDate>, RebalanceError>;
}
