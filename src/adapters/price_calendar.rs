//! Calendar whose sessions are the dates of a loaded price table.

use crate::domain::error::RebalanceError;
use crate::domain::prices::PriceTable;
use crate::ports::calendar_port::CalendarPort;
use chrono::NaiveDate;

#[derive(Debug, Clone)]
pub struct PriceIndexCalendar {
    dates: Vec<NaiveDate>,
}

impl PriceIndexCalendar {
    pub fn new(mut dates: Vec<NaiveDate>) -> Self {
        dates.sort();
        dates.dedup();
        Self { dates }
    }

    pub fn from_prices(prices: &PriceTable) -> Self {
        Self::new(prices.dates().to_vec())
    }
}

impl CalendarPort for PriceIndexCalendar {
    fn schedule(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<NaiveDate>, RebalanceError> {
        let lo = self.dates.partition_point(|d| *d < start);
        let hi = self.dates.partition_point(|d| *d <= end).max(lo);
        Ok(self.dates[lo..hi].to_vec())
    }
}
