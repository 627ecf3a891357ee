//! Price table and daily log-return series.
//!
//! Both tables are row-major: one row per trading day, one column per
//! instrument, columns in universe order.

use crate::domain::error::RebalanceError;
use chrono::NaiveDate;

#[derive(Debug, Clone, PartialEq)]
pub struct PriceTable {
    instruments: Vec<String>,
    dates: Vec<NaiveDate>,
    rows: Vec<Vec<f64>>,
}

impl PriceTable {
    /// Builds a table, checking strictly increasing dates, row width and `price > 0`.
    pub fn new(
        instruments: Vec<String>,
        dates: Vec<NaiveDate>,
        rows: Vec<Vec<f64>>,
    ) -> Result<Self, RebalanceError> {
        if instruments.is_empty() {
            return Err(RebalanceError::data("price table has no instruments"));
        }
        if dates.len() != rows.len() {
            return Err(RebalanceError::data(format!(
                "price table has {} dates but {} rows",
                dates.len(),
                rows.len()
            )));
        }
        for pair in dates.windows(2) {
            if pair[1] <= pair[0] {
                return Err(RebalanceError::data(format!(
                    "price dates not strictly increasing at {}",
                    pair[1]
                )));
            }
        }
        for (date, row) in dates.iter().zip(&rows) {
            if row.len() != instruments.len() {
                return Err(RebalanceError::data(format!(
                    "row {} has {} prices, expected {}",
                    date,
                    row.len(),
                    instruments.len()
                )));
            }
            if let Some(pos) = row.iter().position(|p| !p.is_finite() || *p <= 0.0) {
                return Err(RebalanceError::data(format!(
                    "non-positive price for {} on {}",
                    instruments[pos], date
                )));
            }
        }
        Ok(Self {
            instruments,
            dates,
            rows,
        })
    }

    pub fn instruments(&self) -> &[String] {
        &self.instruments
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn column_index(&self, instrument: &str) -> Option<usize> {
        self.instruments.iter().position(|i| i == instrument)
    }

    /// Rows dated within `[start, end]` inclusive.
    pub fn slice(&self, start: NaiveDate, end: NaiveDate) -> PriceTable {
        let lo = self.dates.partition_point(|d| *d < start);
        let hi = self.dates.partition_point(|d| *d <= end);
        let hi = hi.max(lo);
        PriceTable {
            instruments: self.instruments.clone(),
            dates: self.dates[lo..hi].to_vec(),
            rows: self.rows[lo..hi].to_vec(),
        }
    }

    /// Narrows the table to the given instruments, in the given order.
    pub fn select(&self, instruments: &[String]) -> Result<PriceTable, RebalanceError> {
        let indices = instruments
            .iter()
            .map(|id| {
                self.column_index(id)
                    .ok_or_else(|| RebalanceError::data(format!("no price column for {}", id)))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let rows = self
            .rows
            .iter()
            .map(|row| indices.iter().map(|&i| row[i]).collect())
            .collect();
        Ok(PriceTable {
            instruments: instruments.to_vec(),
            dates: self.dates.clone(),
            rows,
        })
    }

    /// Last observed price per instrument.
    pub fn latest_prices(&self) -> Option<Vec<(String, f64)>> {
        let last = self.rows.last()?;
        Some(
            self.instruments
                .iter()
                .cloned()
                .zip(last.iter().copied())
                .collect(),
        )
    }

    /// Daily simple returns `P_t / P_{t-1} - 1`, one row fewer than the table.
    pub fn simple_returns(&self) -> Vec<Vec<f64>> {
        self.rows
            .windows(2)
            .map(|w| w[1].iter().zip(&w[0]).map(|(c, p)| c / p - 1.0).collect())
            .collect()
    }

    /// Daily log returns `ln(P_t / P_{t-1})` aligned to the second date onward.
    pub fn log_returns(&self) -> Result<ReturnTable, RebalanceError> {
        if self.dates.len() < 2 {
            return Err(RebalanceError::InsufficientData {
                context: "daily returns".into(),
                observations: self.dates.len(),
                minimum: 2,
            });
        }
        let rows = self
            .rows
            .windows(2)
            .map(|w| w[1].iter().zip(&w[0]).map(|(c, p)| (c / p).ln()).collect())
            .collect();
        Ok(ReturnTable {
            instruments: self.instruments.clone(),
            base_date: self.dates[0],
            dates: self.dates[1..].to_vec(),
            rows,
        })
    }
}

/// Daily log returns. `base_date` is the trading day preceding `dates[0]`,
/// i.e. the day on which a value series holds its initial capital.
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnTable {
    pub instruments: Vec<String>,
    pub base_date: NaiveDate,
    pub dates: Vec<NaiveDate>,
    pub rows: Vec<Vec<f64>>,
}

impl ReturnTable {
    /// Returns dated within `[start, end]`. The base date becomes the
    /// preceding return date (or stays as is when `start` precedes the table).
    pub fn slice(&self, start: NaiveDate, end: NaiveDate) -> Result<ReturnTable, RebalanceError> {
        let lo = self.dates.partition_point(|d| *d < start);
        let hi = self.dates.partition_point(|d| *d <= end).max(lo);
        if lo == hi {
            return Err(RebalanceError::DataAlignment {
                reason: format!("no daily returns between {} and {}", start, end),
            });
        }
        let base_date = if lo == 0 {
            self.base_date
        } else {
            self.dates[lo - 1]
        };
        Ok(ReturnTable {
            instruments: self.instruments.clone(),
            base_date,
            dates: self.dates[lo..hi].to_vec(),
            rows: self.rows[lo..hi].to_vec(),
        })
    }

    /// Single-instrument series `(date, return)`.
    pub fn column(&self, instrument: &str) -> Result<Vec<(NaiveDate, f64)>, RebalanceError> {
        let idx = self
            .instruments
            .iter()
            .position(|i| i == instrument)
            .ok_or_else(|| RebalanceError::data(format!("no return column for {}", instrument)))?;
        Ok(self
            .dates
            .iter()
            .zip(&self.rows)
            .map(|(d, row)| (*d, row[idx]))
            .collect())
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn sample_table() -> PriceTable {
        PriceTable::new(
            vec!["SPY".into(), "TLT".into()],
            vec![d("2024-01-02"), d("2024-01-03"), d("2024-01-04")],
            vec![vec![100.0, 50.0], vec![110.0, 50.0], vec![99.0, 55.0]],
        )
        .unwrap()
    }

    #[test]
    fn rejects_non_positive_price() {
        let err = PriceTable::new(
            vec!["SPY".into()],
            vec![d("2024-01-02")],
            vec![vec![0.0]],
        )
        .unwrap_err();
        assert!(matches!(err, RebalanceError::Data { reason } if reason.contains("SPY")));
    }

    #[test]
    fn rejects_unordered_dates() {
        let err = PriceTable::new(
            vec!["SPY".into()],
            vec![d("2024-01-03"), d("2024-01-02")],
            vec![vec![1.0], vec![1.0]],
        )
        .unwrap_err();
        assert!(matches!(err, RebalanceError::Data { .. }));
    }

    #[test]
    fn rejects_ragged_rows() {
        let err = PriceTable::new(
            vec!["SPY".into(), "TLT".into()],
            vec![d("2024-01-02")],
            vec![vec![1.0]],
        )
        .unwrap_err();
        assert!(matches!(err, RebalanceError::Data { .. }));
    }

    #[test]
    fn log_returns_one_fewer_row() {
        let table = sample_table();
        let returns = table.log_returns().unwrap();
        assert_eq!(returns.len(), 2);
        assert_eq!(returns.base_date, d("2024-01-02"));
        assert_eq!(returns.dates, vec![d("2024-01-03"), d("2024-01-04")]);
        assert_abs_diff_eq!(returns.rows[0][0], (1.1f64).ln(), epsilon = 1e-12);
        assert_abs_diff_eq!(returns.rows[0][1], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(returns.rows[1][0], (0.9f64).ln(), epsilon = 1e-12);
    }

    #[test]
    fn log_returns_need_two_prices() {
        let table = PriceTable::new(vec!["SPY".into()], vec![d("2024-01-02")], vec![vec![1.0]])
            .unwrap();
        assert!(matches!(
            table.log_returns(),
            Err(RebalanceError::InsufficientData { minimum: 2, .. })
        ));
    }

    #[test]
    fn simple_returns_match_price_ratio() {
        let returns = sample_table().simple_returns();
        assert_abs_diff_eq!(returns[0][0], 0.1, epsilon = 1e-12);
        assert_abs_diff_eq!(returns[1][1], 0.1, epsilon = 1e-12);
    }

    #[test]
    fn slice_is_inclusive() {
        let sliced = sample_table().slice(d("2024-01-03"), d("2024-01-04"));
        assert_eq!(sliced.dates(), &[d("2024-01-03"), d("2024-01-04")]);
        assert_eq!(sliced.rows()[0], vec![110.0, 50.0]);
    }

    #[test]
    fn slice_outside_range_is_empty() {
        let sliced = sample_table().slice(d("2025-01-01"), d("2025-02-01"));
        assert!(sliced.is_empty());
    }

    #[test]
    fn select_reorders_columns() {
        let selected = sample_table().select(&["TLT".to_string()]).unwrap();
        assert_eq!(selected.instruments(), &["TLT".to_string()]);
        assert_eq!(selected.rows()[2], vec![55.0]);
        assert!(sample_table().select(&["GLD".to_string()]).is_err());
    }

    #[test]
    fn latest_prices_uses_last_row() {
        let latest = sample_table().latest_prices().unwrap();
        assert_eq!(latest, vec![("SPY".to_string(), 99.0), ("TLT".to_string(), 55.0)]);
    }

    #[test]
    fn return_slice_moves_base_date() {
        let returns = sample_table().log_returns().unwrap();
        let sliced = returns.slice(d("2024-01-04"), d("2024-01-04")).unwrap();
        assert_eq!(sliced.base_date, d("2024-01-03"));
        assert_eq!(sliced.dates, vec![d("2024-01-04")]);

        let whole = returns.slice(d("2023-12-01"), d("2024-12-31")).unwrap();
        assert_eq!(whole.base_date, d("2024-01-02"));
        assert_eq!(whole.len(), 2);
    }

    #[test]
    fn return_slice_empty_is_alignment_error() {
        let returns = sample_table().log_returns().unwrap();
        assert!(matches!(
            returns.slice(d("2025-01-01"), d("2025-01-31")),
            Err(RebalanceError::DataAlignment { .. })
        ));
    }

    #[test]
    fn return_column_by_instrument() {
        let returns = sample_table().log_returns().unwrap();
        let tlt = returns.column("TLT").unwrap();
        assert_eq!(tlt.len(), 2);
        assert_abs_diff_eq!(tlt[1].1, (1.1f64).ln(), epsilon = 1e-12);
        assert!(returns.column("GLD").is_err());
    }
}
