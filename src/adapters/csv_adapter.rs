//! CSV file data adapter.
//!
//! Prices come from one wide file (`date,<TICKER>,<TICKER>...`) of adjusted
//! closes. The macro series is a two-column FRED export (`DATE,<SERIES>`),
//! where `.` marks a missing observation.

use crate::domain::error::RebalanceError;
use crate::domain::prices::PriceTable;
use crate::domain::regime::MacroObservation;
use crate::ports::data_port::DataPort;
use chrono::NaiveDate;
use log::{debug, warn};
use std::fs;
use std::path::{Path, PathBuf};

pub struct CsvDataAdapter {
    prices_path: PathBuf,
    macro_path: Option<PathBuf>,
}

impl CsvDataAdapter {
    pub fn new(prices_path: PathBuf, macro_path: Option<PathBuf>) -> Self {
        Self {
            prices_path,
            macro_path,
        }
    }
}

fn read_file(path: &Path) -> Result<String, RebalanceError> {
    fs::read_to_string(path).map_err(|e| {
        RebalanceError::data(format!("failed to read {}: {}", path.display(), e))
    })
}

fn parse_date(raw: &str) -> Result<NaiveDate, RebalanceError> {
    let raw = raw.trim();
    // tolerate a trailing time component ("2005-01-03 00:00:00")
    let day = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(day, "%Y-%m-%d")
        .map_err(|e| RebalanceError::data(format!("invalid date '{}': {}", raw, e)))
}

/// `None` for an empty or placeholder cell.
fn parse_cell(raw: &str) -> Result<Option<f64>, RebalanceError> {
    let raw = raw.trim();
    if raw.is_empty() || raw == "." || raw.eq_ignore_ascii_case("nan") || raw == "NA" {
        return Ok(None);
    }
    let value: f64 = raw
        .parse()
        .map_err(|e| RebalanceError::data(format!("invalid value '{}': {}", raw, e)))?;
    Ok(value.is_finite().then_some(value))
}

impl DataPort for CsvDataAdapter {
    fn load_prices(&self, instruments: &[String]) -> Result<PriceTable, RebalanceError> {
        let content = read_file(&self.prices_path)?;
        let mut rdr = csv::Reader::from_reader(content.as_bytes());

        let headers = rdr
            .headers()
            .map_err(|e| RebalanceError::data(format!("CSV header error: {}", e)))?
            .clone();
        let indices = instruments
            .iter()
            .map(|id| {
                headers
                    .iter()
                    .position(|h| h.trim() == id)
                    .filter(|&i| i > 0)
                    .ok_or_else(|| {
                        RebalanceError::data(format!(
                            "no column {} in {}",
                            id,
                            self.prices_path.display()
                        ))
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut rows: Vec<(NaiveDate, Vec<f64>)> = Vec::new();
        let mut dropped = 0usize;
        for result in rdr.records() {
            let record =
                result.map_err(|e| RebalanceError::data(format!("CSV parse error: {}", e)))?;
            let date = parse_date(
                record
                    .get(0)
                    .ok_or_else(|| RebalanceError::data("missing date column"))?,
            )?;
            let cells = indices
                .iter()
                .map(|&i| parse_cell(record.get(i).unwrap_or("")))
                .collect::<Result<Vec<_>, _>>()?;
            match cells.into_iter().collect::<Option<Vec<f64>>>() {
                Some(prices) => rows.push((date, prices)),
                None => dropped += 1,
            }
        }
        if dropped > 0 {
            warn!(
                "dropped {} rows with missing prices from {}",
                dropped,
                self.prices_path.display()
            );
        }

        rows.sort_by_key(|(d, _)| *d);
        debug!(
            "loaded {} price rows for {} instruments",
            rows.len(),
            instruments.len()
        );
        let (dates, rows): (Vec<_>, Vec<_>) = rows.into_iter().unzip();
        PriceTable::new(instruments.to_vec(), dates, rows)
    }

    fn load_macro_series(&self) -> Result<Vec<MacroObservation>, RebalanceError> {
        let path = self
            .macro_path
            .as_ref()
            .ok_or_else(|| RebalanceError::missing("data", "macro_series"))?;
        let content = read_file(path)?;
        let mut rdr = csv::Reader::from_reader(content.as_bytes());

        let mut series = Vec::new();
        for result in rdr.records() {
            let record =
                result.map_err(|e| RebalanceError::data(format!("CSV parse error: {}", e)))?;
            let date = parse_date(
                record
                    .get(0)
                    .ok_or_else(|| RebalanceError::data("missing date column"))?,
            )?;
            let raw = record
                .get(1)
                .ok_or_else(|| RebalanceError::data("missing value column"))?;
            if let Some(value) = parse_cell(raw)? {
                series.push(MacroObservation { date, value });
            }
        }

        series.sort_by_key(|o| o.date);
        Ok(series)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_test_data() -> (TempDir, PathBuf, PathBuf) {
        let dir = TempDir::new().unwrap();
        let prices = dir.path().join("prices.csv");
        let unrate = dir.path().join("UNRATE.csv");

        fs::write(
            &prices,
            "date,SPY,TLT,GLD\n\
             2024-01-03,101.0,50.5,\n\
             2024-01-02,100.0,50.0,180.0\n\
             2024-01-04,102.0,,181.0\n\
             2024-01-05 00:00:00,103.0,51.0,182.0\n",
        )
        .unwrap();
        fs::write(
            &unrate,
            "DATE,UNRATE\n2024-01-01,3.7\n2024-02-01,.\n2024-03-01,3.9\n",
        )
        .unwrap();

        (dir, prices, unrate)
    }

    fn ids(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn load_prices_sorts_and_selects_columns() {
        let (_dir, prices, _) = setup_test_data();
        let adapter = CsvDataAdapter::new(prices, None);
        let table = adapter.load_prices(&ids(&["TLT", "SPY"])).unwrap();

        assert_eq!(table.instruments(), ids(&["TLT", "SPY"]).as_slice());
        // 2024-01-04 has no TLT close
        assert_eq!(table.len(), 3);
        assert_eq!(table.dates()[0], NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(table.rows()[0], vec![50.0, 100.0]);
        assert_eq!(table.dates()[2], NaiveDate::from_ymd_opt(2024, 1, 5).unwrap());
    }

    #[test]
    fn load_prices_drops_rows_missing_any_requested_column() {
        let (_dir, prices, _) = setup_test_data();
        let adapter = CsvDataAdapter::new(prices, None);
        let table = adapter.load_prices(&ids(&["SPY", "TLT", "GLD"])).unwrap();
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn unknown_column_is_data_error() {
        let (_dir, prices, _) = setup_test_data();
        let adapter = CsvDataAdapter::new(prices, None);
        let err = adapter.load_prices(&ids(&["QQQ"])).unwrap_err();
        assert!(matches!(err, RebalanceError::Data { reason } if reason.contains("QQQ")));
    }

    #[test]
    fn missing_file_is_data_error() {
        let adapter = CsvDataAdapter::new(PathBuf::from("/nonexistent/prices.csv"), None);
        assert!(matches!(
            adapter.load_prices(&ids(&["SPY"])),
            Err(RebalanceError::Data { .. })
        ));
    }

    #[test]
    fn garbage_price_is_data_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("p.csv");
        fs::write(&path, "date,SPY\n2024-01-02,abc\n").unwrap();
        let adapter = CsvDataAdapter::new(path, None);
        assert!(matches!(
            adapter.load_prices(&ids(&["SPY"])),
            Err(RebalanceError::Data { .. })
        ));
    }

    #[test]
    fn load_macro_series_skips_placeholders() {
        let (_dir, prices, unrate) = setup_test_data();
        let adapter = CsvDataAdapter::new(prices, Some(unrate));
        let series = adapter.load_macro_series().unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series[1].value, 3.9);
        assert_eq!(series[1].date, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
    }

    #[test]
    fn macro_series_without_path_is_config_missing() {
        let (_dir, prices, _) = setup_test_data();
        let adapter = CsvDataAdapter::new(prices, None);
        assert!(matches!(
            adapter.load_macro_series(),
            Err(RebalanceError::ConfigMissing { .. })
        ));
    }
}
