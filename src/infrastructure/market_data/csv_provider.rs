use crate::domain::errors::MarketDataError;
use crate::domain::market::price_series::{PricePoint, PriceSeries};
use crate::domain::ports::PriceHistoryProvider;
use chrono::{NaiveDate, NaiveTime};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Reads `<dir>/<SYMBOL>.csv` files with a `Date` column and an `Adj Close`
/// or `Close` column (the usual daily-bar export layout).
///
/// Rows with an empty or non-numeric close are skipped. A missing file or an
/// empty date range is reported as [`MarketDataError::NoData`].
pub struct CsvPriceProvider {
    data_dir: PathBuf,
}

impl CsvPriceProvider {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn file_for(&self, symbol: &str) -> PathBuf {
        self.data_dir.join(format!("{}.csv", symbol.to_uppercase()))
    }

    fn read_rows(path: &Path, symbol: &str) -> Result<Vec<(NaiveDate, f64)>, MarketDataError> {
        let unavailable = |reason: String| MarketDataError::SourceUnavailable {
            symbol: symbol.to_string(),
            reason,
        };

        let mut rdr = csv::Reader::from_path(path).map_err(|e| unavailable(e.to_string()))?;
        let headers = rdr.headers().map_err(|e| unavailable(e.to_string()))?.clone();
        let column = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
        };

        let date_idx = column("Date").ok_or_else(|| unavailable("missing Date column".to_string()))?;
        let close_idx = column("Adj Close")
            .or_else(|| column("Close"))
            .ok_or_else(|| unavailable("missing Close column".to_string()))?;

        let mut rows = Vec::new();
        for (line, record) in rdr.records().enumerate() {
            let record = record.map_err(|e| unavailable(e.to_string()))?;
            let raw_date = record.get(date_idx).unwrap_or_default().trim();
            // Accept both "2024-01-31" and "2024-01-31 00:00:00-05:00"
            let date = raw_date
                .get(..10)
                .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
                .ok_or_else(|| unavailable(format!("bad date {:?} on row {}", raw_date, line + 1)))?;

            match record
                .get(close_idx)
                .map(str::trim)
                .and_then(|c| c.parse::<f64>().ok())
                .filter(|c| c.is_finite())
            {
                Some(close) => rows.push((date, close)),
                None => debug!("Skipping {} row {} without a finite close", symbol, line + 1),
            }
        }

        rows.sort_by_key(|(date, _)| *date);
        Ok(rows)
    }
}

impl PriceHistoryProvider for CsvPriceProvider {
    fn fetch(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceSeries, MarketDataError> {
        let path = self.file_for(symbol);
        if !path.exists() {
            return Err(MarketDataError::NoData {
                symbol: symbol.to_string(),
            });
        }

        let points: Vec<PricePoint> = Self::read_rows(&path, symbol)?
            .into_iter()
            .filter(|(date, _)| *date >= start && *date <= end)
            .map(|(date, close)| PricePoint {
                timestamp: date.and_time(NaiveTime::MIN).and_utc().timestamp(),
                close,
            })
            .collect();

        if points.is_empty() {
            return Err(MarketDataError::NoData {
                symbol: symbol.to_string(),
            });
        }

        debug!("Loaded {} closes for {} from {:?}", points.len(), symbol, path);
        PriceSeries::new(points).map_err(|source| MarketDataError::InvalidSeries {
            symbol: symbol.to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("prices-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_reads_and_filters_range() {
        let dir = temp_dir();
        fs::write(
            dir.join("AAPL.csv"),
            "Date,Open,Close,Adj Close\n\
             2024-01-03,1,10.0,9.5\n\
             2024-01-02,1,10.0,9.0\n\
             2024-01-04,1,10.0,\n\
             2024-01-05,1,10.0,10.5\n",
        )
        .unwrap();

        let provider = CsvPriceProvider::new(&dir);
        let series = provider
            .fetch("aapl", date("2024-01-03"), date("2024-12-31"))
            .unwrap();
        assert_eq!(series.closes(), vec![9.5, 10.5]);
        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_non_finite_closes_are_skipped() {
        let dir = temp_dir();
        fs::write(
            dir.join("GAP.csv"),
            "Date,Close\n\
             2024-01-02,100\n\
             2024-01-03,NaN\n\
             2024-01-04,inf\n\
             2024-01-05,-infinity\n\
             2024-01-08,102\n",
        )
        .unwrap();

        let series = CsvPriceProvider::new(&dir)
            .fetch("GAP", date("2024-01-01"), date("2024-12-31"))
            .unwrap();
        assert_eq!(series.closes(), vec![100.0, 102.0]);
        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_missing_file_is_no_data() {
        let provider = CsvPriceProvider::new(temp_dir());
        let err = provider
            .fetch("ZZZZ", date("2024-01-01"), date("2024-12-31"))
            .unwrap_err();
        assert!(err.is_no_data());
    }

    #[test]
    fn test_empty_range_is_no_data() {
        let dir = temp_dir();
        fs::write(dir.join("MSFT.csv"), "Date,Close\n2020-01-02,100\n").unwrap();
        let err = CsvPriceProvider::new(&dir)
            .fetch("MSFT", date("2024-01-01"), date("2024-12-31"))
            .unwrap_err();
        assert!(err.is_no_data());
        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_non_positive_close_is_invalid_series() {
        let dir = temp_dir();
        fs::write(dir.join("BAD.csv"), "Date,Close\n2024-01-02,100\n2024-01-03,0\n").unwrap();
        let err = CsvPriceProvider::new(&dir)
            .fetch("BAD", date("2024-01-01"), date("2024-12-31"))
            .unwrap_err();
        assert!(matches!(err, MarketDataError::InvalidSeries { .. }));
        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_missing_close_column_is_unavailable() {
        let dir = temp_dir();
        fs::write(dir.join("ODD.csv"), "Date,Open\n2024-01-02,100\n").unwrap();
        let err = CsvPriceProvider::new(&dir)
            .fetch("ODD", date("2024-01-01"), date("2024-12-31"))
            .unwrap_err();
        assert!(matches!(err, MarketDataError::SourceUnavailable { .. }));
        fs::remove_dir_all(dir).ok();
    }
}
