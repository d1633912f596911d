//! Wide CSV price adapter.
//!
//! One `Date` column followed by one adjusted-close column per ticker:
//!
//! ```text
//! Date,AAPL,MSFT,^GSPC
//! 2024-01-02,185.6,370.9,4742.8
//! 2024-01-03,,368.2,4704.8
//! ```
//!
//! Empty cells and `NaN` load as missing observations.

use crate::domain::error::RatioTraderError;
use crate::domain::price_table::PriceTable;
use crate::ports::data_port::PriceDataPort;
use chrono::NaiveDate;
use std::fs;
use std::path::PathBuf;
use tracing::debug;

#[derive(Debug)]
pub struct CsvPriceAdapter {
    path: PathBuf,
}

fn data_error(reason: String) -> RatioTraderError {
    RatioTraderError::Data { reason }
}

fn parse_cell(raw: &str, line: u64, column: &str) -> Result<f64, RatioTraderError> {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("nan") {
        return Ok(f64::NAN);
    }
    raw.parse::<f64>().map_err(|e| {
        data_error(format!(
            "line {line}, column {column}: invalid price {raw:?}: {e}"
        ))
    })
}

impl CsvPriceAdapter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read_table(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceTable, RatioTraderError> {
        let content = fs::read_to_string(&self.path).map_err(|e| {
            data_error(format!("failed to read {}: {}", self.path.display(), e))
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let headers = rdr
            .headers()
            .map_err(|e| data_error(format!("CSV header error: {e}")))?
            .clone();
        match headers.get(0) {
            Some(h) if h.trim().eq_ignore_ascii_case("date") => {}
            _ => return Err(data_error("first column must be Date".into())),
        }
        let tickers: Vec<String> = headers.iter().skip(1).map(|h| h.trim().to_string()).collect();

        let mut rows: Vec<(NaiveDate, Vec<f64>)> = Vec::new();
        for result in rdr.records() {
            let record = result.map_err(|e| data_error(format!("CSV parse error: {e}")))?;
            let line = record.position().map(|p| p.line()).unwrap_or(0);

            let date_str = record
                .get(0)
                .ok_or_else(|| data_error(format!("line {line}: missing date")))?;
            let date = NaiveDate::parse_from_str(date_str.trim(), "%Y-%m-%d")
                .map_err(|e| data_error(format!("line {line}: invalid date format: {e}")))?;

            if date < start || date > end {
                continue;
            }

            let cells = tickers
                .iter()
                .enumerate()
                .map(|(i, ticker)| parse_cell(record.get(i + 1).unwrap_or(""), line, ticker))
                .collect::<Result<Vec<f64>, RatioTraderError>>()?;
            rows.push((date, cells));
        }

        rows.sort_by_key(|(date, _)| *date);
        let dates: Vec<NaiveDate> = rows.iter().map(|(date, _)| *date).collect();
        let columns = tickers
            .into_iter()
            .enumerate()
            .map(|(i, ticker)| (ticker, rows.iter().map(|(_, cells)| cells[i]).collect()))
            .collect();

        PriceTable::new(dates, columns)
    }
}

impl PriceDataPort for CsvPriceAdapter {
    fn load_prices(
        &self,
        tickers: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceTable, RatioTraderError> {
        let table = self.read_table(start, end)?;
        let table = if tickers.is_empty() {
            table
        } else {
            table.select(tickers)?
        };
        debug!(
            path = %self.path.display(),
            rows = table.len(),
            columns = table.tickers().len(),
            "prices loaded"
        );
        Ok(table)
    }

    fn list_tickers(&self) -> Result<Vec<String>, RatioTraderError> {
        let mut rdr = csv::Reader::from_path(&self.path).map_err(|e| {
            data_error(format!("failed to read {}: {}", self.path.display(), e))
        })?;
        let headers = rdr
            .headers()
            .map_err(|e| data_error(format!("CSV header error: {e}")))?;
        Ok(headers.iter().skip(1).map(|h| h.trim().to_string()).collect())
    }
}
