#![allow(dead_code)]

use chrono::NaiveDate;
use ratiotrader::domain::error::RatioTraderError;
use ratiotrader::domain::portfolio::Portfolio;
use ratiotrader::domain::price_table::PriceTable;
use ratiotrader::domain::strategy::{Allocation, Strategy};
use ratiotrader::ports::data_port::PriceDataPort;
use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

/// Consecutive calendar days starting at `start`.
pub fn days(start: &str, n: usize) -> Vec<NaiveDate> {
    let first = date(start);
    (0..n)
        .map(|i| first + chrono::Duration::days(i as i64))
        .collect()
}

pub fn make_table(dates: Vec<NaiveDate>, columns: &[(&str, &[f64])]) -> PriceTable {
    PriceTable::new(
        dates,
        columns
            .iter()
            .map(|(ticker, values)| (ticker.to_string(), values.to_vec()))
            .collect(),
    )
    .unwrap()
}

/// In-memory price port; records every requested range.
pub struct MockPriceData {
    pub table: PriceTable,
    pub error: Option<String>,
    pub requests: RefCell<Vec<(NaiveDate, NaiveDate)>>,
}

impl MockPriceData {
    pub fn new(table: PriceTable) -> Self {
        Self {
            table,
            error: None,
            requests: RefCell::new(Vec::new()),
        }
    }

    pub fn with_error(mut self, reason: &str) -> Self {
        self.error = Some(reason.to_string());
        self
    }
}

impl PriceDataPort for MockPriceData {
    fn load_prices(
        &self,
        tickers: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceTable, RatioTraderError> {
        self.requests.borrow_mut().push((start, end));
        if let Some(reason) = &self.error {
            return Err(RatioTraderError::Data {
                reason: reason.clone(),
            });
        }
        let rows = self.table.trading_dates(start, end);
        let offset = self.table.dates().partition_point(|d| *d < start);
        let names: Vec<String> = if tickers.is_empty() {
            self.table.tickers().to_vec()
        } else {
            tickers.to_vec()
        };
        let columns = names
            .iter()
            .map(|t| {
                let column = self.table.require_column(t)?;
                Ok((t.clone(), column[offset..offset + rows.len()].to_vec()))
            })
            .collect::<Result<Vec<_>, RatioTraderError>>()?;
        PriceTable::new(rows.to_vec(), columns)
    }

    fn list_tickers(&self) -> Result<Vec<String>, RatioTraderError> {
        Ok(self.table.tickers().to_vec())
    }
}

/// Strategy with fixed answers, filtered to what is actually held on sells.
#[derive(Default)]
pub struct ScriptedStrategy {
    pub initial: Vec<Allocation>,
    pub buys: Vec<Allocation>,
    pub sells: Vec<Allocation>,
}

impl Strategy for ScriptedStrategy {
    fn name(&self) -> &str {
        "scripted"
    }

    fn initialize(&self, _portfolio: &Portfolio) -> Result<Vec<Allocation>, RatioTraderError> {
        Ok(self.initial.clone())
    }

    fn to_buy(&self, _portfolio: &Portfolio) -> Result<Vec<Allocation>, RatioTraderError> {
        Ok(self.buys.clone())
    }

    fn to_sell(&self, portfolio: &Portfolio) -> Result<Vec<Allocation>, RatioTraderError> {
        Ok(self
            .sells
            .iter()
            .filter(|a| portfolio.is_held(&a.ticker))
            .cloned()
            .collect())
    }
}

/// Write a wide price CSV (`Date` plus one column per ticker).
pub fn write_prices_csv(dir: &Path, table: &PriceTable) -> PathBuf {
    let mut out = String::from("Date");
    for ticker in table.tickers() {
        out.push(',');
        out.push_str(ticker);
    }
    out.push('\n');
    for (i, d) in table.dates().iter().enumerate() {
        out.push_str(&d.to_string());
        for ticker in table.tickers() {
            let v = table.column(ticker).unwrap()[i];
            out.push(',');
            if v.is_finite() {
                out.push_str(&v.to_string());
            }
        }
        out.push('\n');
    }
    let path = dir.join("prices.csv");
    fs::write(&path, out).unwrap();
    path
}

/// Oscillating prices around opposite trends against a wavy benchmark, so
/// every window has a proper band and the latest price is rarely an extreme.
pub fn wave_table(start: &str, n: usize) -> PriceTable {
    let dates = days(start, n);
    let up: Vec<f64> = (0..n)
        .map(|i| 100.0 * (1.0 + 0.004 * i as f64) + 5.0 * (i as f64 * 0.7).sin())
        .collect();
    let down: Vec<f64> = (0..n)
        .map(|i| 100.0 * (1.0 - 0.002 * i as f64) + 4.0 * (i as f64 * 0.9 + 1.0).sin())
        .collect();
    let flat_ish: Vec<f64> = (0..n)
        .map(|i| 50.0 + 2.0 * (i as f64 * 0.45 + 2.0).sin())
        .collect();
    let idx: Vec<f64> = (0..n)
        .map(|i| 1000.0 + 20.0 * (i as f64 * 0.3).sin())
        .collect();
    make_table(
        dates,
        &[("UP", &up), ("DOWN", &down), ("SIDE", &flat_ish), ("IDX", &idx)],
    )
}
