//! Date-indexed adjusted-close table and its point-in-time views.
//!
//! A [`PriceTable`] owns its rows behind an `Arc`; [`PriceTable::view_through`]
//! hands out a prefix that shares the same storage, so the simulation can
//! move the visible window forward one day at a time without copying.

use chrono::NaiveDate;
use std::collections::HashSet;
use std::sync::Arc;

use super::error::RatioTraderError;

#[derive(Debug)]
struct TableData {
    dates: Vec<NaiveDate>,
    tickers: Vec<String>,
    columns: Vec<Vec<f64>>,
}

#[derive(Debug, Clone)]
pub struct PriceTable {
    data: Arc<TableData>,
    len: usize,
}

impl PriceTable {
    /// Build a table from a strictly increasing date index and one column per
    /// ticker. Missing observations are NaN.
    pub fn new(
        dates: Vec<NaiveDate>,
        columns: Vec<(String, Vec<f64>)>,
    ) -> Result<Self, RatioTraderError> {
        if let Some(pair) = dates.windows(2).find(|w| w[0] >= w[1]) {
            return Err(RatioTraderError::InvalidPriceTable {
                reason: format!("dates not strictly increasing at {}", pair[1]),
            });
        }

        let mut seen = HashSet::new();
        let mut tickers = Vec::with_capacity(columns.len());
        let mut values = Vec::with_capacity(columns.len());
        for (ticker, column) in columns {
            if ticker.trim().is_empty() {
                return Err(RatioTraderError::InvalidPriceTable {
                    reason: "empty ticker name".into(),
                });
            }
            if !seen.insert(ticker.clone()) {
                return Err(RatioTraderError::InvalidPriceTable {
                    reason: format!("duplicate column {ticker}"),
                });
            }
            if column.len() != dates.len() {
                return Err(RatioTraderError::InvalidPriceTable {
                    reason: format!(
                        "column {ticker} has {} rows, index has {}",
                        column.len(),
                        dates.len()
                    ),
                });
            }
            tickers.push(ticker);
            values.push(column);
        }

        let len = dates.len();
        Ok(Self {
            data: Arc::new(TableData {
                dates,
                tickers,
                columns: values,
            }),
            len,
        })
    }

    /// A table with no dates and no columns.
    pub fn empty() -> Self {
        Self {
            data: Arc::new(TableData {
                dates: Vec::new(),
                tickers: Vec::new(),
                columns: Vec::new(),
            }),
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.data.dates[..self.len]
    }

    pub fn tickers(&self) -> &[String] {
        &self.data.tickers
    }

    pub fn has_column(&self, ticker: &str) -> bool {
        self.column_index(ticker).is_some()
    }

    fn column_index(&self, ticker: &str) -> Option<usize> {
        self.data.tickers.iter().position(|t| t == ticker)
    }

    pub fn column(&self, ticker: &str) -> Option<&[f64]> {
        self.column_index(ticker)
            .map(|i| &self.data.columns[i][..self.len])
    }

    pub fn require_column(&self, ticker: &str) -> Result<&[f64], RatioTraderError> {
        self.column(ticker)
            .ok_or_else(|| RatioTraderError::MissingColumn {
                column: ticker.to_string(),
            })
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.dates().first().copied()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.dates().last().copied()
    }

    /// Number of visible rows dated on or before `date`.
    fn rows_through(&self, date: NaiveDate) -> usize {
        self.dates().partition_point(|d| *d <= date)
    }

    /// Close on exactly `date`, if that row exists and holds a finite price.
    pub fn close_on(&self, ticker: &str, date: NaiveDate) -> Option<f64> {
        let column = self.column(ticker)?;
        let row = self.dates().binary_search(&date).ok()?;
        Some(column[row]).filter(|p| p.is_finite())
    }

    /// Most recent finite close dated on or before `date`.
    pub fn close_at_or_before(&self, ticker: &str, date: NaiveDate) -> Option<f64> {
        let column = self.column(ticker)?;
        let end = self.rows_through(date);
        column[..end].iter().rev().copied().find(|p| p.is_finite())
    }

    /// Most recent finite close strictly before `date`.
    pub fn close_before(&self, ticker: &str, date: NaiveDate) -> Option<f64> {
        let column = self.column(ticker)?;
        let end = self.dates().partition_point(|d| *d < date);
        column[..end].iter().rev().copied().find(|p| p.is_finite())
    }

    pub fn latest_close(&self, ticker: &str) -> Option<f64> {
        let last = self.last_date()?;
        self.close_at_or_before(ticker, last)
    }

    /// Prefix of this table ending at the last row dated on or before `date`.
    pub fn view_through(&self, date: NaiveDate) -> PriceTable {
        PriceTable {
            data: Arc::clone(&self.data),
            len: self.rows_through(date),
        }
    }

    /// Visible index dates inside `[start, end]`.
    pub fn trading_dates(&self, start: NaiveDate, end: NaiveDate) -> &[NaiveDate] {
        let dates = self.dates();
        let lo = dates.partition_point(|d| *d < start);
        let hi = dates.partition_point(|d| *d <= end).max(lo);
        &dates[lo..hi]
    }

    /// New table holding only the requested columns, in the requested order.
    pub fn select(&self, tickers: &[String]) -> Result<PriceTable, RatioTraderError> {
        let columns = tickers
            .iter()
            .map(|t| Ok((t.clone(), self.require_column(t)?.to_vec())))
            .collect::<Result<Vec<_>, RatioTraderError>>()?;
        PriceTable::new(self.dates().to_vec(), columns)
    }
}
