//! Append-only text log of ledger transactions, one `{name}.log` per
//! portfolio, one `Transaction` display line per commit.

use crate::domain::error::RatioTraderError;
use crate::domain::portfolio::Portfolio;
use crate::domain::transaction::Transaction;
use crate::ports::persistence_port::LedgerHook;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

#[derive(Debug)]
pub struct TransactionLogAdapter {
    directory: PathBuf,
}

impl TransactionLogAdapter {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn log_path(&self, name: &str) -> PathBuf {
        self.directory.join(format!("{name}.log"))
    }

    pub fn read_lines(&self, name: &str) -> Result<Vec<String>, RatioTraderError> {
        let content = fs::read_to_string(self.log_path(name))?;
        Ok(content.lines().map(str::to_string).collect())
    }
}

impl LedgerHook for TransactionLogAdapter {
    fn after_commit(
        &mut self,
        portfolio: &Portfolio,
        transaction: &Transaction,
    ) -> Result<(), RatioTraderError> {
        fs::create_dir_all(&self.directory)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.log_path(portfolio.name()))?;
        writeln!(file, "{transaction}")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::price_table::PriceTable;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    #[test]
    fn appends_one_line_per_commit() {
        let dir = TempDir::new().unwrap();
        let context = PriceTable::new(vec![d(2)], vec![("AAPL".into(), vec![150.0])]).unwrap();
        let mut portfolio = Portfolio::new("logged", context)
            .with_hook(Box::new(TransactionLogAdapter::new(dir.path())));

        portfolio.deposit(10000.0, d(1)).unwrap();
        portfolio.buy("AAPL", 10.0, 1500.0, d(5)).unwrap();
        // rejected operations leave no line
        assert!(portfolio.sell("AAPL", 20.0, 3000.0, d(6)).is_err());

        let lines = TransactionLogAdapter::new(dir.path())
            .read_lines("logged")
            .unwrap();
        assert_eq!(
            lines,
            vec!["DEPOSIT 2024-01-01 10000", "BUY 2024-01-05 AAPL 10 for 1500.0"]
        );
    }

    #[test]
    fn existing_log_is_appended() {
        let dir = TempDir::new().unwrap();
        let log = TransactionLogAdapter::new(dir.path());
        fs::write(log.log_path("p"), "DEPOSIT 2023-12-29 5\n").unwrap();

        let context = PriceTable::new(vec![d(2)], vec![("A".into(), vec![1.0])]).unwrap();
        let mut portfolio = Portfolio::new("p", context).with_hook(Box::new(log));
        portfolio.deposit(7.0, d(2)).unwrap();

        let lines = TransactionLogAdapter::new(dir.path()).read_lines("p").unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1], "DEPOSIT 2024-01-02 7");
    }
}
