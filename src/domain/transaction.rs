//! Ledger transactions.
//!
//! `Display` renders the one-line log format `"{KIND} {date} {payload}"`:
//!
//! ```text
//! DEPOSIT 2024-01-01 10000
//! BUY 2024-01-05 AAPL 10 for 1500.0
//! SELL 2024-01-09 AAPL 4 for 640.5
//! DIVIDEND 2024-02-01 AAPL 25.0
//! ```

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::portfolio::round3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionKind {
    Deposit,
    Buy,
    Sell,
    Dividend,
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransactionKind::Deposit => "DEPOSIT",
            TransactionKind::Buy => "BUY",
            TransactionKind::Sell => "SELL",
            TransactionKind::Dividend => "DIVIDEND",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "UPPERCASE")]
pub enum Transaction {
    Deposit {
        date: NaiveDate,
        value: f64,
    },
    Buy {
        date: NaiveDate,
        ticker: String,
        shares: f64,
        total_cost: f64,
    },
    Sell {
        date: NaiveDate,
        ticker: String,
        shares: f64,
        total_price: f64,
    },
    Dividend {
        date: NaiveDate,
        ticker: String,
        amount: f64,
        ex_date: NaiveDate,
    },
}

impl Transaction {
    pub fn date(&self) -> NaiveDate {
        match self {
            Transaction::Deposit { date, .. }
            | Transaction::Buy { date, .. }
            | Transaction::Sell { date, .. }
            | Transaction::Dividend { date, .. } => *date,
        }
    }

    pub fn kind(&self) -> TransactionKind {
        match self {
            Transaction::Deposit { .. } => TransactionKind::Deposit,
            Transaction::Buy { .. } => TransactionKind::Buy,
            Transaction::Sell { .. } => TransactionKind::Sell,
            Transaction::Dividend { .. } => TransactionKind::Dividend,
        }
    }

    pub fn ticker(&self) -> Option<&str> {
        match self {
            Transaction::Deposit { .. } => None,
            Transaction::Buy { ticker, .. }
            | Transaction::Sell { ticker, .. }
            | Transaction::Dividend { ticker, .. } => Some(ticker),
        }
    }
}

/// Money amounts always carry a decimal point, like `1500.0`.
fn money(value: f64) -> String {
    format!("{:?}", round3(value))
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transaction::Deposit { date, value } => {
                write!(f, "{} {} {}", self.kind(), date, round3(*value))
            }
            Transaction::Buy {
                date,
                ticker,
                shares,
                total_cost: amount,
            }
            | Transaction::Sell {
                date,
                ticker,
                shares,
                total_price: amount,
            } => write!(
                f,
                "{} {} {} {} for {}",
                self.kind(),
                date,
                ticker,
                shares,
                money(*amount)
            ),
            Transaction::Dividend {
                date,
                ticker,
                amount,
                ..
            } => write!(f, "{} {} {} {}", self.kind(), date, ticker, money(*amount)),
        }
    }
}
