//! Share lots held by a portfolio.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A ticker's aggregated holding. Never held at zero shares.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stock {
    pub ticker: String,
    pub num_shares: f64,
    pub avg_cost: f64,
}

impl Stock {
    pub fn new(ticker: impl Into<String>, num_shares: f64, avg_cost: f64) -> Self {
        Self {
            ticker: ticker.into(),
            num_shares,
            avg_cost,
        }
    }

    pub fn market_value(&self, price: f64) -> f64 {
        self.num_shares * price
    }

    pub fn cost_basis(&self) -> f64 {
        self.num_shares * self.avg_cost
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.num_shares * (price - self.avg_cost)
    }
}

impl fmt::Display for Stock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} @ {:.3}", self.ticker, self.num_shares, self.avg_cost)
    }
}
