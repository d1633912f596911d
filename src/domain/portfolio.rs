//! Portfolio ledger: cash, share lots and the transaction history.
//!
//! The five mutating operations ([`Portfolio::deposit`], [`Portfolio::buy`],
//! [`Portfolio::sell`], [`Portfolio::sell_all`], [`Portfolio::dividend`]) are
//! atomic: they validate first, then mutate, then append exactly one
//! [`Transaction`]. Registered [`LedgerHook`]s run after the append.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, warn};

use super::error::RatioTraderError;
use super::price_table::PriceTable;
use super::stock::Stock;
use super::transaction::Transaction;
use crate::ports::persistence_port::LedgerHook;

/// Tolerance for buy-power sufficiency, oversell and zero-share checks.
pub const EPSILON: f64 = 1e-3;

pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Serializable state of a portfolio, without its price context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSnapshot {
    pub name: String,
    pub cash: f64,
    pub holdings: Vec<Stock>,
    pub history: Vec<Transaction>,
}

/// One line of [`Portfolio::holdings_report`].
#[derive(Debug, Clone, PartialEq)]
pub struct HoldingLine {
    pub stock: Stock,
    pub price: f64,
    pub value: f64,
    pub cost_basis: f64,
    pub unrealized_pnl: f64,
}

pub struct Portfolio {
    name: String,
    cash: f64,
    holdings: BTreeMap<String, Stock>,
    history: Vec<Transaction>,
    context: PriceTable,
    hooks: Vec<Box<dyn LedgerHook>>,
}

impl fmt::Debug for Portfolio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Portfolio")
            .field("name", &self.name)
            .field("cash", &self.cash)
            .field("holdings", &self.holdings)
            .field("history", &self.history.len())
            .field("context_end", &self.context.last_date())
            .field("hooks", &self.hooks.len())
            .finish()
    }
}

fn check_amount(
    operation: &'static str,
    field: &'static str,
    value: f64,
    allow_zero: bool,
) -> Result<(), RatioTraderError> {
    let valid = value.is_finite() && (value > 0.0 || (allow_zero && value == 0.0));
    if valid {
        Ok(())
    } else {
        Err(RatioTraderError::InvalidAmount {
            operation,
            field,
            value,
        })
    }
}

impl Portfolio {
    pub fn new(name: impl Into<String>, context: PriceTable) -> Self {
        Portfolio {
            name: name.into(),
            cash: 0.0,
            holdings: BTreeMap::new(),
            history: Vec::new(),
            context,
            hooks: Vec::new(),
        }
    }

    /// Rebuild a portfolio from a saved snapshot against a fresh price window.
    pub fn restore(snapshot: PortfolioSnapshot, context: PriceTable) -> Self {
        Portfolio {
            name: snapshot.name,
            cash: snapshot.cash,
            holdings: snapshot
                .holdings
                .into_iter()
                .map(|s| (s.ticker.clone(), s))
                .collect(),
            history: snapshot.history,
            context,
            hooks: Vec::new(),
        }
    }

    pub fn snapshot(&self) -> PortfolioSnapshot {
        PortfolioSnapshot {
            name: self.name.clone(),
            cash: self.cash,
            holdings: self.holdings.values().cloned().collect(),
            history: self.history.clone(),
        }
    }

    /// Hook-less copy over the same price window, for staging a batch of
    /// operations before committing them with [`Portfolio::apply`].
    pub fn scratch(&self) -> Portfolio {
        Portfolio::restore(self.snapshot(), self.context.clone())
    }

    /// Re-run a transaction recorded by another ledger through the matching
    /// operation, hooks included.
    pub fn apply(&mut self, transaction: &Transaction) -> Result<(), RatioTraderError> {
        match transaction {
            Transaction::Deposit { date, value } => self.deposit(*value, *date),
            Transaction::Buy {
                date,
                ticker,
                shares,
                total_cost,
            } => self.buy(ticker, *shares, *total_cost, *date),
            Transaction::Sell {
                date,
                ticker,
                shares,
                total_price,
            } => self.sell(ticker, *shares, *total_price, *date),
            Transaction::Dividend {
                date,
                ticker,
                amount,
                ex_date,
            } => self.dividend(ticker, *amount, *ex_date, *date),
        }
    }

    pub fn add_hook(&mut self, hook: Box<dyn LedgerHook>) {
        self.hooks.push(hook);
    }

    pub fn with_hook(mut self, hook: Box<dyn LedgerHook>) -> Self {
        self.add_hook(hook);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn holdings(&self) -> impl Iterator<Item = &Stock> {
        self.holdings.values()
    }

    pub fn holding(&self, ticker: &str) -> Option<&Stock> {
        self.holdings.get(ticker)
    }

    pub fn is_held(&self, ticker: &str) -> bool {
        self.holdings.contains_key(ticker)
    }

    pub fn history(&self) -> &[Transaction] {
        &self.history
    }

    pub fn deposits(&self) -> Vec<(NaiveDate, f64)> {
        self.history
            .iter()
            .filter_map(|tx| match tx {
                Transaction::Deposit { date, value } => Some((*date, *value)),
                _ => None,
            })
            .collect()
    }

    pub fn context(&self) -> &PriceTable {
        &self.context
    }

    /// Replace the visible price window.
    pub fn set_context(&mut self, context: PriceTable) {
        self.context = context;
    }

    fn commit(&mut self, transaction: Transaction) {
        debug!(portfolio = %self.name, %transaction, cash = self.cash, "committed");
        self.history.push(transaction);

        if self.hooks.is_empty() {
            return;
        }
        let mut hooks = std::mem::take(&mut self.hooks);
        if let Some(transaction) = self.history.last() {
            for hook in hooks.iter_mut() {
                if let Err(e) = hook.after_commit(self, transaction) {
                    warn!(portfolio = %self.name, error = %e, "ledger hook failed");
                }
            }
        }
        self.hooks = hooks;
    }

    pub fn deposit(&mut self, amount: f64, date: NaiveDate) -> Result<(), RatioTraderError> {
        check_amount("deposit", "amount", amount, false)?;
        self.cash += amount;
        self.commit(Transaction::Deposit {
            date,
            value: amount,
        });
        Ok(())
    }

    pub fn buy(
        &mut self,
        ticker: &str,
        shares: f64,
        total_cost: f64,
        date: NaiveDate,
    ) -> Result<(), RatioTraderError> {
        check_amount("buy", "shares", shares, false)?;
        check_amount("buy", "total_cost", total_cost, true)?;

        let remaining = self.cash - total_cost;
        if remaining < -EPSILON {
            return Err(RatioTraderError::InsufficientBuyPower {
                required: total_cost,
                available: self.cash,
            });
        }
        self.cash = remaining.max(0.0);

        self.holdings
            .entry(ticker.to_string())
            .and_modify(|lot| {
                lot.avg_cost =
                    (lot.avg_cost * lot.num_shares + total_cost) / (lot.num_shares + shares);
                lot.num_shares += shares;
            })
            .or_insert_with(|| Stock::new(ticker, shares, total_cost / shares));

        self.commit(Transaction::Buy {
            date,
            ticker: ticker.to_string(),
            shares,
            total_cost,
        });
        Ok(())
    }

    pub fn sell(
        &mut self,
        ticker: &str,
        shares: f64,
        total_price: f64,
        date: NaiveDate,
    ) -> Result<(), RatioTraderError> {
        check_amount("sell", "shares", shares, false)?;
        check_amount("sell", "total_price", total_price, true)?;

        let held = self
            .holdings
            .get(ticker)
            .map(|lot| lot.num_shares)
            .ok_or_else(|| RatioTraderError::NotHeld {
                ticker: ticker.to_string(),
            })?;
        if shares - held > EPSILON {
            return Err(RatioTraderError::Oversell {
                ticker: ticker.to_string(),
                requested: shares,
                held,
            });
        }

        let remaining = held - shares;
        if remaining <= EPSILON {
            self.holdings.remove(ticker);
        } else if let Some(lot) = self.holdings.get_mut(ticker) {
            lot.num_shares = remaining;
        }
        self.cash += total_price;

        self.commit(Transaction::Sell {
            date,
            ticker: ticker.to_string(),
            shares,
            total_price,
        });
        Ok(())
    }

    pub fn sell_all(
        &mut self,
        ticker: &str,
        total_price: f64,
        date: NaiveDate,
    ) -> Result<(), RatioTraderError> {
        let held = self
            .holdings
            .get(ticker)
            .map(|lot| lot.num_shares)
            .ok_or_else(|| RatioTraderError::NotHeld {
                ticker: ticker.to_string(),
            })?;
        self.sell(ticker, held, total_price, date)
    }

    /// Credit a cash dividend and lower the lot's cost basis by
    /// `1 - (amount / shares) / pre_ex_close`.
    pub fn dividend(
        &mut self,
        ticker: &str,
        amount: f64,
        ex_date: NaiveDate,
        date: NaiveDate,
    ) -> Result<(), RatioTraderError> {
        check_amount("dividend", "amount", amount, false)?;

        let held = self
            .holdings
            .get(ticker)
            .map(|lot| lot.num_shares)
            .ok_or_else(|| RatioTraderError::NotHeld {
                ticker: ticker.to_string(),
            })?;
        let pre_ex_close = self
            .context
            .close_before(ticker, ex_date)
            .filter(|p| *p > 0.0)
            .ok_or_else(|| RatioTraderError::MissingPrice {
                ticker: ticker.to_string(),
                date: ex_date,
            })?;

        let factor = 1.0 - (amount / held) / pre_ex_close;
        if factor <= 0.0 {
            return Err(RatioTraderError::InvalidAmount {
                operation: "dividend",
                field: "amount",
                value: amount,
            });
        }
        if let Some(lot) = self.holdings.get_mut(ticker) {
            lot.avg_cost *= factor;
        }
        self.cash += amount;

        self.commit(Transaction::Dividend {
            date,
            ticker: ticker.to_string(),
            amount,
            ex_date,
        });
        Ok(())
    }

    /// Latest close of `ticker` in the current context.
    pub fn last_price(&self, ticker: &str) -> Result<f64, RatioTraderError> {
        self.context.require_column(ticker)?;
        self.context
            .latest_close(ticker)
            .ok_or_else(|| RatioTraderError::MissingPrice {
                ticker: ticker.to_string(),
                date: self.context.last_date().unwrap_or(NaiveDate::MIN),
            })
    }

    /// Cash plus holdings at latest prices, unrounded.
    pub fn total_value(&self) -> Result<f64, RatioTraderError> {
        let mut value = self.cash;
        for lot in self.holdings.values() {
            value += lot.market_value(self.last_price(&lot.ticker)?);
        }
        Ok(value)
    }

    /// [`Portfolio::total_value`] rounded to 3 decimals for reporting.
    pub fn current_value(&self) -> Result<f64, RatioTraderError> {
        self.total_value().map(round3)
    }

    /// Value today of a shadow account that put every deposit into the
    /// benchmark at that day's close.
    pub fn market_current_value(&self, benchmark: &str) -> Result<f64, RatioTraderError> {
        self.context.require_column(benchmark)?;

        let mut shares = 0.0;
        for (date, value) in self.deposits() {
            let close = self
                .context
                .close_at_or_before(benchmark, date)
                .filter(|p| *p > 0.0)
                .ok_or_else(|| RatioTraderError::MissingPrice {
                    ticker: benchmark.to_string(),
                    date,
                })?;
            shares += value / close;
        }

        Ok(round3(shares * self.last_price(benchmark)?))
    }

    /// Market value of the largest lot, 0 when nothing is held.
    pub fn max_holding(&self) -> Result<f64, RatioTraderError> {
        let mut max = 0.0_f64;
        for lot in self.holdings.values() {
            max = max.max(lot.market_value(self.last_price(&lot.ticker)?));
        }
        Ok(max)
    }

    /// Lots with their latest price, largest market value first.
    pub fn holdings_report(&self) -> Result<Vec<HoldingLine>, RatioTraderError> {
        let mut lines = self
            .holdings
            .values()
            .map(|lot| {
                let price = self.last_price(&lot.ticker)?;
                Ok(HoldingLine {
                    stock: lot.clone(),
                    price,
                    value: lot.market_value(price),
                    cost_basis: lot.cost_basis(),
                    unrealized_pnl: lot.unrealized_pnl(price),
                })
            })
            .collect::<Result<Vec<_>, RatioTraderError>>()?;
        lines.sort_by(|a, b| b.value.total_cmp(&a.value));
        Ok(lines)
    }
}
