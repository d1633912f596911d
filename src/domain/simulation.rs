//! Day-stepped simulation driver.
//!
//! The driver walks the trading dates inside `[start_date, end_date]`,
//! narrows the portfolio's context to the rows dated on or before the
//! current day, asks the strategy what to do, and settles the answer
//! through the ledger: all sells first, then buys against the cash
//! available after the sells. A day is staged on a scratch copy of the
//! portfolio and committed whole, so an error leaves no partial day behind.

use chrono::NaiveDate;
use tracing::{debug, info};

use super::error::RatioTraderError;
use super::portfolio::{Portfolio, EPSILON};
use super::price_table::PriceTable;
use super::strategy::{Allocation, Strategy};
use crate::ports::persistence_port::LedgerHook;

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub buy_power: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulationState {
    Uninitialized,
    Initializing,
    /// The contained date is the last settled trading day.
    Running(NaiveDate),
    Finished,
}

/// Portfolio value at the close of one trading day.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EquityPoint {
    pub date: NaiveDate,
    pub equity: f64,
}

#[derive(Debug)]
pub struct SimulationResult {
    pub portfolio: Portfolio,
    pub equity_curve: Vec<EquityPoint>,
}

pub struct SimulationDriver<S: Strategy> {
    prices: PriceTable,
    strategy: S,
    config: SimulationConfig,
    portfolio: Portfolio,
    seeded: bool,
    state: SimulationState,
    dates: Vec<NaiveDate>,
    cursor: usize,
    equity_curve: Vec<EquityPoint>,
}

fn check_fraction(allocation: &Allocation) -> Result<(), RatioTraderError> {
    if allocation.fraction.is_finite() && (0.0..=1.0).contains(&allocation.fraction) {
        Ok(())
    } else {
        Err(RatioTraderError::InvalidAllocation {
            ticker: allocation.ticker.clone(),
            fraction: allocation.fraction,
        })
    }
}

impl<S: Strategy> SimulationDriver<S> {
    /// Driver over a fresh portfolio funded with `config.buy_power` on the
    /// first trading day.
    pub fn new(
        name: impl Into<String>,
        prices: PriceTable,
        strategy: S,
        config: SimulationConfig,
    ) -> Self {
        let portfolio = Portfolio::new(name, prices.view_through(config.start_date));
        Self::build(prices, strategy, config, portfolio, false)
    }

    /// Driver continuing an existing portfolio. No deposit is made and the
    /// first trading day is settled like any other day.
    pub fn with_portfolio(
        portfolio: Portfolio,
        prices: PriceTable,
        strategy: S,
        config: SimulationConfig,
    ) -> Self {
        Self::build(prices, strategy, config, portfolio, true)
    }

    fn build(
        prices: PriceTable,
        strategy: S,
        config: SimulationConfig,
        portfolio: Portfolio,
        seeded: bool,
    ) -> Self {
        Self {
            prices,
            strategy,
            config,
            portfolio,
            seeded,
            state: SimulationState::Uninitialized,
            dates: Vec::new(),
            cursor: 0,
            equity_curve: Vec::new(),
        }
    }

    pub fn with_hook(mut self, hook: Box<dyn LedgerHook>) -> Self {
        self.portfolio.add_hook(hook);
        self
    }

    pub fn state(&self) -> SimulationState {
        self.state
    }

    pub fn portfolio(&self) -> &Portfolio {
        &self.portfolio
    }

    pub fn equity_curve(&self) -> &[EquityPoint] {
        &self.equity_curve
    }

    pub fn trading_dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// Advance exactly one state transition.
    pub fn step(&mut self) -> Result<SimulationState, RatioTraderError> {
        self.state = match self.state {
            SimulationState::Uninitialized => {
                self.dates = self
                    .prices
                    .trading_dates(self.config.start_date, self.config.end_date)
                    .to_vec();
                if self.dates.is_empty() {
                    return Err(RatioTraderError::NoTradingDays {
                        start: self.config.start_date,
                        end: self.config.end_date,
                    });
                }
                info!(
                    portfolio = self.portfolio.name(),
                    strategy = self.strategy.name(),
                    start = %self.dates[0],
                    end = %self.dates[self.dates.len() - 1],
                    days = self.dates.len(),
                    "simulation starting"
                );
                SimulationState::Initializing
            }
            SimulationState::Initializing => {
                let start = self.dates[0];
                self.cursor = 0;
                if self.seeded {
                    self.trade_day(start)?;
                } else {
                    self.initialize(start)?;
                }
                self.record_equity(start)?;
                SimulationState::Running(start)
            }
            SimulationState::Running(_) => match self.dates.get(self.cursor + 1).copied() {
                Some(date) => {
                    self.cursor += 1;
                    self.trade_day(date)?;
                    self.record_equity(date)?;
                    SimulationState::Running(date)
                }
                None => {
                    info!(
                        portfolio = self.portfolio.name(),
                        value = self.portfolio.total_value()?,
                        transactions = self.portfolio.history().len(),
                        "simulation finished"
                    );
                    SimulationState::Finished
                }
            },
            SimulationState::Finished => SimulationState::Finished,
        };
        Ok(self.state)
    }

    /// Step until finished and hand back the portfolio.
    pub fn run(mut self) -> Result<SimulationResult, RatioTraderError> {
        while self.state != SimulationState::Finished {
            self.step()?;
        }
        Ok(SimulationResult {
            portfolio: self.portfolio,
            equity_curve: self.equity_curve,
        })
    }

    fn price_on(&self, ticker: &str, date: NaiveDate) -> Result<f64, RatioTraderError> {
        self.prices.require_column(ticker)?;
        self.prices
            .close_on(ticker, date)
            .filter(|p| *p > 0.0)
            .ok_or_else(|| RatioTraderError::MissingPrice {
                ticker: ticker.to_string(),
                date,
            })
    }

    fn initialize(&mut self, start: NaiveDate) -> Result<(), RatioTraderError> {
        self.portfolio.set_context(self.prices.view_through(start));
        let buy_power = self.config.buy_power;
        self.settle(|driver, staged| {
            staged.deposit(buy_power, start)?;
            let allocations = driver.strategy.initialize(staged)?;
            debug!(date = %start, allocations = allocations.len(), "initial allocation");
            driver.buy_all(staged, &allocations, buy_power, start)
        })
    }

    fn trade_day(&mut self, date: NaiveDate) -> Result<(), RatioTraderError> {
        self.portfolio.set_context(self.prices.view_through(date));
        self.settle(|driver, staged| {
            let sells = driver.strategy.to_sell(staged)?;
            driver.sell_fractions(staged, &sells, date)?;

            let available = staged.cash();
            let mut buys = 0;
            if available > EPSILON {
                let allocations = driver.strategy.to_buy(staged)?;
                buys = allocations.len();
                driver.buy_all(staged, &allocations, available, date)?;
            }

            debug!(
                date = %date,
                sells = sells.len(),
                buys,
                cash = staged.cash(),
                "day settled"
            );
            Ok(())
        })
    }

    /// Run `day` against a hook-less copy of the portfolio and commit its
    /// transactions only when it succeeds. A failed day leaves the portfolio
    /// and its hooks untouched.
    fn settle<F>(&mut self, day: F) -> Result<(), RatioTraderError>
    where
        F: FnOnce(&Self, &mut Portfolio) -> Result<(), RatioTraderError>,
    {
        let mut staged = self.portfolio.scratch();
        let committed = staged.history().len();
        day(self, &mut staged)?;
        for transaction in &staged.history()[committed..] {
            self.portfolio.apply(transaction)?;
        }
        Ok(())
    }

    fn sell_fractions(
        &self,
        portfolio: &mut Portfolio,
        allocations: &[Allocation],
        date: NaiveDate,
    ) -> Result<(), RatioTraderError> {
        for allocation in allocations {
            check_fraction(allocation)?;
        }
        for allocation in allocations {
            if allocation.fraction == 0.0 {
                continue;
            }
            let held = portfolio
                .holding(&allocation.ticker)
                .map(|lot| lot.num_shares)
                .ok_or_else(|| RatioTraderError::NotHeld {
                    ticker: allocation.ticker.clone(),
                })?;
            let price = self.price_on(&allocation.ticker, date)?;
            if allocation.fraction == 1.0 {
                portfolio.sell_all(&allocation.ticker, held * price, date)?;
            } else {
                let shares = allocation.fraction * held;
                portfolio.sell(&allocation.ticker, shares, shares * price, date)?;
            }
        }
        Ok(())
    }

    fn buy_all(
        &self,
        portfolio: &mut Portfolio,
        allocations: &[Allocation],
        budget: f64,
        date: NaiveDate,
    ) -> Result<(), RatioTraderError> {
        for allocation in allocations {
            check_fraction(allocation)?;
        }
        for allocation in allocations {
            if allocation.fraction == 0.0 {
                continue;
            }
            let price = self.price_on(&allocation.ticker, date)?;
            let spend = allocation.fraction * budget;
            portfolio.buy(&allocation.ticker, spend / price, spend, date)?;
        }
        Ok(())
    }

    fn record_equity(&mut self, date: NaiveDate) -> Result<(), RatioTraderError> {
        let equity = self.portfolio.total_value()?;
        self.equity_curve.push(EquityPoint { date, equity });
        Ok(())
    }
}
