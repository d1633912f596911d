//! Strategy contract and the relative-strength reference strategy.

use super::error::RatioTraderError;
use super::portfolio::{round3, Portfolio};
use super::ratio::normalize;
use super::signal::{SignalEngine, SignalReport, WindowPair};

/// Fraction of a ticker's budget (buys) or holding (sells) to trade.
#[derive(Debug, Clone, PartialEq)]
pub struct Allocation {
    pub ticker: String,
    pub fraction: f64,
}

impl Allocation {
    pub fn new(ticker: impl Into<String>, fraction: f64) -> Self {
        Self {
            ticker: ticker.into(),
            fraction,
        }
    }
}

/// Decides what to hold. Implementations see only the portfolio, whose
/// context is the price window visible on the current trading day.
pub trait Strategy {
    fn name(&self) -> &str;

    /// Allocations of the starting buy power.
    fn initialize(&self, portfolio: &Portfolio) -> Result<Vec<Allocation>, RatioTraderError>;

    /// Allocations of the cash available after the day's sells.
    fn to_buy(&self, portfolio: &Portfolio) -> Result<Vec<Allocation>, RatioTraderError>;

    /// Fractions of held positions to sell. Only names held tickers.
    fn to_sell(&self, portfolio: &Portfolio) -> Result<Vec<Allocation>, RatioTraderError>;
}

pub const DEFAULT_INITIAL_WEIGHTS: [f64; 6] = [
    13.0 / 32.0,
    8.0 / 32.0,
    5.0 / 32.0,
    3.0 / 32.0,
    2.0 / 32.0,
    1.0 / 32.0,
];

pub const DEFAULT_BUY_SPLIT: [f64; 2] = [2.0 / 3.0, 1.0 / 3.0];

/// Ranks tickers by their benchmark-relative signal metric.
#[derive(Debug, Clone)]
pub struct RelativeStrengthStrategy {
    name: String,
    benchmark: String,
    engine: SignalEngine,
    initial_weights: Vec<f64>,
    buy_split: Vec<f64>,
}

impl RelativeStrengthStrategy {
    pub fn new(benchmark: impl Into<String>, windows: WindowPair) -> Self {
        Self {
            name: "relative strength".to_string(),
            benchmark: benchmark.into(),
            engine: SignalEngine::new(windows),
            initial_weights: DEFAULT_INITIAL_WEIGHTS.to_vec(),
            buy_split: DEFAULT_BUY_SPLIT.to_vec(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_initial_weights(mut self, weights: Vec<f64>) -> Self {
        self.initial_weights = weights;
        self
    }

    pub fn with_buy_split(mut self, split: Vec<f64>) -> Self {
        self.buy_split = split;
        self
    }

    pub fn benchmark(&self) -> &str {
        &self.benchmark
    }

    pub fn windows(&self) -> WindowPair {
        self.engine.windows()
    }

    /// Signal report as of the last date in the portfolio's context.
    pub fn report(&self, portfolio: &Portfolio) -> Result<SignalReport, RatioTraderError> {
        let context = portfolio.context();
        let as_of = context
            .last_date()
            .ok_or_else(|| RatioTraderError::InvalidPriceTable {
                reason: "price window is empty".into(),
            })?;
        let ratios = normalize(context, &self.benchmark)?;
        self.engine.evaluate(&ratios, as_of)
    }

    fn ranked_tickers(&self, report: &SignalReport) -> Vec<String> {
        report
            .ranked()
            .into_iter()
            .filter(|row| row.ticker != self.benchmark)
            .map(|row| row.ticker.clone())
            .collect()
    }
}

fn ladder(ranked: &[String], weights: &[f64]) -> Vec<Allocation> {
    ranked
        .iter()
        .zip(weights)
        .map(|(ticker, w)| Allocation::new(ticker.clone(), *w))
        .collect()
}

impl Strategy for RelativeStrengthStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn initialize(&self, portfolio: &Portfolio) -> Result<Vec<Allocation>, RatioTraderError> {
        let report = self.report(portfolio)?;
        Ok(ladder(&self.ranked_tickers(&report), &self.initial_weights))
    }

    fn to_buy(&self, portfolio: &Portfolio) -> Result<Vec<Allocation>, RatioTraderError> {
        let report = self.report(portfolio)?;
        let ranked = self.ranked_tickers(&report);
        if portfolio.cash() > portfolio.max_holding()? {
            Ok(ladder(&ranked, &self.buy_split))
        } else {
            Ok(ladder(&ranked, &[1.0]))
        }
    }

    fn to_sell(&self, portfolio: &Portfolio) -> Result<Vec<Allocation>, RatioTraderError> {
        let report = self.report(portfolio)?;
        Ok(portfolio
            .holdings()
            .filter(|lot| {
                report
                    .metric(&lot.ticker)
                    .is_some_and(|metric| round3(metric) <= 0.0)
            })
            .map(|lot| Allocation::new(lot.ticker.clone(), 1.0))
            .collect())
    }
}
