//! Cash-flow weighted rate of return.
//!
//! Finds the annual growth multiplier `rate` such that
//! `sum(amount_i * rate^(days_i / 365)) == target`, where `days_i` counts
//! calendar days from each deposit to the valuation date.

use chrono::NaiveDate;

use super::error::RatioTraderError;
use super::portfolio::Portfolio;

const MAX_EXPANSIONS: usize = 64;
const MAX_ITERATIONS: usize = 200;
const TOLERANCE: f64 = 1e-10;

fn future_value(deposits: &[(NaiveDate, f64)], rate: f64, valuation_date: NaiveDate) -> f64 {
    deposits
        .iter()
        .map(|(date, amount)| {
            let years = (valuation_date - *date).num_days() as f64 / 365.0;
            amount * rate.powf(years)
        })
        .sum()
}

pub fn solve(
    deposits: &[(NaiveDate, f64)],
    target_value: f64,
    valuation_date: NaiveDate,
) -> Result<f64, RatioTraderError> {
    if !target_value.is_finite() || target_value < 0.0 {
        return Err(RatioTraderError::InvalidAmount {
            operation: "solve",
            field: "target_value",
            value: target_value,
        });
    }
    if deposits.is_empty() {
        return Err(RatioTraderError::NoConvergence { iterations: 0 });
    }

    let f = |rate: f64| future_value(deposits, rate, valuation_date) - target_value;

    let (mut lo, mut hi) = (1.0_f64, 1.0_f64);
    let (mut f_lo, mut f_hi) = (f(lo), f(hi));
    if f_lo == 0.0 {
        return Ok(lo);
    }
    let mut expansions = 0;
    while f_lo.signum() == f_hi.signum() {
        if expansions == MAX_EXPANSIONS || !f_lo.is_finite() || !f_hi.is_finite() {
            return Err(RatioTraderError::NoConvergence {
                iterations: expansions,
            });
        }
        lo /= 2.0;
        hi *= 2.0;
        f_lo = f(lo);
        f_hi = f(hi);
        expansions += 1;
    }

    for _ in 0..MAX_ITERATIONS {
        let mid = 0.5 * (lo + hi);
        let f_mid = f(mid);
        if f_mid == 0.0 || (hi - lo) < TOLERANCE * mid.max(1.0) {
            return Ok(mid);
        }
        if f_mid.signum() == f_lo.signum() {
            lo = mid;
            f_lo = f_mid;
        } else {
            hi = mid;
        }
    }

    Err(RatioTraderError::NoConvergence {
        iterations: expansions + MAX_ITERATIONS,
    })
}

/// Portfolio and benchmark-proxy values with their implied annual rates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReturnComparison {
    pub valuation_date: NaiveDate,
    pub value: f64,
    pub rate: f64,
    pub benchmark_value: f64,
    pub benchmark_rate: f64,
}

impl ReturnComparison {
    /// Annual rate difference in percentage points.
    pub fn excess_pct(&self) -> f64 {
        (self.rate - self.benchmark_rate) * 100.0
    }
}

/// Compare the portfolio with the same deposits invested in `benchmark`.
pub fn solve_portfolio(
    portfolio: &Portfolio,
    benchmark: &str,
) -> Result<ReturnComparison, RatioTraderError> {
    let valuation_date =
        portfolio
            .context()
            .last_date()
            .ok_or_else(|| RatioTraderError::InvalidPriceTable {
                reason: "price window is empty".into(),
            })?;
    let deposits = portfolio.deposits();

    let value = portfolio.current_value()?;
    let benchmark_value = portfolio.market_current_value(benchmark)?;

    Ok(ReturnComparison {
        valuation_date,
        value,
        rate: solve(&deposits, value, valuation_date)?,
        benchmark_value,
        benchmark_rate: solve(&deposits, benchmark_value, valuation_date)?,
    })
}
