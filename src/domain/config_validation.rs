//! Configuration validation.
//!
//! Validates every INI section before a run, plus the small value parsers
//! the CLI uses to turn validated strings into domain types.

use crate::domain::error::RatioTraderError;
use crate::domain::signal::{Horizon, WindowPair};
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;

pub fn validate_config(config: &dyn ConfigPort) -> Result<(), RatioTraderError> {
    validate_data_config(config)?;
    validate_simulation_config(config)?;
    validate_strategy_config(config)?;
    validate_persistence_config(config)?;
    Ok(())
}

pub fn validate_data_config(config: &dyn ConfigPort) -> Result<(), RatioTraderError> {
    require_string(config, "data", "prices").map(|_| ())
}

pub fn validate_simulation_config(config: &dyn ConfigPort) -> Result<(), RatioTraderError> {
    validate_buy_power(config)?;
    validate_dates(config)?;
    validate_benchmark(config)?;
    Ok(())
}

pub fn validate_strategy_config(config: &dyn ConfigPort) -> Result<(), RatioTraderError> {
    window_pair(config)?;
    weights(config, "initial_weights")?;
    weights(config, "buy_split")?;
    Ok(())
}

pub fn validate_persistence_config(config: &dyn ConfigPort) -> Result<(), RatioTraderError> {
    let autosave = config.get_bool("persistence", "autosave", false);
    let log = config.get_bool("persistence", "log_transactions", false);
    if autosave || log {
        require_string(config, "persistence", "directory")?;
    }
    Ok(())
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> RatioTraderError {
    RatioTraderError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

pub fn require_string(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<String, RatioTraderError> {
    match config.get_string(section, key) {
        Some(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        _ => Err(RatioTraderError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        }),
    }
}

fn validate_buy_power(config: &dyn ConfigPort) -> Result<(), RatioTraderError> {
    let value = config.get_double("simulation", "buy_power", 0.0);
    if !(value.is_finite() && value > 0.0) {
        return Err(invalid("simulation", "buy_power", "buy_power must be positive"));
    }
    Ok(())
}

fn validate_dates(config: &dyn ConfigPort) -> Result<(), RatioTraderError> {
    let start_date = parse_date(config, "simulation", "start_date")?;
    let end_date = parse_date(config, "simulation", "end_date")?;

    if start_date > end_date {
        return Err(invalid(
            "simulation",
            "start_date",
            "start_date must not be after end_date",
        ));
    }
    Ok(())
}

fn validate_benchmark(config: &dyn ConfigPort) -> Result<(), RatioTraderError> {
    let benchmark = require_string(config, "simulation", "benchmark")?;
    if let Some(tickers) = config.get_list("simulation", "tickers") {
        if tickers.is_empty() {
            return Err(invalid("simulation", "tickers", "tickers list is empty"));
        }
        if !tickers.contains(&benchmark) {
            return Err(invalid(
                "simulation",
                "tickers",
                format!("tickers must include the benchmark {benchmark}"),
            ));
        }
    }
    Ok(())
}

pub fn parse_date(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<NaiveDate, RatioTraderError> {
    require_string(config, section, key)?;
    match config.get_date(section, key) {
        Some(Ok(date)) => Ok(date),
        _ => Err(invalid(
            section,
            key,
            format!("invalid {key} format, expected YYYY-MM-DD"),
        )),
    }
}

/// A weight written as a decimal (`0.25`) or a fraction (`8/32`).
pub fn parse_weight(value: &str) -> Option<f64> {
    let weight = match value.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => value.trim().parse().ok()?,
    };
    weight.is_finite().then_some(weight)
}

/// `[strategy] initial_weights` or `buy_split`; `None` when not configured.
pub fn weights(config: &dyn ConfigPort, key: &str) -> Result<Option<Vec<f64>>, RatioTraderError> {
    let Some(raw) = config.get_list("strategy", key) else {
        return Ok(None);
    };
    let parsed = raw
        .iter()
        .map(|w| {
            parse_weight(w)
                .filter(|v| (0.0..=1.0).contains(v))
                .ok_or_else(|| {
                    invalid("strategy", key, format!("weight {w} must be within [0, 1]"))
                })
        })
        .collect::<Result<Vec<f64>, RatioTraderError>>()?;

    if parsed.is_empty() {
        return Err(invalid("strategy", key, "no weights given"));
    }
    if parsed.iter().sum::<f64>() > 1.0 + 1e-9 {
        return Err(invalid("strategy", key, "weights must not sum above 1"));
    }
    Ok(Some(parsed))
}

/// Horizon preset from `[strategy] horizon` (default `long`), with optional
/// `near_window` / `far_window` overrides in days.
pub fn window_pair(config: &dyn ConfigPort) -> Result<WindowPair, RatioTraderError> {
    let horizon: Horizon = config
        .get_string("strategy", "horizon")
        .as_deref()
        .unwrap_or("long")
        .parse()?;
    let preset = horizon.windows();

    let near_days = window_override(config, "near_window", preset.near_days)?;
    let far_days = window_override(config, "far_window", preset.far_days)?;
    if near_days >= far_days {
        return Err(invalid(
            "strategy",
            "near_window",
            "near_window must be shorter than far_window",
        ));
    }
    Ok(WindowPair {
        near_days,
        far_days,
    })
}

fn window_override(
    config: &dyn ConfigPort,
    key: &str,
    default: i64,
) -> Result<i64, RatioTraderError> {
    match config.get_string("strategy", key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<i64>()
            .ok()
            .filter(|days| *days > 0)
            .ok_or_else(|| {
                invalid(
                    "strategy",
                    key,
                    format!("{key} must be a positive number of days"),
                )
            }),
    }
}
