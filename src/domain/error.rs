//! Domain error types.

use chrono::NaiveDate;

/// Top-level error type for ratiotrader.
#[derive(Debug, thiserror::Error)]
pub enum RatioTraderError {
    #[error("missing column {column}")]
    MissingColumn { column: String },

    #[error("no price for {ticker} on or before {date}")]
    MissingPrice { ticker: String, date: NaiveDate },

    #[error("invalid price table: {reason}")]
    InvalidPriceTable { reason: String },

    #[error("indeterminate signal for {ticker}: {reason}")]
    IndeterminateSignal { ticker: String, reason: String },

    #[error("insufficient buy power: need {required:.3}, have {available:.3}")]
    InsufficientBuyPower { required: f64, available: f64 },

    #[error("{ticker} is not held")]
    NotHeld { ticker: String },

    #[error("cannot sell {requested} shares of {ticker}: only {held} held")]
    Oversell {
        ticker: String,
        requested: f64,
        held: f64,
    },

    #[error("invalid {field} for {operation}: {value}")]
    InvalidAmount {
        operation: &'static str,
        field: &'static str,
        value: f64,
    },

    #[error("invalid allocation for {ticker}: fraction {fraction} outside [0, 1]")]
    InvalidAllocation { ticker: String, fraction: f64 },

    #[error("no trading days between {start} and {end}")]
    NoTradingDays { start: NaiveDate, end: NaiveDate },

    #[error("rate solver did not converge after {iterations} iterations")]
    NoConvergence { iterations: usize },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("data error: {reason}")]
    Data { reason: String },

    #[error("snapshot error: {reason}")]
    Snapshot { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&RatioTraderError> for std::process::ExitCode {
    fn from(err: &RatioTraderError) -> Self {
        let code: u8 = match err {
            RatioTraderError::Io(_) => 1,
            RatioTraderError::ConfigParse { .. }
            | RatioTraderError::ConfigMissing { .. }
            | RatioTraderError::ConfigInvalid { .. } => 2,
            RatioTraderError::Data { .. }
            | RatioTraderError::Snapshot { .. }
            | RatioTraderError::MissingColumn { .. }
            | RatioTraderError::MissingPrice { .. }
            | RatioTraderError::InvalidPriceTable { .. }
            | RatioTraderError::NoTradingDays { .. } => 3,
            RatioTraderError::IndeterminateSignal { .. }
            | RatioTraderError::NoConvergence { .. } => 4,
            RatioTraderError::InsufficientBuyPower { .. }
            | RatioTraderError::NotHeld { .. }
            | RatioTraderError::Oversell { .. }
            | RatioTraderError::InvalidAmount { .. }
            | RatioTraderError::InvalidAllocation { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_context() {
        let err = RatioTraderError::Oversell {
            ticker: "AAPL".into(),
            requested: 12.0,
            held: 10.0,
        };
        assert_eq!(
            err.to_string(),
            "cannot sell 12 shares of AAPL: only 10 held"
        );

        let err = RatioTraderError::ConfigMissing {
            section: "simulation".into(),
            key: "start_date".into(),
        };
        assert_eq!(err.to_string(), "missing config key [simulation] start_date");
    }

    #[test]
    fn buy_power_amounts_are_rounded_in_message() {
        let err = RatioTraderError::InsufficientBuyPower {
            required: 100.12345,
            available: 99.5,
        };
        assert_eq!(
            err.to_string(),
            "insufficient buy power: need 100.123, have 99.500"
        );
    }

    #[test]
    fn io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: RatioTraderError = io.into();
        assert!(matches!(err, RatioTraderError::Io(_)));
    }
}
