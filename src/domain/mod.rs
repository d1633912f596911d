//! Core domain types and logic.

pub mod config_validation;
pub mod error;
pub mod metrics;
pub mod portfolio;
pub mod price_table;
pub mod ratio;
pub mod returns;
pub mod signal;
pub mod simulation;
pub mod stock;
pub mod strategy;
pub mod transaction;
