//! Concrete adapter implementations for ports.

pub mod csv_adapter;
pub mod file_config_adapter;
pub mod json_snapshot_adapter;
pub mod transaction_log_adapter;
