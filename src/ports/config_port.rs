//! Configuration access port.
//!
//! Adapters supply raw lookups. List and date decoding is shared by every
//! adapter through the provided methods.

use chrono::NaiveDate;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;
    fn get_double(&self, section: &str, key: &str, default: f64) -> f64;
    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool;

    /// Comma-separated values, trimmed, empties dropped.
    fn get_list(&self, section: &str, key: &str) -> Option<Vec<String>> {
        self.get_string(section, key).map(|raw| split_list(&raw))
    }

    /// A `YYYY-MM-DD` value. `Some(Err(raw))` when present but malformed.
    fn get_date(&self, section: &str, key: &str) -> Option<Result<NaiveDate, String>> {
        self.get_string(section, key).map(|raw| {
            let raw = raw.trim();
            NaiveDate::parse_from_str(raw, DATE_FORMAT).map_err(|_| raw.to_string())
        })
    }
}

pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
