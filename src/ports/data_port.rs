//! Price data access port trait.

use crate::domain::error::RatioTraderError;
use crate::domain::price_table::PriceTable;
use chrono::NaiveDate;

pub trait PriceDataPort {
    /// Adjusted closes for `tickers` on every index date in `[start, end]`.
    /// An empty `tickers` slice selects every available column.
    fn load_prices(
        &self,
        tickers: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceTable, RatioTraderError>;

    fn list_tickers(&self) -> Result<Vec<String>, RatioTraderError>;
}
