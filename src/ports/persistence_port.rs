//! Persistence port traits: portfolio snapshots and post-mutation hooks.

use crate::domain::error::RatioTraderError;
use crate::domain::portfolio::{Portfolio, PortfolioSnapshot};
use crate::domain::transaction::Transaction;

/// Called after every successful ledger mutation.
///
/// A failing hook is logged by the portfolio and otherwise ignored; the
/// mutation it observed stays committed.
pub trait LedgerHook {
    fn after_commit(
        &mut self,
        portfolio: &Portfolio,
        transaction: &Transaction,
    ) -> Result<(), RatioTraderError>;
}

impl<F> LedgerHook for F
where
    F: FnMut(&Portfolio, &Transaction) -> Result<(), RatioTraderError>,
{
    fn after_commit(
        &mut self,
        portfolio: &Portfolio,
        transaction: &Transaction,
    ) -> Result<(), RatioTraderError> {
        self(portfolio, transaction)
    }
}

/// Store for named portfolio snapshots.
pub trait SnapshotPort {
    fn save(&self, snapshot: &PortfolioSnapshot) -> Result<(), RatioTraderError>;

    fn load(&self, name: &str) -> Result<Option<PortfolioSnapshot>, RatioTraderError>;
}
