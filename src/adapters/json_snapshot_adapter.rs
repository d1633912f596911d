//! JSON portfolio snapshots, one `{name}.json` file per portfolio.
//!
//! Registered as a [`LedgerHook`], the store rewrites the snapshot after
//! every ledger mutation (autosave).

use crate::domain::error::RatioTraderError;
use crate::domain::portfolio::{Portfolio, PortfolioSnapshot};
use crate::domain::transaction::Transaction;
use crate::ports::persistence_port::{LedgerHook, SnapshotPort};
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::debug;

#[derive(Debug)]
pub struct JsonSnapshotAdapter {
    directory: PathBuf,
}

impl JsonSnapshotAdapter {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn snapshot_path(&self, name: &str) -> PathBuf {
        self.directory.join(format!("{name}.json"))
    }
}

impl SnapshotPort for JsonSnapshotAdapter {
    fn save(&self, snapshot: &PortfolioSnapshot) -> Result<(), RatioTraderError> {
        fs::create_dir_all(&self.directory)?;
        let json = serde_json::to_string_pretty(snapshot).map_err(|e| {
            RatioTraderError::Snapshot {
                reason: format!("failed to encode {}: {}", snapshot.name, e),
            }
        })?;

        // replaced atomically: readers see the old or the new snapshot
        let path = self.snapshot_path(&snapshot.name);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &path)?;
        debug!(path = %path.display(), transactions = snapshot.history.len(), "snapshot saved");
        Ok(())
    }

    fn load(&self, name: &str) -> Result<Option<PortfolioSnapshot>, RatioTraderError> {
        let path = self.snapshot_path(name);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let snapshot = serde_json::from_str(&content).map_err(|e| RatioTraderError::Snapshot {
            reason: format!("failed to decode {}: {}", path.display(), e),
        })?;
        Ok(Some(snapshot))
    }
}

impl LedgerHook for JsonSnapshotAdapter {
    fn after_commit(
        &mut self,
        portfolio: &Portfolio,
        _transaction: &Transaction,
    ) -> Result<(), RatioTraderError> {
        self.save(&portfolio.snapshot())
    }
}
