//! Copy-on-write snapshot history for trade edits.

use crate::domain::error::CommandError;
use crate::domain::store::TradeStore;
use crate::domain::trade::{TradeAmendment, TradeId};

/// Stack of store snapshots; the loaded store is always at the bottom.
#[derive(Debug, Clone)]
pub struct SnapshotHistory {
    snapshots: Vec<TradeStore>,
}

impl SnapshotHistory {
    pub fn new(initial: TradeStore) -> Self {
        Self {
            snapshots: vec![initial],
        }
    }

    pub fn current(&self) -> &TradeStore {
        // The loaded snapshot is never popped.
        &self.snapshots[self.snapshots.len() - 1]
    }

    pub fn original(&self) -> &TradeStore {
        &self.snapshots[0]
    }

    /// Number of edits currently applied on top of the loaded store.
    pub fn revision(&self) -> usize {
        self.snapshots.len() - 1
    }

    pub fn amend(&mut self, id: TradeId, amendment: &TradeAmendment) -> Result<(), CommandError> {
        let next = self.current().amend(id, amendment)?;
        self.snapshots.push(next);
        Ok(())
    }

    pub fn undo(&mut self) -> Result<(), CommandError> {
        if self.snapshots.len() == 1 {
            return Err(CommandError::NothingToUndo);
        }
        self.snapshots.pop();
        Ok(())
    }
}
