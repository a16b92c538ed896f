//! Classification of local records against the remote snapshot.

use crate::cache::Tombstones;
use ledgersync_protocol::{Expense, ExpenseId, ValidationError};
use std::collections::HashMap;

/// Remote rows indexed by id.
pub type RemoteIndex = HashMap<ExpenseId, Expense>;

/// Indexes fetched remote rows by id.
pub fn index_remote(rows: &[Expense]) -> RemoteIndex {
    rows.iter()
        .filter_map(|row| row.id.map(|id| (id, row.clone())))
        .collect()
}

/// A local record left out of the attempt because it failed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedRecord {
    /// The record, unchanged.
    pub expense: Expense,
    /// Why it was rejected.
    pub reason: ValidationError,
}

/// Work to send to the remote store in one sync attempt.
///
/// The three sets are disjoint: an id appears in at most one of them, and a
/// record without an id can only be an insert.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncPlan {
    /// Records the remote store has never seen.
    pub to_insert: Vec<Expense>,
    /// Records whose id exists remotely.
    pub to_update: Vec<Expense>,
    /// Tombstoned ids, ascending.
    pub to_delete: Vec<ExpenseId>,
}

impl SyncPlan {
    /// Diffs the local collection against the remote one.
    ///
    /// Deletion wins: a tombstoned id is never inserted or updated, even if
    /// a local copy with that id is still present. With `skip_unchanged`,
    /// updates whose persisted fields already match the remote row are
    /// dropped.
    pub fn compute(
        remote: &RemoteIndex,
        local: &[Expense],
        tombstones: &Tombstones,
        skip_unchanged: bool,
    ) -> Self {
        let mut plan = SyncPlan {
            to_delete: tombstones.iter().collect(),
            ..SyncPlan::default()
        };

        for record in local {
            match record.id {
                None => plan.to_insert.push(record.clone()),
                Some(id) if tombstones.contains(id) => {}
                Some(id) => match remote.get(&id) {
                    Some(row) if skip_unchanged && row.same_content(record) => {}
                    Some(_) => plan.to_update.push(record.clone()),
                    None => plan.to_insert.push(record.clone()),
                },
            }
        }

        plan
    }

    /// Moves records that fail validation out of the insert and update sets.
    ///
    /// The rest of the plan still runs; the rejected records stay in the
    /// local cache as they are.
    pub fn take_invalid(&mut self) -> Vec<RejectedRecord> {
        let mut rejected = Vec::new();
        for set in [&mut self.to_insert, &mut self.to_update] {
            set.retain(|record| match record.validate() {
                Ok(()) => true,
                Err(reason) => {
                    rejected.push(RejectedRecord {
                        expense: record.clone(),
                        reason,
                    });
                    false
                }
            });
        }
        rejected
    }

    /// Returns true if the plan issues no expense call.
    pub fn is_empty(&self) -> bool {
        self.to_insert.is_empty() && self.to_update.is_empty() && self.to_delete.is_empty()
    }

    /// Total number of planned operations.
    pub fn len(&self) -> usize {
        self.to_insert.len() + self.to_update.len() + self.to_delete.len()
    }
}
