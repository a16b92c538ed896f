//! Local offline cache.
//!
//! The cache is a single-owner value. User edits go through the public
//! methods below; the reconciled state after a sync is written only by the
//! session controller through crate-private write points.

use crate::error::{SyncError, SyncResult};
use ledgersync_protocol::{Budget, Expense, ExpenseId, UserId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// Ids of synced records deleted locally whose remote delete is unconfirmed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tombstones(BTreeSet<ExpenseId>);

impl Tombstones {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if `id` awaits a remote delete.
    pub fn contains(&self, id: ExpenseId) -> bool {
        self.0.contains(&id)
    }

    /// Number of pending deletes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if no delete is pending.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates pending ids in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = ExpenseId> + '_ {
        self.0.iter().copied()
    }

    pub(crate) fn insert(&mut self, id: ExpenseId) -> bool {
        self.0.insert(id)
    }

    pub(crate) fn remove_confirmed(&mut self, confirmed: &[ExpenseId]) {
        for id in confirmed {
            self.0.remove(id);
        }
    }
}

impl FromIterator<ExpenseId> for Tombstones {
    fn from_iter<I: IntoIterator<Item = ExpenseId>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Offline copy of one user's ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalCache {
    user_id: UserId,
    #[serde(default)]
    expenses: Vec<Expense>,
    #[serde(default)]
    monthly_budget: Option<f64>,
    #[serde(default)]
    tombstones: Tombstones,
}

impl LocalCache {
    /// Creates an empty cache for `user_id`.
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            expenses: Vec::new(),
            monthly_budget: None,
            tombstones: Tombstones::new(),
        }
    }

    /// Owner of the cache.
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Cached expenses, in display order.
    pub fn expenses(&self) -> &[Expense] {
        &self.expenses
    }

    /// Cached monthly budget, if one was ever set or fetched.
    pub fn monthly_budget(&self) -> Option<f64> {
        self.monthly_budget
    }

    /// Cached budget as a record.
    pub fn budget(&self) -> Option<Budget> {
        self.monthly_budget.map(|amount| Budget::new(self.user_id, amount))
    }

    /// Pending remote deletes.
    pub fn tombstones(&self) -> &Tombstones {
        &self.tombstones
    }

    /// Returns true if the cache holds never-synced records or pending deletes.
    pub fn has_unsynced_changes(&self) -> bool {
        !self.tombstones.is_empty() || self.expenses.iter().any(|e| !e.is_synced())
    }

    /// Records a new expense. Returns its index.
    ///
    /// The record is owned by this cache's user and starts without an id.
    pub fn add_expense(&mut self, mut expense: Expense) -> SyncResult<usize> {
        expense.validate()?;
        expense.id = None;
        expense.user_id = self.user_id;
        self.expenses.push(expense);
        Ok(self.expenses.len() - 1)
    }

    /// Replaces the content of the expense at `index`, keeping its id.
    pub fn edit_expense(&mut self, index: usize, mut updated: Expense) -> SyncResult<()> {
        updated.validate()?;
        let slot = self
            .expenses
            .get_mut(index)
            .ok_or_else(|| SyncError::Cache(format!("no expense at index {index}")))?;
        updated.id = slot.id;
        updated.user_id = slot.user_id;
        *slot = updated;
        Ok(())
    }

    /// Removes the expense at `index`.
    ///
    /// A synced record leaves a tombstone so the next sync deletes it
    /// remotely. A never-synced record simply disappears.
    pub fn remove_expense(&mut self, index: usize) -> SyncResult<Expense> {
        if index >= self.expenses.len() {
            return Err(SyncError::Cache(format!("no expense at index {index}")));
        }
        let removed = self.expenses.remove(index);
        if let Some(id) = removed.id {
            self.tombstones.insert(id);
        }
        Ok(removed)
    }

    /// Sets the monthly budget.
    pub fn set_monthly_budget(&mut self, amount: f64) -> SyncResult<()> {
        Budget::validate_amount(amount)?;
        self.monthly_budget = Some(amount);
        Ok(())
    }

    /// Writes the reconciled state of a successful sync.
    pub(crate) fn apply_reconciled(
        &mut self,
        expenses: Vec<Expense>,
        monthly_budget: Option<f64>,
        confirmed_deletes: &[ExpenseId],
    ) {
        self.expenses = expenses;
        self.monthly_budget = monthly_budget;
        self.tombstones.remove_confirmed(confirmed_deletes);
    }

    /// Replaces the whole cache with the remote state.
    pub(crate) fn replace_with_remote(&mut self, expenses: Vec<Expense>, monthly_budget: Option<f64>) {
        self.expenses = expenses;
        self.monthly_budget = monthly_budget;
        self.tombstones = Tombstones::new();
    }

    /// Loads a cache file.
    pub fn load(path: impl AsRef<Path>) -> SyncResult<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| SyncError::Cache(format!("failed to open {}: {}", path.display(), e)))?;
        serde_json::from_reader(BufReader::new(file))
            .map_err(|e| SyncError::Cache(format!("failed to parse {}: {}", path.display(), e)))
    }

    /// Loads a cache file, or starts an empty cache for `user_id` if none exists.
    pub fn load_or_new(path: impl AsRef<Path>, user_id: UserId) -> SyncResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::new(user_id));
        }
        let cache = Self::load(path)?;
        if cache.user_id != user_id {
            return Err(SyncError::Cache(format!(
                "{} belongs to user {}, not {}",
                path.display(),
                cache.user_id,
                user_id
            )));
        }
        Ok(cache)
    }

    /// Writes the cache atomically (temp file, then rename).
    pub fn save(&self, path: impl AsRef<Path>) -> SyncResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                SyncError::Cache(format!("failed to create {}: {}", parent.display(), e))
            })?;
        }

        let temp_path = path.with_extension("json.tmp");
        let file = File::create(&temp_path).map_err(|e| {
            SyncError::Cache(format!("failed to create {}: {}", temp_path.display(), e))
        })?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)
            .map_err(|e| SyncError::Cache(format!("failed to serialize cache: {e}")))?;
        writer
            .flush()
            .map_err(|e| SyncError::Cache(format!("failed to flush {}: {}", temp_path.display(), e)))?;
        drop(writer);

        fs::rename(&temp_path, path).map_err(|e| {
            SyncError::Cache(format!("failed to replace {}: {}", path.display(), e))
        })
    }
}
