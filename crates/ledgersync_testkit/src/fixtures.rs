//! Fixed records and scratch locations for scenario tests.

use chrono::NaiveDate;
use ledgersync_protocol::{Expense, ExpenseId, UserId};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Owner used by single-user scenarios.
pub const TEST_USER: UserId = UserId::new(1);

/// Second owner, for cross-user isolation checks.
pub const OTHER_USER: UserId = UserId::new(2);

/// Row as returned by a relational backend: string decimal, timestamp date,
/// `expense_name` column.
pub const RELATIONAL_ROW_JSON: &str = r#"{
    "id": 7,
    "user_id": 1,
    "expense_name": "Groceries",
    "cost": "42.10",
    "category": "Food",
    "date": "2024-02-14T00:00:00.000Z"
}"#;

/// Returns a calendar date, panicking on an impossible one.
pub fn day(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("Invalid fixture date")
}

/// An unsynced expense owned by [`TEST_USER`].
pub fn expense(name: &str, cost: f64) -> Expense {
    Expense::new(TEST_USER, name, cost, "General", day(2024, 1, 15))
}

/// An expense that already carries remote id `id`.
pub fn synced(id: u64, name: &str, cost: f64) -> Expense {
    expense(name, cost).with_id(ExpenseId::new(id))
}

/// `count` distinct unsynced expenses.
pub fn ledger(count: usize) -> Vec<Expense> {
    (0..count)
        .map(|i| expense(&format!("Expense {i}"), 1.0 + i as f64))
        .collect()
}

/// A temporary directory holding a cache file path.
///
/// The directory is removed when the value is dropped.
pub struct TempCache {
    _dir: TempDir,
    path: PathBuf,
}

impl TempCache {
    /// Creates a fresh directory; the cache file itself does not exist yet.
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let path = dir.path().join("ledger.json");
        Self { _dir: dir, path }
    }

    /// Path of the cache file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for TempCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ledger_is_distinct_and_valid() {
        let rows = ledger(5);
        assert_eq!(rows.len(), 5);
        assert!(rows.iter().all(|e| e.validate().is_ok() && e.id.is_none()));
        assert_ne!(rows[0].name, rows[1].name);
    }

    #[test]
    fn relational_row_decodes() {
        let row: Expense = serde_json::from_str(RELATIONAL_ROW_JSON).unwrap();
        assert_eq!(row.id, Some(ExpenseId::new(7)));
        assert_eq!(row.name, "Groceries");
        assert_eq!(row.cost, 42.1);
        assert_eq!(row.date, day(2024, 2, 14));
    }

    #[test]
    fn temp_cache_starts_empty() {
        let cache = TempCache::new();
        assert!(!cache.path().exists());
        assert!(cache.path().parent().unwrap().exists());
    }
}
