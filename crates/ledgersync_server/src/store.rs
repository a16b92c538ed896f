//! In-memory expense and budget tables.

use crate::error::{ServerError, ServerResult};
use ledgersync_protocol::{Expense, ExpenseId, NewExpense, UserId};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug)]
struct Tables {
    expenses: BTreeMap<ExpenseId, Expense>,
    budgets: HashMap<UserId, f64>,
    next_id: u64,
}

/// Authoritative store behind the server routes.
///
/// Row ids come from a single auto-increment sequence and are never reused.
#[derive(Debug)]
pub struct LedgerStore {
    tables: RwLock<Tables>,
}

impl LedgerStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables {
                expenses: BTreeMap::new(),
                budgets: HashMap::new(),
                next_id: 1,
            }),
        }
    }

    /// Returns every row owned by `user_id`, in id order.
    pub fn expenses_for(&self, user_id: UserId) -> Vec<Expense> {
        self.tables
            .read()
            .expenses
            .values()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect()
    }

    /// Returns one row.
    pub fn expense(&self, id: ExpenseId) -> Option<Expense> {
        self.tables.read().expenses.get(&id).cloned()
    }

    /// Total number of rows across all users.
    pub fn len(&self) -> usize {
        self.tables.read().expenses.len()
    }

    /// Returns true if no row is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Inserts a batch for `user_id`, all or nothing.
    ///
    /// Every record is validated before the first row is written. Returns
    /// the stored rows in input order.
    pub fn insert_batch(&self, user_id: UserId, batch: Vec<NewExpense>) -> ServerResult<Vec<Expense>> {
        for record in &batch {
            record.validate()?;
        }

        let mut tables = self.tables.write();
        let mut stored = Vec::with_capacity(batch.len());
        for record in batch {
            let id = ExpenseId::new(tables.next_id);
            tables.next_id += 1;
            let row = record.into_expense(id, user_id);
            tables.expenses.insert(id, row.clone());
            stored.push(row);
        }
        Ok(stored)
    }

    /// Overwrites row `id`.
    ///
    /// A row owned by another user is reported as missing.
    pub fn update(&self, id: ExpenseId, user_id: UserId, record: NewExpense) -> ServerResult<()> {
        record.validate()?;
        let mut tables = self.tables.write();
        match tables.expenses.get_mut(&id) {
            Some(row) if row.user_id == user_id => {
                *row = record.into_expense(id, user_id);
                Ok(())
            }
            _ => Err(ServerError::NotFound(format!("expense {id}"))),
        }
    }

    /// Deletes row `id`.
    pub fn delete(&self, id: ExpenseId) -> ServerResult<Expense> {
        self.tables
            .write()
            .expenses
            .remove(&id)
            .ok_or_else(|| ServerError::NotFound(format!("expense {id}")))
    }

    /// Inserts or overwrites the budget of `user_id`.
    pub fn upsert_budget(&self, user_id: UserId, monthly_budget: f64) {
        self.tables.write().budgets.insert(user_id, monthly_budget);
    }

    /// Returns the budget of `user_id`.
    pub fn budget(&self, user_id: UserId) -> Option<f64> {
        self.tables.read().budgets.get(&user_id).copied()
    }
}

impl Default for LedgerStore {
    fn default() -> Self {
        Self::new()
    }
}
