//! Remote store gateway abstraction.

use crate::error::{SyncError, SyncResult};
use ledgersync_protocol::{Expense, ExpenseId, UserId};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// CRUD surface of the remote authoritative store.
///
/// Every method is one request/response pair. Implementations must not retry
/// internally; retry policy belongs to the session controller.
pub trait RemoteStore: Send + Sync {
    /// Fetches every expense owned by `user_id`.
    fn fetch_expenses(&self, user_id: UserId) -> SyncResult<Vec<Expense>>;

    /// Inserts a batch of id-less expenses, all or nothing.
    ///
    /// Returns the stored rows with their assigned ids, in input order.
    fn insert_expenses(&self, user_id: UserId, expenses: &[Expense]) -> SyncResult<Vec<Expense>>;

    /// Overwrites the row `id` with the content of `expense`.
    ///
    /// Fails with [`SyncError::NotFound`] if the row does not exist.
    fn update_expense(&self, id: ExpenseId, expense: &Expense) -> SyncResult<()>;

    /// Deletes the row `id`. Deleting a missing row succeeds.
    fn delete_expense(&self, id: ExpenseId) -> SyncResult<()>;

    /// Inserts or overwrites the budget singleton of `user_id`.
    fn upsert_budget(&self, user_id: UserId, monthly_budget: f64) -> SyncResult<()>;

    /// Fetches the budget of `user_id`, if one was ever stored.
    fn fetch_budget(&self, user_id: UserId) -> SyncResult<Option<f64>>;
}

impl<R: RemoteStore + ?Sized> RemoteStore for Arc<R> {
    fn fetch_expenses(&self, user_id: UserId) -> SyncResult<Vec<Expense>> {
        (**self).fetch_expenses(user_id)
    }

    fn insert_expenses(&self, user_id: UserId, expenses: &[Expense]) -> SyncResult<Vec<Expense>> {
        (**self).insert_expenses(user_id, expenses)
    }

    fn update_expense(&self, id: ExpenseId, expense: &Expense) -> SyncResult<()> {
        (**self).update_expense(id, expense)
    }

    fn delete_expense(&self, id: ExpenseId) -> SyncResult<()> {
        (**self).delete_expense(id)
    }

    fn upsert_budget(&self, user_id: UserId, monthly_budget: f64) -> SyncResult<()> {
        (**self).upsert_budget(user_id, monthly_budget)
    }

    fn fetch_budget(&self, user_id: UserId) -> SyncResult<Option<f64>> {
        (**self).fetch_budget(user_id)
    }
}

/// Gateway operation, used to target injected faults and to read the call log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOp {
    /// `fetch_expenses`.
    FetchExpenses,
    /// `insert_expenses`.
    InsertExpenses,
    /// `update_expense`.
    UpdateExpense,
    /// `delete_expense`.
    DeleteExpense,
    /// `upsert_budget`.
    UpsertBudget,
    /// `fetch_budget`.
    FetchBudget,
}

/// One recorded gateway call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockCall {
    /// Operation invoked.
    pub op: MockOp,
    /// Target row for update/delete.
    pub target: Option<ExpenseId>,
    /// Number of records carried by an insert.
    pub records: usize,
}

#[derive(Debug, Clone)]
struct Fault {
    op: MockOp,
    target: Option<ExpenseId>,
    /// `None` fails forever.
    remaining: Option<u32>,
}

#[derive(Debug, Default)]
struct MockTables {
    rows: BTreeMap<ExpenseId, Expense>,
    budgets: HashMap<UserId, f64>,
    next_id: u64,
}

/// An in-memory remote store for testing.
///
/// Behaves like the reference server (atomic batch insert, idempotent
/// delete) and can be told to fail specific calls with a retryable
/// transport error.
#[derive(Debug)]
pub struct MockRemoteStore {
    tables: Mutex<MockTables>,
    faults: Mutex<Vec<Fault>>,
    calls: Mutex<Vec<MockCall>>,
}

impl MockRemoteStore {
    /// Creates an empty mock store.
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(MockTables {
                next_id: 1,
                ..MockTables::default()
            }),
            faults: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Stores a row directly, assigning an id if it has none.
    pub fn seed(&self, expense: Expense) -> Expense {
        let mut tables = self.tables.lock();
        let id = match expense.id {
            Some(id) => {
                tables.next_id = tables.next_id.max(id.get() + 1);
                id
            }
            None => {
                let id = ExpenseId::new(tables.next_id);
                tables.next_id += 1;
                id
            }
        };
        let stored = expense.with_id(id);
        tables.rows.insert(id, stored.clone());
        stored
    }

    /// Stores a budget directly.
    pub fn seed_budget(&self, user_id: UserId, monthly_budget: f64) {
        self.tables.lock().budgets.insert(user_id, monthly_budget);
    }

    /// Returns the stored rows of `user_id` in id order.
    pub fn rows(&self, user_id: UserId) -> Vec<Expense> {
        self.tables
            .lock()
            .rows
            .values()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect()
    }

    /// Returns a stored row.
    pub fn row(&self, id: ExpenseId) -> Option<Expense> {
        self.tables.lock().rows.get(&id).cloned()
    }

    /// Returns the stored budget of `user_id`.
    pub fn budget(&self, user_id: UserId) -> Option<f64> {
        self.tables.lock().budgets.get(&user_id).copied()
    }

    /// Fails the next call of `op` once.
    pub fn fail_next(&self, op: MockOp) {
        self.faults.lock().push(Fault {
            op,
            target: None,
            remaining: Some(1),
        });
    }

    /// Fails every call of `op` until faults are cleared.
    pub fn fail_always(&self, op: MockOp) {
        self.faults.lock().push(Fault {
            op,
            target: None,
            remaining: None,
        });
    }

    /// Fails every update/delete targeting `id` until faults are cleared.
    pub fn fail_target(&self, op: MockOp, id: ExpenseId) {
        self.faults.lock().push(Fault {
            op,
            target: Some(id),
            remaining: None,
        });
    }

    /// Removes all injected faults.
    pub fn clear_faults(&self) {
        self.faults.lock().clear();
    }

    /// Returns every call made so far.
    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().clone()
    }

    /// Returns how many times `op` was called.
    pub fn call_count(&self, op: MockOp) -> usize {
        self.calls.lock().iter().filter(|c| c.op == op).count()
    }

    /// Forgets the call log.
    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    fn record(&self, op: MockOp, target: Option<ExpenseId>, records: usize) -> SyncResult<()> {
        self.calls.lock().push(MockCall {
            op,
            target,
            records,
        });

        let mut faults = self.faults.lock();
        let hit = faults.iter().position(|f| {
            f.op == op && (f.target.is_none() || f.target == target) && f.remaining != Some(0)
        });
        if let Some(index) = hit {
            if let Some(remaining) = faults[index].remaining.as_mut() {
                *remaining -= 1;
            }
            faults.retain(|f| f.remaining != Some(0));
            return Err(SyncError::transport_retryable(format!(
                "injected failure for {op:?}"
            )));
        }
        Ok(())
    }
}

impl Default for MockRemoteStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RemoteStore for MockRemoteStore {
    fn fetch_expenses(&self, user_id: UserId) -> SyncResult<Vec<Expense>> {
        self.record(MockOp::FetchExpenses, None, 0)?;
        Ok(self.rows(user_id))
    }

    fn insert_expenses(&self, user_id: UserId, expenses: &[Expense]) -> SyncResult<Vec<Expense>> {
        self.record(MockOp::InsertExpenses, None, expenses.len())?;
        for expense in expenses {
            expense.validate()?;
        }

        let mut tables = self.tables.lock();
        let mut stored = Vec::with_capacity(expenses.len());
        for expense in expenses {
            let id = ExpenseId::new(tables.next_id);
            tables.next_id += 1;
            let row = expense.to_new().into_expense(id, user_id);
            tables.rows.insert(id, row.clone());
            stored.push(row);
        }
        Ok(stored)
    }

    fn update_expense(&self, id: ExpenseId, expense: &Expense) -> SyncResult<()> {
        self.record(MockOp::UpdateExpense, Some(id), 1)?;
        let mut tables = self.tables.lock();
        match tables.rows.get_mut(&id) {
            Some(row) => {
                *row = expense.to_new().into_expense(id, expense.user_id);
                Ok(())
            }
            None => Err(SyncError::NotFound(id)),
        }
    }

    fn delete_expense(&self, id: ExpenseId) -> SyncResult<()> {
        self.record(MockOp::DeleteExpense, Some(id), 1)?;
        self.tables.lock().rows.remove(&id);
        Ok(())
    }

    fn upsert_budget(&self, user_id: UserId, monthly_budget: f64) -> SyncResult<()> {
        self.record(MockOp::UpsertBudget, None, 1)?;
        self.tables.lock().budgets.insert(user_id, monthly_budget);
        Ok(())
    }

    fn fetch_budget(&self, user_id: UserId) -> SyncResult<Option<f64>> {
        self.record(MockOp::FetchBudget, None, 0)?;
        Ok(self.budget(user_id))
    }
}
