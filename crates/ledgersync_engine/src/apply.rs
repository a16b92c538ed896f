//! Ordered application of a sync plan against the remote store.
//!
//! Phases run strictly in order: one batch insert, then each update, then
//! each delete, then the budget upsert. A failing call stops the attempt;
//! later calls are not issued and nothing already applied is rolled back.

use crate::diff::SyncPlan;
use crate::error::{SyncError, SyncResult};
use crate::gateway::RemoteStore;
use ledgersync_protocol::{Expense, ExpenseId, UserId};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

/// One step of the apply order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncPhase {
    /// Fetching the remote snapshot.
    Fetch,
    /// Batch insert of new records.
    Insert,
    /// Per-record updates.
    Update,
    /// Per-record deletes.
    Delete,
    /// Budget upsert.
    Budget,
}

impl SyncPhase {
    /// Returns the lowercase phase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncPhase::Fetch => "fetch",
            SyncPhase::Insert => "insert",
            SyncPhase::Update => "update",
            SyncPhase::Delete => "delete",
            SyncPhase::Budget => "budget",
        }
    }
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where and why a sync attempt stopped.
#[derive(Debug)]
pub struct PhaseFailure {
    /// Phase whose call failed.
    pub phase: SyncPhase,
    /// Error returned by the failing call.
    pub cause: SyncError,
    /// Earlier phases that issued calls and completed.
    pub completed_phases: Vec<SyncPhase>,
    /// Rows stored by a completed insert phase.
    pub inserted: Vec<Expense>,
    /// Records of the failed phase whose call succeeded.
    pub succeeded: Vec<ExpenseId>,
    /// Record whose call failed, for per-record phases.
    pub failed: Option<ExpenseId>,
    /// Records of the failed phase that were never sent.
    pub not_attempted: Vec<ExpenseId>,
}

impl PhaseFailure {
    /// Creates a failure with no per-record detail.
    pub fn new(phase: SyncPhase, cause: SyncError) -> Self {
        Self {
            phase,
            cause,
            completed_phases: Vec::new(),
            inserted: Vec::new(),
            succeeded: Vec::new(),
            failed: None,
            not_attempted: Vec::new(),
        }
    }

    /// Returns true if remote effects were applied before the failure.
    pub fn is_partial(&self) -> bool {
        !self.completed_phases.is_empty() || !self.succeeded.is_empty()
    }

    /// Returns false if re-running the attempt could duplicate records.
    ///
    /// That is the case once an insert batch was sent: the cache still holds
    /// those records without ids, so a new attempt would insert them again.
    pub fn is_retry_safe(&self) -> bool {
        self.phase != SyncPhase::Insert && !self.completed_phases.contains(&SyncPhase::Insert)
    }

    /// Ids of the failed phase still left to do.
    pub fn unresolved(&self) -> Vec<ExpenseId> {
        self.failed
            .into_iter()
            .chain(self.not_attempted.iter().copied())
            .collect()
    }
}

/// Remote effects of a completed apply.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplyReport {
    /// Stored rows echoed by the insert, in plan order.
    pub inserted: Vec<Expense>,
    /// Updated ids.
    pub updated: Vec<ExpenseId>,
    /// Ids confirmed deleted (including ones that were already gone).
    pub deleted: Vec<ExpenseId>,
    /// Budget amount written, if the budget phase ran.
    pub budget: Option<f64>,
}

/// Runs a [`SyncPlan`] against a [`RemoteStore`].
pub struct ApplyEngine<'a, R: RemoteStore + ?Sized> {
    store: &'a R,
    user_id: UserId,
    cancelled: &'a AtomicBool,
}

impl<'a, R: RemoteStore + ?Sized> ApplyEngine<'a, R> {
    /// Creates an apply engine for one attempt.
    pub fn new(store: &'a R, user_id: UserId, cancelled: &'a AtomicBool) -> Self {
        Self {
            store,
            user_id,
            cancelled,
        }
    }

    /// Applies `plan`, then upserts `budget` if given.
    ///
    /// Every call completes before the next one starts. Cancellation is
    /// checked before each call.
    pub fn apply(&self, plan: &SyncPlan, budget: Option<f64>) -> Result<ApplyReport, PhaseFailure> {
        let mut report = ApplyReport::default();
        let mut completed = Vec::new();

        if !plan.to_insert.is_empty() {
            report.inserted = self
                .insert(&plan.to_insert)
                .map_err(|cause| PhaseFailure::new(SyncPhase::Insert, cause))?;
            completed.push(SyncPhase::Insert);
        }

        if !plan.to_update.is_empty() {
            let updates: Vec<(ExpenseId, &Expense)> = plan
                .to_update
                .iter()
                .filter_map(|e| e.id.map(|id| (id, e)))
                .collect();
            let ids: Vec<ExpenseId> = updates.iter().map(|(id, _)| *id).collect();
            let outcome = self.per_record(&ids, |index, id| {
                self.store.update_expense(id, updates[index].1)
            });
            report.updated =
                self.phase_result(SyncPhase::Update, outcome, &ids, &completed, &report)?;
            completed.push(SyncPhase::Update);
        }

        if !plan.to_delete.is_empty() {
            let ids = &plan.to_delete;
            let outcome = self.per_record(ids, |_, id| self.store.delete_expense(id));
            report.deleted =
                self.phase_result(SyncPhase::Delete, outcome, ids, &completed, &report)?;
            completed.push(SyncPhase::Delete);
        }

        if let Some(amount) = budget {
            self.check_cancelled()
                .and_then(|()| self.store.upsert_budget(self.user_id, amount))
                .map_err(|cause| {
                    warn!(user_id = %self.user_id, error = %cause, "budget upsert failed");
                    let mut failure = PhaseFailure::new(SyncPhase::Budget, cause);
                    failure.completed_phases = completed.clone();
                    failure.inserted = report.inserted.clone();
                    failure
                })?;
            debug!(user_id = %self.user_id, amount, "budget upserted");
            report.budget = Some(amount);
        }

        Ok(report)
    }

    fn check_cancelled(&self) -> SyncResult<()> {
        if self.cancelled.load(Ordering::SeqCst) {
            Err(SyncError::Cancelled)
        } else {
            Ok(())
        }
    }

    fn insert(&self, records: &[Expense]) -> SyncResult<Vec<Expense>> {
        self.check_cancelled()?;
        let stored = self.store.insert_expenses(self.user_id, records)?;
        if stored.len() != records.len() {
            return Err(SyncError::Protocol(format!(
                "insert echoed {} rows for {} records",
                stored.len(),
                records.len()
            )));
        }
        if stored.iter().any(|row| row.id.is_none()) {
            return Err(SyncError::Protocol("insert echoed a row without an id".into()));
        }
        debug!(user_id = %self.user_id, count = stored.len(), "inserted expenses");
        Ok(stored)
    }

    /// Issues one call per id, stopping at the first error.
    ///
    /// Returns how many calls succeeded and the error that stopped the run.
    fn per_record<F>(&self, ids: &[ExpenseId], mut call: F) -> (usize, Option<SyncError>)
    where
        F: FnMut(usize, ExpenseId) -> SyncResult<()>,
    {
        for (index, &id) in ids.iter().enumerate() {
            if let Err(e) = self.check_cancelled().and_then(|()| call(index, id)) {
                return (index, Some(e));
            }
        }
        (ids.len(), None)
    }

    fn phase_result(
        &self,
        phase: SyncPhase,
        (done, error): (usize, Option<SyncError>),
        ids: &[ExpenseId],
        completed: &[SyncPhase],
        report: &ApplyReport,
    ) -> Result<Vec<ExpenseId>, PhaseFailure> {
        match error {
            None => {
                debug!(user_id = %self.user_id, %phase, count = done, "phase complete");
                Ok(ids.to_vec())
            }
            Some(cause) => {
                warn!(
                    user_id = %self.user_id,
                    %phase,
                    id = %ids[done],
                    error = %cause,
                    "phase failed"
                );
                Err(PhaseFailure {
                    phase,
                    cause,
                    completed_phases: completed.to_vec(),
                    inserted: report.inserted.clone(),
                    succeeded: ids[..done].to_vec(),
                    failed: Some(ids[done]),
                    not_attempted: ids[done + 1..].to_vec(),
                })
            }
        }
    }
}
