//! Sync session controller.
//!
//! Drives one attempt per call: fetch the remote snapshot, diff it against
//! the local cache, apply the plan, then rebuild the cache from what the
//! remote store confirmed. The cache is written only when an attempt ends
//! reconciled.

use crate::apply::{ApplyEngine, ApplyReport, PhaseFailure, SyncPhase};
use crate::cache::LocalCache;
use crate::config::SyncConfig;
use crate::diff::{index_remote, RejectedRecord, SyncPlan};
use crate::error::{SyncError, SyncResult};
use crate::gateway::RemoteStore;
use ledgersync_protocol::{Budget, Expense, ExpenseId, UserId, ValidationError};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Where a user's sync session currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// No attempt running.
    Idle,
    /// Reading the remote snapshot.
    Fetching,
    /// Computing the sync plan.
    Diffing,
    /// Sending the plan to the remote store.
    Applying,
    /// Last attempt ended with the cache reconciled.
    Reconciled,
    /// Last attempt failed; the cache was left unchanged.
    Failed,
}

impl SyncState {
    /// Returns true while an attempt is running.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            SyncState::Fetching | SyncState::Diffing | SyncState::Applying
        )
    }

    /// Returns true for the two end states of an attempt.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SyncState::Reconciled | SyncState::Failed)
    }
}

/// Per-user statistics.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Attempts started.
    pub attempts: u64,
    /// Attempts that ended reconciled.
    pub reconciled: u64,
    /// Attempts that failed.
    pub failed: u64,
    /// Requests turned away because an attempt was already running.
    pub rejected_concurrent: u64,
    /// Retries scheduled by [`SyncEngine::sync_with_retry`].
    pub retries: u64,
    /// Records inserted remotely.
    pub records_inserted: u64,
    /// Records updated remotely.
    pub records_updated: u64,
    /// Records deleted remotely.
    pub records_deleted: u64,
    /// Last time an attempt ended reconciled.
    pub last_sync_time: Option<Instant>,
    /// Last error message.
    pub last_error: Option<String>,
}

/// Summary of a reconciled attempt.
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    /// Records inserted remotely.
    pub inserted: usize,
    /// Records updated remotely.
    pub updated: usize,
    /// Records deleted remotely.
    pub deleted: usize,
    /// Whether the budget was upserted.
    pub budget_synced: bool,
    /// Local records skipped because they failed validation.
    pub rejected: Vec<RejectedRecord>,
    /// Why the local budget was not sent, if it was invalid.
    pub budget_rejected: Option<ValidationError>,
    /// Attempts made, including retries.
    pub attempts: u32,
    /// Wall time of the final attempt.
    pub duration: Duration,
}

/// Result of a sync that did not fail.
#[derive(Debug, Clone)]
pub enum SyncOutcome {
    /// Local changes were pushed and the cache rebuilt from the remote state.
    Reconciled(SyncReport),
    /// No remote call was needed; the cache was refreshed from the snapshot.
    NothingToSync(SyncReport),
}

impl SyncOutcome {
    /// Returns the report.
    pub fn report(&self) -> &SyncReport {
        match self {
            SyncOutcome::Reconciled(report) | SyncOutcome::NothingToSync(report) => report,
        }
    }

    /// Returns true if local changes were pushed.
    pub fn is_reconciled(&self) -> bool {
        matches!(self, SyncOutcome::Reconciled(_))
    }

    fn report_mut(&mut self) -> &mut SyncReport {
        match self {
            SyncOutcome::Reconciled(report) | SyncOutcome::NothingToSync(report) => report,
        }
    }
}

#[derive(Debug)]
struct Session {
    state: SyncState,
    last_terminal: Option<SyncState>,
    transitions: Vec<SyncState>,
    stats: SyncStats,
    busy: bool,
    cancelled: Arc<AtomicBool>,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            state: SyncState::Idle,
            last_terminal: None,
            transitions: Vec::new(),
            stats: SyncStats::default(),
            busy: false,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }
}

type Sessions = Mutex<HashMap<UserId, Session>>;

/// Marks a user's session as busy. Dropping it returns the session to idle.
///
/// The guard spans every attempt of one request, retries included, and owns
/// that request's cancel flag.
struct InFlight<'a> {
    sessions: &'a Sessions,
    user_id: UserId,
    cancelled: Arc<AtomicBool>,
}

impl<'a> InFlight<'a> {
    fn begin(sessions: &'a Sessions, user_id: UserId) -> SyncResult<Self> {
        let mut map = sessions.lock();
        let session = map.entry(user_id).or_default();
        if session.busy {
            session.stats.rejected_concurrent += 1;
            return Err(SyncError::SyncInProgress(user_id));
        }
        // Only a request that owns the session may clear its cancel flag.
        session.busy = true;
        session.cancelled.store(false, Ordering::SeqCst);
        session.state = SyncState::Fetching;
        session.transitions = vec![SyncState::Idle, SyncState::Fetching];
        session.stats.attempts += 1;
        Ok(Self {
            sessions,
            user_id,
            cancelled: Arc::clone(&session.cancelled),
        })
    }

    /// Starts the next attempt of the same request.
    fn restart(&self) {
        let mut map = self.sessions.lock();
        let session = map.entry(self.user_id).or_default();
        session.state = SyncState::Fetching;
        session.transitions = vec![SyncState::Idle, SyncState::Fetching];
        session.stats.attempts += 1;
    }

    fn check_cancelled(&self) -> SyncResult<()> {
        if self.cancelled.load(Ordering::SeqCst) {
            Err(SyncError::Cancelled)
        } else {
            Ok(())
        }
    }

    fn enter(&self, state: SyncState) {
        let mut map = self.sessions.lock();
        let session = map.entry(self.user_id).or_default();
        session.state = state;
        session.transitions.push(state);
    }

    fn with_stats(&self, f: impl FnOnce(&mut SyncStats)) {
        let mut map = self.sessions.lock();
        f(&mut map.entry(self.user_id).or_default().stats);
    }

    fn finish(&self, terminal: SyncState) {
        self.enter(terminal);
        let mut map = self.sessions.lock();
        map.entry(self.user_id).or_default().last_terminal = Some(terminal);
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut map = self.sessions.lock();
        let session = map.entry(self.user_id).or_default();
        session.busy = false;
        session.state = SyncState::Idle;
        session.transitions.push(SyncState::Idle);
    }
}

/// Snapshot of the remote store taken at the start of an attempt.
struct RemoteSnapshot {
    rows: Vec<Expense>,
    budget: Option<f64>,
}

/// Reconciles local caches against a remote store.
///
/// One engine can serve several users; each user has its own session, its
/// own cancel flag and at most one request in flight.
pub struct SyncEngine<R: RemoteStore> {
    config: SyncConfig,
    store: R,
    sessions: Sessions,
}

impl<R: RemoteStore> SyncEngine<R> {
    /// Creates a new sync engine.
    pub fn new(config: SyncConfig, store: R) -> Self {
        Self {
            config,
            store,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Returns the remote store.
    pub fn store(&self) -> &R {
        &self.store
    }

    /// Current state of `user_id`'s session.
    pub fn state(&self, user_id: UserId) -> SyncState {
        self.sessions
            .lock()
            .get(&user_id)
            .map_or(SyncState::Idle, |s| s.state)
    }

    /// End state of the most recent attempt for `user_id`.
    pub fn last_terminal(&self, user_id: UserId) -> Option<SyncState> {
        self.sessions.lock().get(&user_id).and_then(|s| s.last_terminal)
    }

    /// States visited by the most recent attempt for `user_id`.
    pub fn transitions(&self, user_id: UserId) -> Vec<SyncState> {
        self.sessions
            .lock()
            .get(&user_id)
            .map(|s| s.transitions.clone())
            .unwrap_or_default()
    }

    /// Statistics for `user_id`.
    pub fn stats(&self, user_id: UserId) -> SyncStats {
        self.sessions
            .lock()
            .get(&user_id)
            .map(|s| s.stats.clone())
            .unwrap_or_default()
    }

    /// Cancels the request running for `user_id` before its next remote
    /// call, including any pending retry.
    ///
    /// Returns false if no request was running. Other users are not affected.
    pub fn cancel(&self, user_id: UserId) -> bool {
        let map = self.sessions.lock();
        match map.get(&user_id) {
            Some(session) if session.busy => {
                session.cancelled.store(true, Ordering::SeqCst);
                true
            }
            _ => false,
        }
    }

    /// Runs one sync attempt for the cache's owner.
    ///
    /// On error the cache is untouched. Fails with
    /// [`SyncError::SyncInProgress`] if an attempt for the same user is
    /// already running.
    pub fn sync(&self, cache: &mut LocalCache) -> SyncResult<SyncOutcome> {
        let guard = InFlight::begin(&self.sessions, cache.user_id())?;
        self.run_attempt(&guard, cache)
    }

    /// Runs [`sync`](Self::sync), retrying failures that are transient and
    /// safe to repeat.
    ///
    /// An attempt that sent an insert batch is never retried: the batch may
    /// have been stored, and the cache does not hold the assigned ids yet.
    /// The session stays busy between attempts.
    pub fn sync_with_retry(&self, cache: &mut LocalCache) -> SyncResult<SyncOutcome> {
        let user_id = cache.user_id();
        let guard = InFlight::begin(&self.sessions, user_id)?;
        let retry = &self.config.retry;
        let mut attempt = 0;

        loop {
            match self.run_attempt(&guard, cache) {
                Ok(mut outcome) => {
                    outcome.report_mut().attempts = attempt + 1;
                    return Ok(outcome);
                }
                Err(e) if e.is_retryable() && retry.allows_another(attempt + 1) => {
                    attempt += 1;
                    let delay = retry.delay_for_attempt(attempt);
                    warn!(
                        %user_id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "sync attempt failed, retrying"
                    );
                    guard.with_stats(|stats| stats.retries += 1);
                    std::thread::sleep(delay);
                    guard.check_cancelled()?;
                    guard.restart();
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Replaces the cache with the remote state.
    ///
    /// Refuses when the cache holds unsynced records or pending deletes,
    /// unless `force` is set.
    pub fn pull(&self, cache: &mut LocalCache, force: bool) -> SyncResult<usize> {
        let user_id = cache.user_id();
        if !force && cache.has_unsynced_changes() {
            return Err(SyncError::UnsyncedChanges(format!(
                "{} pending deletes, {} unsynced records",
                cache.tombstones().len(),
                cache.expenses().iter().filter(|e| !e.is_synced()).count()
            )));
        }

        let guard = InFlight::begin(&self.sessions, user_id)?;
        match self.fetch(&guard, user_id) {
            Ok(snapshot) => {
                let count = snapshot.rows.len();
                let budget = snapshot.budget.or(cache.monthly_budget());
                cache.replace_with_remote(snapshot.rows, budget);
                info!(%user_id, count, "pulled remote ledger");
                guard.finish(SyncState::Reconciled);
                Ok(count)
            }
            Err(e) => {
                guard.with_stats(|stats| {
                    stats.failed += 1;
                    stats.last_error = Some(e.to_string());
                });
                guard.finish(SyncState::Failed);
                Err(e)
            }
        }
    }

    fn run_attempt(&self, guard: &InFlight<'_>, cache: &mut LocalCache) -> SyncResult<SyncOutcome> {
        let user_id = cache.user_id();
        let start = Instant::now();
        debug!(%user_id, "sync attempt started");

        match self.attempt(guard, cache, start) {
            Ok(outcome) => {
                let report = outcome.report();
                info!(
                    %user_id,
                    inserted = report.inserted,
                    updated = report.updated,
                    deleted = report.deleted,
                    rejected = report.rejected.len(),
                    budget_synced = report.budget_synced,
                    "sync reconciled"
                );
                guard.with_stats(|stats| {
                    stats.reconciled += 1;
                    stats.records_inserted += report.inserted as u64;
                    stats.records_updated += report.updated as u64;
                    stats.records_deleted += report.deleted as u64;
                    stats.last_sync_time = Some(Instant::now());
                    stats.last_error = None;
                });
                guard.finish(SyncState::Reconciled);
                Ok(outcome)
            }
            Err(e) => {
                warn!(
                    %user_id,
                    phase = e.phase().map(|p| p.as_str()),
                    retry_safe = e.is_retry_safe(),
                    error = %e,
                    "sync failed"
                );
                guard.with_stats(|stats| {
                    stats.failed += 1;
                    stats.last_error = Some(e.to_string());
                });
                guard.finish(SyncState::Failed);
                Err(e)
            }
        }
    }

    fn fetch(&self, guard: &InFlight<'_>, user_id: UserId) -> SyncResult<RemoteSnapshot> {
        let fetch_failed = |cause: SyncError| SyncError::from(PhaseFailure::new(SyncPhase::Fetch, cause));
        guard.check_cancelled()?;
        let rows = self.store.fetch_expenses(user_id).map_err(fetch_failed)?;
        guard.check_cancelled()?;
        let budget = self.store.fetch_budget(user_id).map_err(fetch_failed)?;
        Ok(RemoteSnapshot { rows, budget })
    }

    fn attempt(
        &self,
        guard: &InFlight<'_>,
        cache: &mut LocalCache,
        start: Instant,
    ) -> SyncResult<SyncOutcome> {
        let user_id = cache.user_id();
        let snapshot = self.fetch(guard, user_id)?;
        guard.check_cancelled()?;

        guard.enter(SyncState::Diffing);
        let remote = index_remote(&snapshot.rows);
        let mut plan = SyncPlan::compute(
            &remote,
            cache.expenses(),
            cache.tombstones(),
            self.config.skip_unchanged,
        );
        let rejected = plan.take_invalid();
        for record in &rejected {
            warn!(%user_id, name = %record.expense.name, reason = %record.reason, "skipping invalid record");
        }

        let (budget_to_send, budget_rejected) = match cache.monthly_budget() {
            Some(amount) => match Budget::validate_amount(amount) {
                Ok(()) => (Some(amount), None),
                Err(reason) => {
                    warn!(%user_id, %reason, "skipping invalid budget");
                    (None, Some(reason))
                }
            },
            None => (None, None),
        };
        let budget_current = budget_to_send.map_or(true, |amount| snapshot.budget == Some(amount));
        debug!(
            %user_id,
            inserts = plan.to_insert.len(),
            updates = plan.to_update.len(),
            deletes = plan.to_delete.len(),
            "sync plan computed"
        );

        let nothing_to_sync = plan.is_empty() && budget_current;
        let applied = if nothing_to_sync {
            ApplyReport::default()
        } else {
            guard.enter(SyncState::Applying);
            ApplyEngine::new(&self.store, user_id, &guard.cancelled).apply(&plan, budget_to_send)?
        };

        let expenses = rebuild_cache(cache.expenses(), snapshot.rows, &plan, &applied, &rejected);
        let budget = applied
            .budget
            .or(cache.monthly_budget())
            .or(snapshot.budget);
        cache.apply_reconciled(expenses, budget, &applied.deleted);

        let report = SyncReport {
            inserted: applied.inserted.len(),
            updated: applied.updated.len(),
            deleted: applied.deleted.len(),
            budget_synced: applied.budget.is_some(),
            rejected,
            budget_rejected,
            attempts: 1,
            duration: start.elapsed(),
        };
        Ok(if nothing_to_sync {
            SyncOutcome::NothingToSync(report)
        } else {
            SyncOutcome::Reconciled(report)
        })
    }
}

/// Builds the post-sync expense list.
///
/// Remote rows come first in remote order, minus confirmed deletes. A row
/// the user edited keeps the local version, rows that were only fetched keep
/// the local recurrence hint. The insert echoes follow, then any rejected
/// records the remote store has not seen.
fn rebuild_cache(
    local: &[Expense],
    remote_rows: Vec<Expense>,
    plan: &SyncPlan,
    applied: &ApplyReport,
    rejected: &[RejectedRecord],
) -> Vec<Expense> {
    let deleted: HashSet<ExpenseId> = applied.deleted.iter().copied().collect();
    let updated: HashSet<ExpenseId> = applied.updated.iter().copied().collect();
    let local_by_id: HashMap<ExpenseId, &Expense> = local
        .iter()
        .filter_map(|e| e.id.map(|id| (id, e)))
        .collect();
    let rejected_ids: HashSet<ExpenseId> = rejected.iter().filter_map(|r| r.expense.id).collect();
    let remote_ids: HashSet<ExpenseId> = remote_rows.iter().filter_map(|e| e.id).collect();

    let mut expenses = Vec::with_capacity(remote_rows.len() + applied.inserted.len());
    for mut row in remote_rows {
        let Some(id) = row.id else { continue };
        if deleted.contains(&id) {
            continue;
        }
        match local_by_id.get(&id) {
            Some(mine) if updated.contains(&id) || rejected_ids.contains(&id) => {
                expenses.push((*mine).clone());
            }
            Some(mine) => {
                if row.recurrence.is_none() {
                    row.recurrence = mine.recurrence.clone();
                }
                expenses.push(row);
            }
            None => expenses.push(row),
        }
    }

    for (sent, mut stored) in plan.to_insert.iter().zip(applied.inserted.iter().cloned()) {
        if stored.recurrence.is_none() {
            stored.recurrence = sent.recurrence.clone();
        }
        expenses.push(stored);
    }

    expenses.extend(
        rejected
            .iter()
            .filter(|r| r.expense.id.map_or(true, |id| !remote_ids.contains(&id)))
            .map(|r| r.expense.clone()),
    );
    expenses
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryConfig;
    use crate::gateway::{MockOp, MockRemoteStore};
    use chrono::NaiveDate;
    use ledgersync_protocol::{Frequency, Recurrence};
    use std::sync::Barrier;

    const USER: UserId = UserId::new(1);
    const OTHER: UserId = UserId::new(2);

    fn expense(name: &str, cost: f64) -> Expense {
        let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        Expense::new(USER, name, cost, "Misc", date)
    }

    fn engine(store: Arc<MockRemoteStore>) -> SyncEngine<Arc<MockRemoteStore>> {
        let config = SyncConfig::new(USER, "mock://").with_retry(
            RetryConfig::new(3)
                .with_initial_delay(Duration::from_millis(1))
                .with_jitter(false),
        );
        SyncEngine::new(config, store)
    }

    #[test]
    fn state_machine_visits_every_state() {
        let store = Arc::new(MockRemoteStore::new());
        let engine = engine(store);
        let mut cache = LocalCache::new(USER);
        cache.add_expense(expense("Coffee", 4.5)).unwrap();

        assert_eq!(engine.state(USER), SyncState::Idle);
        let outcome = engine.sync(&mut cache).unwrap();
        assert!(outcome.is_reconciled());
        assert_eq!(
            engine.transitions(USER),
            vec![
                SyncState::Idle,
                SyncState::Fetching,
                SyncState::Diffing,
                SyncState::Applying,
                SyncState::Reconciled,
                SyncState::Idle
            ]
        );
        assert_eq!(engine.state(USER), SyncState::Idle);
        assert_eq!(engine.last_terminal(USER), Some(SyncState::Reconciled));
    }

    #[test]
    fn empty_cache_has_nothing_to_sync() {
        let store = Arc::new(MockRemoteStore::new());
        let engine = engine(store.clone());
        let mut cache = LocalCache::new(USER);

        let outcome = engine.sync(&mut cache).unwrap();
        assert!(matches!(outcome, SyncOutcome::NothingToSync(_)));
        assert_eq!(store.call_count(MockOp::FetchExpenses), 1);
        assert_eq!(store.call_count(MockOp::InsertExpenses), 0);
        assert_eq!(store.call_count(MockOp::UpsertBudget), 0);
    }

    #[test]
    fn nothing_to_sync_still_adopts_remote_rows() {
        let store = Arc::new(MockRemoteStore::new());
        store.seed(expense("From elsewhere", 8.0));
        store.seed_budget(USER, 400.0);
        let engine = engine(store);
        let mut cache = LocalCache::new(USER);

        let outcome = engine.sync(&mut cache).unwrap();
        assert!(!outcome.is_reconciled());
        assert_eq!(cache.expenses().len(), 1);
        assert_eq!(cache.monthly_budget(), Some(400.0));
    }

    #[test]
    fn fetch_failure_leaves_cache_untouched() {
        let store = Arc::new(MockRemoteStore::new());
        store.fail_next(MockOp::FetchExpenses);
        let engine = engine(store);
        let mut cache = LocalCache::new(USER);
        cache.add_expense(expense("Coffee", 4.5)).unwrap();
        let before = cache.clone();

        let err = engine.sync(&mut cache).unwrap_err();
        assert_eq!(err.phase(), Some(SyncPhase::Fetch));
        assert!(err.is_retryable());
        assert_eq!(cache, before);
        assert_eq!(engine.last_terminal(USER), Some(SyncState::Failed));
        assert_eq!(engine.stats(USER).failed, 1);
    }

    #[test]
    fn retry_recovers_from_transient_update_failure() {
        let store = Arc::new(MockRemoteStore::new());
        let row = store.seed(expense("Rent", 900.0));
        store.fail_next(MockOp::UpdateExpense);
        let engine = engine(store.clone());

        let mut cache = LocalCache::new(USER);
        cache.replace_with_remote(vec![row.clone()], None);
        cache.edit_expense(0, expense("Rent", 950.0)).unwrap();

        let outcome = engine.sync_with_retry(&mut cache).unwrap();
        assert_eq!(outcome.report().attempts, 2);
        assert_eq!(store.row(row.id.unwrap()).unwrap().cost, 950.0);
        assert_eq!(engine.stats(USER).retries, 1);
    }

    #[test]
    fn insert_failure_is_not_retried() {
        let store = Arc::new(MockRemoteStore::new());
        store.fail_next(MockOp::InsertExpenses);
        let engine = engine(store.clone());
        let mut cache = LocalCache::new(USER);
        cache.add_expense(expense("Coffee", 4.5)).unwrap();

        let err = engine.sync_with_retry(&mut cache).unwrap_err();
        assert_eq!(err.phase(), Some(SyncPhase::Insert));
        assert!(!err.is_retry_safe());
        assert_eq!(store.call_count(MockOp::InsertExpenses), 1);
        assert_eq!(engine.stats(USER).retries, 0);
    }

    #[test]
    fn invalid_budget_is_skipped_and_reported() {
        let store = Arc::new(MockRemoteStore::new());
        store.seed_budget(USER, 250.0);
        let engine = engine(store.clone());

        let mut cache: LocalCache = serde_json::from_str(
            r#"{"user_id": 1, "expenses": [], "monthly_budget": -3.0, "tombstones": []}"#,
        )
        .unwrap();
        let outcome = engine.sync(&mut cache).unwrap();

        assert!(matches!(
            outcome.report().budget_rejected,
            Some(ValidationError::InvalidBudget(_))
        ));
        assert_eq!(store.budget(USER), Some(250.0));
        assert_eq!(store.call_count(MockOp::UpsertBudget), 0);
    }

    #[test]
    fn recurrence_hint_survives_the_round_trip() {
        let store = Arc::new(MockRemoteStore::new());
        let engine = engine(store);
        let weekly = Recurrence {
            frequency: Frequency::Weekly,
            end_date: None,
        };
        let mut cache = LocalCache::new(USER);
        cache
            .add_expense(expense("Gym", 12.0).with_recurrence(weekly.clone()))
            .unwrap();

        engine.sync(&mut cache).unwrap();
        assert!(cache.expenses()[0].is_synced());
        assert_eq!(cache.expenses()[0].recurrence, Some(weekly));
    }

    #[test]
    fn pull_refuses_to_drop_local_work() {
        let store = Arc::new(MockRemoteStore::new());
        store.seed(expense("Remote", 1.0));
        let engine = engine(store);
        let mut cache = LocalCache::new(USER);
        cache.add_expense(expense("Local", 2.0)).unwrap();

        assert!(matches!(
            engine.pull(&mut cache, false),
            Err(SyncError::UnsyncedChanges(_))
        ));
        assert_eq!(cache.expenses()[0].name, "Local");

        assert_eq!(engine.pull(&mut cache, true).unwrap(), 1);
        assert_eq!(cache.expenses()[0].name, "Remote");
        assert!(!cache.has_unsynced_changes());
    }

    #[test]
    fn failure_after_committed_insert_is_not_retried() {
        let store = Arc::new(MockRemoteStore::new());
        let rent = store.seed(expense("Rent", 900.0));
        store.fail_next(MockOp::UpdateExpense);
        let engine = engine(store.clone());

        let mut cache = LocalCache::new(USER);
        cache.replace_with_remote(vec![rent.clone()], None);
        cache.edit_expense(0, expense("Rent", 950.0)).unwrap();
        cache.add_expense(expense("Coffee", 4.5)).unwrap();
        let before = cache.clone();

        let err = engine.sync_with_retry(&mut cache).unwrap_err();
        assert_eq!(err.phase(), Some(SyncPhase::Update));
        assert!(!err.is_retry_safe());
        assert!(!err.is_retryable());
        assert_eq!(store.call_count(MockOp::InsertExpenses), 1);
        assert_eq!(engine.stats(USER).retries, 0);
        assert_eq!(cache, before);

        let coffees = store
            .rows(USER)
            .iter()
            .filter(|e| e.name == "Coffee")
            .count();
        assert_eq!(coffees, 1);
    }

    /// Holds the first `fetch_expenses` call until the test releases it.
    struct GatedStore {
        inner: MockRemoteStore,
        armed: AtomicBool,
        arrived: Barrier,
        release: Barrier,
    }

    impl GatedStore {
        fn new() -> Self {
            Self {
                inner: MockRemoteStore::new(),
                armed: AtomicBool::new(true),
                arrived: Barrier::new(2),
                release: Barrier::new(2),
            }
        }
    }

    impl RemoteStore for GatedStore {
        fn fetch_expenses(&self, user_id: UserId) -> SyncResult<Vec<Expense>> {
            if self.armed.swap(false, Ordering::SeqCst) {
                self.arrived.wait();
                self.release.wait();
            }
            self.inner.fetch_expenses(user_id)
        }

        fn insert_expenses(&self, user_id: UserId, expenses: &[Expense]) -> SyncResult<Vec<Expense>> {
            self.inner.insert_expenses(user_id, expenses)
        }

        fn update_expense(&self, id: ExpenseId, expense: &Expense) -> SyncResult<()> {
            self.inner.update_expense(id, expense)
        }

        fn delete_expense(&self, id: ExpenseId) -> SyncResult<()> {
            self.inner.delete_expense(id)
        }

        fn upsert_budget(&self, user_id: UserId, monthly_budget: f64) -> SyncResult<()> {
            self.inner.upsert_budget(user_id, monthly_budget)
        }

        fn fetch_budget(&self, user_id: UserId) -> SyncResult<Option<f64>> {
            self.inner.fetch_budget(user_id)
        }
    }

    #[test]
    fn cancel_survives_a_rejected_concurrent_request() {
        let engine = SyncEngine::new(SyncConfig::new(USER, "mock://"), GatedStore::new());
        assert!(!engine.cancel(USER));

        std::thread::scope(|scope| {
            let running = scope.spawn(|| {
                let mut cache = LocalCache::new(USER);
                cache.add_expense(expense("Coffee", 4.5)).unwrap();
                engine.sync(&mut cache)
            });

            engine.store().arrived.wait();
            assert!(engine.cancel(USER));

            let mut second = LocalCache::new(USER);
            assert!(matches!(
                engine.sync(&mut second),
                Err(SyncError::SyncInProgress(user)) if user == USER
            ));
            assert!(matches!(
                engine.pull(&mut second, true),
                Err(SyncError::SyncInProgress(_))
            ));

            // Another user's request is neither blocked nor cancelled.
            let mut other = LocalCache::new(OTHER);
            let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
            other
                .add_expense(Expense::new(OTHER, "Tea", 3.0, "Misc", date))
                .unwrap();
            assert!(engine.sync(&mut other).unwrap().is_reconciled());
            assert!(other.expenses()[0].is_synced());

            engine.store().release.wait();
            assert!(matches!(running.join().unwrap(), Err(SyncError::Cancelled)));
        });

        assert!(engine.store().inner.rows(USER).is_empty());
        assert_eq!(engine.store().inner.rows(OTHER).len(), 1);
        assert_eq!(engine.state(USER), SyncState::Idle);

        // A new request starts with a clear flag.
        let mut cache = LocalCache::new(USER);
        cache.add_expense(expense("Coffee", 4.5)).unwrap();
        assert!(engine.sync(&mut cache).is_ok());
    }

    #[test]
    fn cancel_during_backoff_stops_the_retry_loop() {
        let store = Arc::new(MockRemoteStore::new());
        store.fail_always(MockOp::FetchExpenses);
        let config = SyncConfig::new(USER, "mock://").with_retry(
            RetryConfig::new(5)
                .with_initial_delay(Duration::from_millis(200))
                .with_jitter(false),
        );
        let engine = SyncEngine::new(config, store);

        std::thread::scope(|scope| {
            let running = scope.spawn(|| engine.sync_with_retry(&mut LocalCache::new(USER)));

            while engine.stats(USER).failed == 0 {
                std::thread::sleep(Duration::from_millis(1));
            }
            // Still owned by the retrying request while it sleeps.
            assert!(matches!(
                engine.sync(&mut LocalCache::new(USER)),
                Err(SyncError::SyncInProgress(_))
            ));
            assert!(engine.cancel(USER));

            assert!(matches!(running.join().unwrap(), Err(SyncError::Cancelled)));
        });

        assert!(engine.stats(USER).attempts < 5);
        assert_eq!(engine.state(USER), SyncState::Idle);
    }

    #[test]
    fn retries_stop_at_max_attempts() {
        let store = Arc::new(MockRemoteStore::new());
        store.fail_always(MockOp::FetchExpenses);
        let engine = engine(store);
        let mut cache = LocalCache::new(USER);

        let err = engine.sync_with_retry(&mut cache).unwrap_err();
        assert_eq!(err.phase(), Some(SyncPhase::Fetch));
        assert_eq!(engine.stats(USER).attempts, 3);
    }
}
