//! Sync command implementation.

use super::CommandResult;
use ledgersync_engine::{LocalCache, RemoteStore, SyncEngine, SyncError, SyncOutcome, SyncPhase};
use tracing::info;

/// Runs one sync, with retries unless `retry` is false.
///
/// The caller saves the cache; it is only modified when the sync succeeds.
pub fn run<R: RemoteStore>(
    engine: &SyncEngine<R>,
    cache: &mut LocalCache,
    retry: bool,
) -> CommandResult<SyncOutcome> {
    info!("Syncing ledger of user {} (retry: {})", cache.user_id(), retry);
    let result = if retry {
        engine.sync_with_retry(cache)
    } else {
        engine.sync(cache)
    };

    match result {
        Ok(outcome) => {
            print_outcome(&outcome);
            Ok(outcome)
        }
        Err(e) => {
            print_failure(&e);
            Err(e.into())
        }
    }
}

fn print_outcome(outcome: &SyncOutcome) {
    let report = outcome.report();
    match outcome {
        SyncOutcome::NothingToSync(_) => println!("Already in sync"),
        SyncOutcome::Reconciled(_) => println!(
            "Synced: {} inserted, {} updated, {} deleted{}",
            report.inserted,
            report.updated,
            report.deleted,
            if report.budget_synced { ", budget upserted" } else { "" }
        ),
    }
    if report.attempts > 1 {
        println!("  after {} attempts", report.attempts);
    }
    for rejected in &report.rejected {
        println!(
            "  skipped {:?}: {} (kept locally)",
            rejected.expense.name, rejected.reason
        );
    }
    if let Some(reason) = &report.budget_rejected {
        println!("  budget not sent: {reason}");
    }
}

fn print_failure(error: &SyncError) {
    let Some(failure) = error.phase_failure() else {
        eprintln!("Sync failed: {error}");
        return;
    };
    eprintln!("Sync failed in the {} phase: {}", failure.phase, failure.cause);
    if failure.is_partial() {
        let done: Vec<&str> = failure.completed_phases.iter().map(|p| p.as_str()).collect();
        eprintln!(
            "  partially applied: phases [{}] done, {} records of this phase done",
            done.join(", "),
            failure.succeeded.len()
        );
    }
    let unresolved = failure.unresolved();
    if !unresolved.is_empty() {
        let ids: Vec<String> = unresolved.iter().map(ToString::to_string).collect();
        eprintln!("  unresolved: {}", ids.join(", "));
    }
    if failure.phase == SyncPhase::Insert {
        eprintln!("  the batch may have been stored; pull before syncing again");
    } else if !failure.inserted.is_empty() {
        let ids: Vec<String> = failure
            .inserted
            .iter()
            .filter_map(|e| e.id)
            .map(|id| id.to_string())
            .collect();
        eprintln!(
            "  {} new records were stored as [{}]; pull before syncing again",
            ids.len(),
            ids.join(", ")
        );
    }
    eprintln!("Local ledger left unchanged");
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledgersync_engine::{MockOp, MockRemoteStore, RetryConfig, SyncConfig};
    use ledgersync_testkit::{expense, TEST_USER};
    use std::sync::Arc;
    use std::time::Duration;

    fn engine(store: Arc<MockRemoteStore>) -> SyncEngine<Arc<MockRemoteStore>> {
        let retry = RetryConfig::new(2)
            .with_initial_delay(Duration::from_millis(1))
            .with_jitter(false);
        SyncEngine::new(SyncConfig::new(TEST_USER, "mock://").with_retry(retry), store)
    }

    #[test]
    fn sync_pushes_local_records() {
        let store = Arc::new(MockRemoteStore::new());
        let mut cache = LocalCache::new(TEST_USER);
        cache.add_expense(expense("Coffee", 4.5)).unwrap();

        let outcome = run(&engine(store.clone()), &mut cache, true).unwrap();
        assert!(outcome.is_reconciled());
        assert_eq!(store.rows(TEST_USER).len(), 1);
        assert!(cache.expenses()[0].is_synced());
    }

    #[test]
    fn failed_sync_leaves_cache() {
        let store = Arc::new(MockRemoteStore::new());
        store.fail_always(MockOp::InsertExpenses);
        let mut cache = LocalCache::new(TEST_USER);
        cache.add_expense(expense("Coffee", 4.5)).unwrap();
        let before = cache.clone();

        assert!(run(&engine(store.clone()), &mut cache, true).is_err());
        assert_eq!(cache, before);
        assert_eq!(store.call_count(MockOp::InsertExpenses), 1);
    }

    #[test]
    fn budget_failure_after_insert_does_not_duplicate_rows() {
        let store = Arc::new(MockRemoteStore::new());
        store.fail_next(MockOp::UpsertBudget);
        let mut cache = LocalCache::new(TEST_USER);
        cache.add_expense(expense("Coffee", 4.5)).unwrap();
        cache.set_monthly_budget(300.0).unwrap();

        assert!(run(&engine(store.clone()), &mut cache, true).is_err());
        assert_eq!(store.call_count(MockOp::InsertExpenses), 1);
        assert_eq!(store.rows(TEST_USER).len(), 1);
    }
}
