//! Remove command implementation.

use super::{check_index, CommandResult};
use ledgersync_engine::LocalCache;

/// Runs the remove command.
pub fn run(cache: &mut LocalCache, index: usize) -> CommandResult {
    check_index(cache, index)?;
    let removed = cache.remove_expense(index)?;
    match removed.id {
        Some(id) => println!("Removed #{index} ({}); remote row {id} is deleted on next sync", removed.name),
        None => println!("Removed #{index} ({})", removed.name),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledgersync_testkit::{expense, synced, TEST_USER};

    #[test]
    fn synced_rows_leave_a_tombstone() {
        let mut cache: LocalCache = serde_json::from_value(serde_json::json!({
            "user_id": TEST_USER,
            "expenses": [synced(9, "Taxi", 20.0), expense("Snack", 2.0)],
        }))
        .unwrap();

        run(&mut cache, 1).unwrap();
        assert!(cache.tombstones().is_empty());

        run(&mut cache, 0).unwrap();
        assert_eq!(cache.tombstones().len(), 1);
        assert!(cache.expenses().is_empty());

        assert!(run(&mut cache, 0).is_err());
    }
}
