//! List command implementation.

use super::CommandResult;
use ledgersync_engine::LocalCache;
use std::collections::BTreeMap;

/// Spending totals of a ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    /// Sum of every cached expense.
    pub total: f64,
    /// Sum per category, alphabetical.
    pub by_category: BTreeMap<String, f64>,
    /// Monthly budget, if set.
    pub budget: Option<f64>,
    /// Records never synced.
    pub unsynced: usize,
    /// Deletes waiting for the next sync.
    pub pending_deletes: usize,
}

impl Summary {
    /// Computes the summary of `cache`.
    pub fn of(cache: &LocalCache) -> Self {
        let mut by_category = BTreeMap::new();
        for expense in cache.expenses() {
            *by_category.entry(expense.category.clone()).or_insert(0.0) += expense.cost;
        }
        Self {
            total: cache.expenses().iter().map(|e| e.cost).sum(),
            by_category,
            budget: cache.monthly_budget(),
            unsynced: cache.expenses().iter().filter(|e| !e.is_synced()).count(),
            pending_deletes: cache.tombstones().len(),
        }
    }

    /// Budget left after the cached spending.
    pub fn remaining(&self) -> Option<f64> {
        self.budget.map(|budget| budget - self.total)
    }
}

/// Runs the list command.
pub fn run(cache: &LocalCache, format: &str) -> CommandResult {
    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(cache)?);
            Ok(())
        }
        "text" => {
            print_text(cache);
            Ok(())
        }
        other => Err(format!("unknown format {other:?} (expected text or json)").into()),
    }
}

fn print_text(cache: &LocalCache) {
    println!("Ledger of user {}", cache.user_id());
    println!();
    println!(
        "{:>4}  {:>8}  {:<10}  {:<14}  {:>10}  Name",
        "#", "Id", "Date", "Category", "Cost"
    );
    for (index, expense) in cache.expenses().iter().enumerate() {
        let id = expense
            .id
            .map_or_else(|| "new".to_string(), |id| id.to_string());
        let repeat = expense
            .recurrence
            .as_ref()
            .map(|r| format!(" [{}]", r.frequency))
            .unwrap_or_default();
        println!(
            "{:>4}  {:>8}  {:<10}  {:<14}  {:>10.2}  {}{}",
            index, id, expense.date, expense.category, expense.cost, expense.name, repeat
        );
    }

    let summary = Summary::of(cache);
    println!();
    for (category, amount) in &summary.by_category {
        println!("  {category:<14} {amount:>10.2}");
    }
    println!("Total spent:     {:>10.2}", summary.total);
    if let Some(budget) = cache.budget() {
        println!("Monthly budget:  {:>10.2}", budget.monthly_budget);
        println!("Daily goal:      {:>10.2}", budget.daily_goal());
        if let Some(remaining) = summary.remaining() {
            println!("Remaining:       {remaining:>10.2}");
        }
    }
    if summary.unsynced > 0 || summary.pending_deletes > 0 {
        println!();
        println!(
            "{} unsynced, {} pending deletes",
            summary.unsynced, summary.pending_deletes
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledgersync_testkit::{expense, synced, TEST_USER};

    #[test]
    fn summary_totals() {
        let mut cache: LocalCache = serde_json::from_value(serde_json::json!({
            "user_id": TEST_USER,
            "expenses": [synced(1, "Rent", 900.0), synced(2, "Old", 5.0)],
            "monthly_budget": 1500.0,
        }))
        .unwrap();
        cache.remove_expense(1).unwrap();
        let mut food = expense("Bread", 3.5);
        food.category = "Food".into();
        cache.add_expense(food).unwrap();

        let summary = Summary::of(&cache);
        assert_eq!(summary.total, 903.5);
        assert_eq!(summary.by_category.get("Food"), Some(&3.5));
        assert_eq!(summary.remaining(), Some(596.5));
        assert_eq!(summary.unsynced, 1);
        assert_eq!(summary.pending_deletes, 1);
    }

    #[test]
    fn unknown_format_is_an_error() {
        let cache = LocalCache::new(TEST_USER);
        assert!(run(&cache, "text").is_ok());
        assert!(run(&cache, "json").is_ok());
        assert!(run(&cache, "csv").is_err());
    }
}
