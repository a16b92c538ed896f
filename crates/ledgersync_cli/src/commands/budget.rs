//! Budget command implementation.

use super::CommandResult;
use ledgersync_engine::LocalCache;

/// Runs the budget command: sets the budget when `amount` is given, shows it
/// otherwise.
pub fn run(cache: &mut LocalCache, amount: Option<f64>) -> CommandResult {
    if let Some(amount) = amount {
        cache.set_monthly_budget(amount)?;
    }
    match cache.budget() {
        Some(budget) => println!(
            "Monthly budget: {:.2} (daily goal {:.2})",
            budget.monthly_budget,
            budget.daily_goal()
        ),
        None => println!("No monthly budget set"),
    }
    Ok(())
}
