//! Add command implementation.

use super::{parse_day, CommandResult};
use chrono::{Local, NaiveDate};
use ledgersync_engine::LocalCache;
use ledgersync_protocol::{Expense, Frequency, Recurrence};

/// Fields of a new expense as given on the command line.
#[derive(Debug, Clone)]
pub struct NewEntry {
    /// Description.
    pub name: String,
    /// Amount.
    pub cost: f64,
    /// Category label.
    pub category: String,
    /// Date; today when absent.
    pub date: Option<String>,
    /// Recurrence interval.
    pub repeat: Option<Frequency>,
    /// Last recurrence date.
    pub until: Option<String>,
}

/// Runs the add command. Returns the new expense's index.
pub fn run(cache: &mut LocalCache, entry: NewEntry) -> CommandResult<usize> {
    let date = match entry.date.as_deref() {
        Some(raw) => parse_day(raw)?,
        None => today(),
    };
    let mut expense = Expense::new(cache.user_id(), entry.name, entry.cost, entry.category, date);

    match (entry.repeat, entry.until) {
        (Some(frequency), until) => {
            let end_date = until.as_deref().map(parse_day).transpose()?;
            expense = expense.with_recurrence(Recurrence {
                frequency,
                end_date,
            });
        }
        (None, Some(_)) => return Err("--until requires --repeat".into()),
        (None, None) => {}
    }

    let index = cache.add_expense(expense)?;
    let added = &cache.expenses()[index];
    println!(
        "Added #{index}: {} {:.2} ({}) on {}",
        added.name, added.cost, added.category, added.date
    );
    Ok(index)
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}
