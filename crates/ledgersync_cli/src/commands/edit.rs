//! Edit command implementation.

use super::{check_index, parse_day, CommandResult};
use ledgersync_engine::LocalCache;

/// Field overrides for an existing expense.
#[derive(Debug, Clone, Default)]
pub struct EntryChanges {
    /// New description.
    pub name: Option<String>,
    /// New amount.
    pub cost: Option<f64>,
    /// New category.
    pub category: Option<String>,
    /// New date.
    pub date: Option<String>,
}

impl EntryChanges {
    fn is_empty(&self) -> bool {
        self.name.is_none() && self.cost.is_none() && self.category.is_none() && self.date.is_none()
    }
}

/// Runs the edit command.
pub fn run(cache: &mut LocalCache, index: usize, changes: EntryChanges) -> CommandResult {
    check_index(cache, index)?;
    if changes.is_empty() {
        return Err("nothing to change; pass --name, --cost, --category or --date".into());
    }

    let mut updated = cache.expenses()[index].clone();
    if let Some(name) = changes.name {
        updated.name = name;
    }
    if let Some(cost) = changes.cost {
        updated.cost = cost;
    }
    if let Some(category) = changes.category {
        updated.category = category;
    }
    if let Some(raw) = changes.date.as_deref() {
        updated.date = parse_day(raw)?;
    }

    cache.edit_expense(index, updated)?;
    println!("Updated #{index}");
    Ok(())
}
