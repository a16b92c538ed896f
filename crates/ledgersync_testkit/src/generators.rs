//! Property-based test generators using proptest.
//!
//! Generated records always satisfy the protocol's validation rules unless
//! the strategy name says otherwise.

use chrono::NaiveDate;
use ledgersync_protocol::{Expense, ExpenseId, Frequency, Recurrence, UserId};
use proptest::prelude::*;
use std::ops::Range;

/// Strategy for non-blank expense names.
pub fn name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Za-z][A-Za-z0-9 ]{0,23}").expect("Invalid regex")
}

/// Strategy for category labels.
pub fn category_strategy() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["Food", "Housing", "Transport", "Health", "Leisure"])
        .prop_map(String::from)
}

/// Strategy for positive amounts with cent precision.
pub fn cost_strategy() -> impl Strategy<Value = f64> {
    (1u32..1_000_000).prop_map(|cents| f64::from(cents) / 100.0)
}

/// Strategy for dates in 2020..2030.
pub fn date_strategy() -> impl Strategy<Value = NaiveDate> {
    (2020i32..2030, 1u32..=12, 1u32..=28)
        .prop_map(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d).expect("Day 1..=28 always exists"))
}

/// Strategy for an optional recurrence hint.
pub fn recurrence_strategy() -> impl Strategy<Value = Option<Recurrence>> {
    prop::option::of(
        (
            prop::sample::select(vec![
                Frequency::Weekly,
                Frequency::BiWeekly,
                Frequency::Monthly,
                Frequency::Quarterly,
                Frequency::Yearly,
            ]),
            prop::option::of(date_strategy()),
        )
            .prop_map(|(frequency, end_date)| Recurrence {
                frequency,
                end_date,
            }),
    )
}

/// Strategy for a valid, never-synced expense owned by `user_id`.
pub fn unsynced_expense_strategy(user_id: UserId) -> impl Strategy<Value = Expense> {
    (
        name_strategy(),
        cost_strategy(),
        category_strategy(),
        date_strategy(),
        recurrence_strategy(),
    )
        .prop_map(move |(name, cost, category, date, recurrence)| Expense {
            id: None,
            user_id,
            name,
            cost,
            category,
            date,
            recurrence,
        })
}

/// Strategy for a batch of unsynced expenses.
pub fn unsynced_batch_strategy(
    user_id: UserId,
    size: Range<usize>,
) -> impl Strategy<Value = Vec<Expense>> {
    prop::collection::vec(unsynced_expense_strategy(user_id), size)
}

/// Strategy for a valid expense carrying remote id `id`.
pub fn synced_expense_strategy(user_id: UserId, id: ExpenseId) -> impl Strategy<Value = Expense> {
    unsynced_expense_strategy(user_id).prop_map(move |e| e.with_id(id))
}

/// Strategy for an expense that fails validation in exactly one field.
pub fn invalid_expense_strategy(user_id: UserId) -> impl Strategy<Value = Expense> {
    (unsynced_expense_strategy(user_id), 0u8..4).prop_map(|(mut e, defect)| {
        match defect {
            0 => e.name = "   ".into(),
            1 => e.category = String::new(),
            2 => e.cost = -e.cost,
            _ => e.cost = f64::NAN,
        }
        e
    })
}

/// Strategy for valid monthly budgets.
pub fn budget_strategy() -> impl Strategy<Value = f64> {
    (0u32..10_000_000).prop_map(|cents| f64::from(cents) / 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn generated_expenses_are_valid(e in unsynced_expense_strategy(UserId::new(1))) {
            prop_assert!(e.validate().is_ok());
            prop_assert!(e.id.is_none());
        }

        #[test]
        fn invalid_expenses_fail_validation(e in invalid_expense_strategy(UserId::new(1))) {
            prop_assert!(e.validate().is_err());
        }

        #[test]
        fn synced_expenses_keep_their_id(e in synced_expense_strategy(UserId::new(1), ExpenseId::new(9))) {
            prop_assert_eq!(e.id, Some(ExpenseId::new(9)));
        }
    }
}
