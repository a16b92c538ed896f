//! Expense records.

use crate::error::{is_valid_amount, ValidationError};
use crate::ids::{ExpenseId, UserId};
use crate::messages::UpdateExpenseRequest;
use crate::wire;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How often a recurring expense repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Frequency {
    /// Every week.
    Weekly,
    /// Every other week.
    BiWeekly,
    /// Every month.
    Monthly,
    /// Every three months.
    Quarterly,
    /// Every year.
    Yearly,
}

impl Frequency {
    /// Returns the wire name of the frequency.
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Weekly => "weekly",
            Frequency::BiWeekly => "bi-weekly",
            Frequency::Monthly => "monthly",
            Frequency::Quarterly => "quarterly",
            Frequency::Yearly => "yearly",
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Frequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "weekly" => Ok(Frequency::Weekly),
            "bi-weekly" | "biweekly" => Ok(Frequency::BiWeekly),
            "monthly" => Ok(Frequency::Monthly),
            "quarterly" => Ok(Frequency::Quarterly),
            "yearly" => Ok(Frequency::Yearly),
            other => Err(format!("unknown frequency: {other}")),
        }
    }
}

/// Recurrence hint attached to an expense.
///
/// Display metadata only. The reconciliation engine never reads it, but it
/// is carried through every sync round-trip unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recurrence {
    /// Repeat interval.
    pub frequency: Frequency,
    /// Last date the expense recurs on, if bounded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
}

/// A single expense.
///
/// Equality of *identity* is by `id` only, see [`Expense::same_remote_entity`].
/// The derived `PartialEq` compares every field and is meant for tests and
/// cache comparisons, not for reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    /// Remote row id; `None` until the record is first persisted remotely.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ExpenseId>,
    /// Owner.
    pub user_id: UserId,
    /// Free-text description.
    #[serde(alias = "expense_name")]
    pub name: String,
    /// Amount in the user's currency of record.
    #[serde(deserialize_with = "wire::decimal")]
    pub cost: f64,
    /// Free-text category label.
    pub category: String,
    /// Calendar date of the expense.
    #[serde(deserialize_with = "wire::date")]
    pub date: NaiveDate,
    /// Optional recurrence display hint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurrence: Option<Recurrence>,
}

impl Expense {
    /// Creates an expense that has not been synced yet.
    pub fn new(
        user_id: UserId,
        name: impl Into<String>,
        cost: f64,
        category: impl Into<String>,
        date: NaiveDate,
    ) -> Self {
        Self {
            id: None,
            user_id,
            name: name.into(),
            cost,
            category: category.into(),
            date,
            recurrence: None,
        }
    }

    /// Sets the remote id.
    pub fn with_id(mut self, id: ExpenseId) -> Self {
        self.id = Some(id);
        self
    }

    /// Sets the recurrence hint.
    pub fn with_recurrence(mut self, recurrence: Recurrence) -> Self {
        self.recurrence = Some(recurrence);
        self
    }

    /// Returns true once the remote store has assigned an id.
    pub fn is_synced(&self) -> bool {
        self.id.is_some()
    }

    /// Returns true if both records denote the same remote row.
    ///
    /// Records without an id never match anything, including themselves.
    pub fn same_remote_entity(&self, other: &Expense) -> bool {
        matches!((self.id, other.id), (Some(a), Some(b)) if a == b)
    }

    /// Compares the fields the remote store persists.
    ///
    /// Ignores `id`, `user_id` and the recurrence hint.
    pub fn same_content(&self, other: &Expense) -> bool {
        self.name == other.name
            && self.cost == other.cost
            && self.category == other.category
            && self.date == other.date
    }

    /// Checks the record can be sent to the remote store.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_fields(&self.name, self.cost, &self.category)
    }

    /// Returns the id-less insert payload for this record.
    pub fn to_new(&self) -> NewExpense {
        NewExpense {
            name: self.name.clone(),
            cost: self.cost,
            category: self.category.clone(),
            date: self.date,
            recurrence: self.recurrence.clone(),
        }
    }

    /// Returns the update body for this record.
    pub fn to_update_request(&self) -> UpdateExpenseRequest {
        UpdateExpenseRequest {
            user_id: self.user_id,
            name: self.name.clone(),
            cost: self.cost,
            category: self.category.clone(),
            date: self.date,
            recurrence: self.recurrence.clone(),
        }
    }
}

/// An expense as carried in a batch insert: no id, owner given by the batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewExpense {
    /// Free-text description.
    #[serde(alias = "expense_name")]
    pub name: String,
    /// Amount.
    #[serde(deserialize_with = "wire::decimal")]
    pub cost: f64,
    /// Category label.
    pub category: String,
    /// Calendar date.
    #[serde(deserialize_with = "wire::date")]
    pub date: NaiveDate,
    /// Optional recurrence hint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurrence: Option<Recurrence>,
}

impl NewExpense {
    /// Checks the payload can be persisted.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_fields(&self.name, self.cost, &self.category)
    }

    /// Materializes the stored row once the store has assigned an id.
    pub fn into_expense(self, id: ExpenseId, user_id: UserId) -> Expense {
        Expense {
            id: Some(id),
            user_id,
            name: self.name,
            cost: self.cost,
            category: self.category,
            date: self.date,
            recurrence: self.recurrence,
        }
    }
}

pub(crate) fn validate_fields(name: &str, cost: f64, category: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::EmptyName);
    }
    if category.trim().is_empty() {
        return Err(ValidationError::EmptyCategory);
    }
    if !is_valid_amount(cost) {
        return Err(ValidationError::InvalidCost(cost));
    }
    Ok(())
}
