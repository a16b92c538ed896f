//! JSON request and response bodies of the remote store routes.
//!
//! Field names follow the remote API: batch and budget bodies are camelCase
//! (`userId`, `monthlyBudget`), fetched rows are snake_case.

use crate::expense::{Expense, NewExpense, Recurrence};
use crate::ids::UserId;
use crate::wire;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Body of `POST /expenses/sync`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertExpensesRequest {
    /// Owner of every record in the batch.
    pub user_id: UserId,
    /// Records to insert, in order.
    pub expenses: Vec<NewExpense>,
}

/// Response of `POST /expenses/sync`.
///
/// `expenses` echoes the stored rows with their new ids, in request order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsertExpensesResponse {
    /// Human-readable acknowledgement.
    pub message: String,
    /// Stored rows.
    #[serde(default)]
    pub expenses: Vec<Expense>,
}

/// Body of `PUT /expenses/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateExpenseRequest {
    /// Owner.
    pub user_id: UserId,
    /// Description.
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

impl UpdateExpenseRequest {
    /// Returns the payload fields as an insertable record.
    pub fn into_new(self) -> NewExpense {
        NewExpense {
            name: self.name,
            cost: self.cost,
            category: self.category,
            date: self.date,
            recurrence: self.recurrence,
        }
    }
}

/// Body of `POST /budget/sync`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertBudgetRequest {
    /// Owner.
    pub user_id: UserId,
    /// New monthly budget.
    #[serde(deserialize_with = "wire::decimal")]
    pub monthly_budget: f64,
}

/// Response of `GET /budget/{userId}` when a budget exists.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BudgetResponse {
    /// Stored monthly budget.
    #[serde(deserialize_with = "wire::decimal")]
    pub monthly_budget: f64,
}

/// Generic acknowledgement body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResponse {
    /// Human-readable message.
    pub message: String,
}

impl MessageResponse {
    /// Creates an acknowledgement.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Error body returned with non-2xx statuses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error description.
    pub error: String,
}

impl ErrorResponse {
    /// Creates an error body.
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::ExpenseId;

    #[test]
    fn batch_body_uses_camel_case_owner() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let request = InsertExpensesRequest {
            user_id: UserId::new(4),
            expenses: vec![Expense::new(UserId::new(4), "Coffee", 4.5, "Food", date).to_new()],
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["userId"], 4);
        assert_eq!(value["expenses"][0]["name"], "Coffee");
        assert_eq!(value["expenses"][0]["date"], "2024-01-01");
    }

    #[test]
    fn legacy_batch_items_are_accepted() {
        let json = r#"{"userId":2,"expenses":[{"expense_name":"Bus","cost":"2.75","category":"Transport","date":"2024-05-05"}]}"#;
        let request: InsertExpensesRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.expenses[0].name, "Bus");
        assert_eq!(request.expenses[0].cost, 2.75);
    }

    #[test]
    fn insert_response_without_echo() {
        let response: InsertExpensesResponse =
            serde_json::from_str(r#"{"message":"Expenses synced successfully"}"#).unwrap();
        assert!(response.expenses.is_empty());
    }

    #[test]
    fn update_body_round_trips_through_new() {
        let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let expense = Expense::new(UserId::new(1), "Gym", 30.0, "Health", date)
            .with_id(ExpenseId::new(5));
        let request = expense.to_update_request();
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["userId"], 1);
        assert!(value.get("id").is_none());

        let stored = request.into_new().into_expense(ExpenseId::new(5), UserId::new(1));
        assert_eq!(stored, expense);
    }

    #[test]
    fn budget_bodies() {
        let value = serde_json::to_value(UpsertBudgetRequest {
            user_id: UserId::new(9),
            monthly_budget: 1200.0,
        })
        .unwrap();
        assert_eq!(value["monthlyBudget"], 1200.0);

        let response: BudgetResponse =
            serde_json::from_str(r#"{"monthly_budget":"800.00"}"#).unwrap();
        assert_eq!(response.monthly_budget, 800.0);
    }
}
