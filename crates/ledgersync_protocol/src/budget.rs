//! Budget singleton.

use crate::error::{is_valid_amount, ValidationError};
use crate::ids::UserId;
use crate::messages::UpsertBudgetRequest;
use crate::wire;
use serde::{Deserialize, Serialize};

/// Monthly budget of one user. At most one exists per `user_id`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Budget {
    /// Owner.
    pub user_id: UserId,
    /// Monthly spending budget.
    #[serde(deserialize_with = "wire::decimal")]
    pub monthly_budget: f64,
}

impl Budget {
    /// Creates a budget record.
    pub fn new(user_id: UserId, monthly_budget: f64) -> Self {
        Self {
            user_id,
            monthly_budget,
        }
    }

    /// Checks the amount is finite and non-negative.
    pub fn validate(&self) -> Result<(), ValidationError> {
        Self::validate_amount(self.monthly_budget)
    }

    /// Checks a raw budget amount.
    pub fn validate_amount(amount: f64) -> Result<(), ValidationError> {
        if is_valid_amount(amount) {
            Ok(())
        } else {
            Err(ValidationError::InvalidBudget(amount))
        }
    }

    /// Daily spending goal derived from the monthly figure (30-day month).
    pub fn daily_goal(&self) -> f64 {
        self.monthly_budget / 30.0
    }

    /// Returns the upsert body for this budget.
    pub fn to_upsert_request(&self) -> UpsertBudgetRequest {
        UpsertBudgetRequest {
            user_id: self.user_id,
            monthly_budget: self.monthly_budget,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budget_validation() {
        assert!(Budget::new(UserId::new(1), 0.0).validate().is_ok());
        assert!(Budget::new(UserId::new(1), 1500.0).validate().is_ok());
        assert_eq!(
            Budget::new(UserId::new(1), -5.0).validate(),
            Err(ValidationError::InvalidBudget(-5.0))
        );
        assert!(Budget::validate_amount(f64::INFINITY).is_err());
    }

    #[test]
    fn daily_goal_uses_thirty_days() {
        assert_eq!(Budget::new(UserId::new(1), 900.0).daily_goal(), 30.0);
    }
}
