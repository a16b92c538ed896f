//! Validation errors for records entering the sync pipeline.

use thiserror::Error;

/// A record was rejected at the boundary before reaching the diff.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Name is empty or whitespace.
    #[error("expense name must not be empty")]
    EmptyName,

    /// Category is empty or whitespace.
    #[error("expense category must not be empty")]
    EmptyCategory,

    /// Cost is negative, NaN or infinite.
    #[error("invalid cost {0}: must be a finite, non-negative amount")]
    InvalidCost(f64),

    /// Monthly budget is negative, NaN or infinite.
    #[error("invalid monthly budget {0}: must be a finite, non-negative amount")]
    InvalidBudget(f64),
}

/// Returns true if `amount` is usable as a cost or budget figure.
pub(crate) fn is_valid_amount(amount: f64) -> bool {
    amount.is_finite() && amount >= 0.0
}
