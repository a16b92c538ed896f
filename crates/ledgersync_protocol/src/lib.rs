//! # LedgerSync Protocol
//!
//! Record model and wire types for LedgerSync.
//!
//! This crate provides:
//! - `Expense` and `Budget` records with their identity and validation rules
//! - `ExpenseId` / `UserId` identifiers
//! - JSON request/response bodies for the remote store routes
//!
//! This is a pure protocol crate with no I/O operations.
//!
//! ## Identity
//!
//! Two expenses are the same remote entity iff both carry the same non-null
//! `id`. A record without an `id` has never been persisted remotely and is
//! never matched against an existing row by content.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod budget;
mod error;
mod expense;
mod ids;
mod messages;
mod wire;

pub use budget::Budget;
pub use error::ValidationError;
pub use expense::{Expense, Frequency, NewExpense, Recurrence};
pub use ids::{ExpenseId, UserId};
pub use messages::{
    BudgetResponse, ErrorResponse, InsertExpensesRequest, InsertExpensesResponse,
    MessageResponse, UpdateExpenseRequest, UpsertBudgetRequest,
};
pub use wire::{parse_date, DATE_FORMAT};
