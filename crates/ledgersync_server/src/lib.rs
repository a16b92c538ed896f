//! # LedgerSync Server
//!
//! Reference remote store for LedgerSync.
//!
//! This crate provides:
//! - In-memory expense and budget tables with auto-increment row ids
//! - Request handlers for the six ledger routes
//! - An axum router exposing them over HTTP
//! - A raw `(method, path, body)` dispatcher for in-process clients
//!
//! # Routes
//!
//! All routes are mounted under the configured prefix (`/api` by default):
//!
//! | Method | Path | Purpose |
//! |--------|------|---------|
//! | GET    | `/expenses/{userId}` | All rows of a user |
//! | POST   | `/expenses/sync`     | Batch insert, echoes stored rows |
//! | PUT    | `/expenses/{id}`     | Overwrite one row |
//! | DELETE | `/expenses/{id}`     | Delete one row |
//! | POST   | `/budget/sync`       | Upsert the monthly budget |
//! | GET    | `/budget/{userId}`   | Monthly budget or `null` |
//!
//! Errors are returned as `{"error": "..."}` with a 4xx or 5xx status.
//!
//! # Batch inserts
//!
//! A batch is validated as a whole before any row is written, so a rejected
//! batch leaves the tables untouched.

#![deny(unsafe_code)]
#![warn(missing_docs)]
// Production code MUST NOT use panic!/unwrap()/expect()
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod config;
mod error;
mod handler;
mod routes;
mod server;
mod store;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use handler::{HandlerContext, RequestHandler};
pub use routes::build_router;
pub use server::LedgerServer;
pub use store::LedgerStore;
