//! # LedgerSync Engine
//!
//! Offline reconciliation engine for LedgerSync.
//!
//! This crate provides:
//! - Local cache with tombstones for deleted records
//! - Diff engine (insert / update / delete classification)
//! - Apply engine with ordered, fail-fast phases
//! - Per-user sync session state machine with retry and cancellation
//! - Remote store gateway trait, with HTTP and in-memory implementations
//!
//! ## Architecture
//!
//! One sync attempt runs **fetch → diff → apply → rebuild**:
//! 1. Fetch the user's remote rows and budget
//! 2. Diff them against the local cache and its tombstones
//! 3. Apply the plan: batch insert, updates, deletes, then the budget
//! 4. Rebuild the cache from the remote rows and the insert echo
//!
//! ## Key Invariants
//!
//! - Identity is by remote id only; id-less records are always inserts
//! - A tombstoned id is never inserted or updated
//! - Phases run in order and a failure stops the attempt
//! - The cache changes only when an attempt ends reconciled
//! - At most one attempt per user is in flight

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod apply;
mod cache;
mod config;
mod diff;
mod error;
mod gateway;
mod http;
mod session;

pub use apply::{ApplyEngine, ApplyReport, PhaseFailure, SyncPhase};
pub use cache::{LocalCache, Tombstones};
pub use config::{RetryConfig, SyncConfig};
pub use diff::{index_remote, RejectedRecord, RemoteIndex, SyncPlan};
pub use error::{SyncError, SyncResult};
pub use gateway::{MockCall, MockOp, MockRemoteStore, RemoteStore};
pub use http::{
    HttpClient, HttpClientError, HttpRemoteStore, HttpRequest, HttpResponse, LoopbackClient,
    LoopbackServer, Method, ReqwestClient,
};
pub use session::{SyncEngine, SyncOutcome, SyncReport, SyncState, SyncStats};
