//! # LedgerSync Testkit
//!
//! Test utilities for LedgerSync.
//!
//! This crate provides:
//! - Fixed records and a temporary cache location for scenario tests
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ledgersync_testkit::prelude::*;
//!
//! proptest! {
//!     #[test]
//!     fn ids_stay_unique(batch in unsynced_batch_strategy(TEST_USER, 1..20)) {
//!         // ... sync the batch
//!     }
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use proptest::prelude::*;
}

pub use fixtures::*;
pub use generators::*;
