#![warn(missing_docs)]
//! Pending transactions tracker
//!
//! Records transactions a wallet has submitted but not yet seen confirmed, and reconciles
//! them against status reports from a remote indexer.
//!
//! Entrypoint: [`crate::engine::PendingTransactions`]

pub mod engine;
pub mod error;
pub mod ledger;
pub mod reconcile;
pub mod status;
pub mod transaction;

#[cfg(any(test, feature = "test-elevation"))]
pub mod test_framework;

pub use pending_config::PendingConfig;
pub use pending_status::outcome::{Outcome, SegmentOutcome};
