#![warn(missing_docs)]
//! Pending-Status
//! The on-chain outcome of a submitted transaction, as reported by a status provider.

pub mod outcome;
