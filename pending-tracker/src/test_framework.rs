//! Mocks for exercising the engine without a real transaction type, indexer or wall clock.
//! Exposed to other crates with the `test-elevation` feature.

pub(crate) mod macros;
pub mod mocks;
