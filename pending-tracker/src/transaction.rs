//! The capability a caller supplies so the engine can track any transaction representation.

use std::collections::BTreeSet;
use std::fmt::Debug;
use std::io;

use chrono::{DateTime, Utc};

/// Describes a transaction type to the pending transactions engine.
///
/// The engine never looks inside a transaction. Everything it needs (identity, bytes, expiry)
/// goes through an implementor of this trait, which is supplied once when the engine is built.
pub trait TransactionTrait: Send + Sync + 'static {
    /// The transaction representation being tracked
    type Transaction: Clone + Debug + Send + Sync + 'static;

    /// All identifiers of the transaction. A merged transaction carries the identifiers of
    /// every logical transfer it contains. Must be non-empty.
    fn identifiers(&self, tx: &Self::Transaction) -> BTreeSet<String>;

    /// A canonical representative identifier, stable across merges
    fn primary_identifier(&self, tx: &Self::Transaction) -> String;

    /// Encodes a transaction to bytes
    fn serialize(&self, tx: &Self::Transaction) -> Vec<u8>;

    /// Decodes a transaction previously encoded with [`TransactionTrait::serialize`]
    fn deserialize(&self, bytes: &[u8]) -> io::Result<Self::Transaction>;

    /// Whether the transaction's time-to-live has passed at `reference_time`
    fn ttl_expired(&self, tx: &Self::Transaction, reference_time: DateTime<Utc>) -> bool;

    /// The single identity predicate used everywhere entries are compared.
    fn is_same_logical_transaction(&self, a: &Self::Transaction, b: &Self::Transaction) -> bool {
        is_subsumed(&self.identifiers(a), &self.identifiers(b))
    }
}

/// True iff the smaller of the two identifier sets is fully contained in the larger.
///
/// Sets of equal size therefore match only when they are equal. An empty set matches nothing.
pub fn is_subsumed(a: &BTreeSet<String>, b: &BTreeSet<String>) -> bool {
    if a.is_empty() || b.is_empty() {
        return false;
    }
    let (smaller, larger) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    smaller.is_subset(larger)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn ids(identifiers: &[&str]) -> BTreeSet<String> {
        identifiers.iter().map(|id| id.to_string()).collect()
    }

    #[test_case(&["a"], &["a"], true ; "equal")]
    #[test_case(&["a"], &["a", "b"], true ; "subset")]
    #[test_case(&["a", "b", "c"], &["b"], true ; "superset")]
    #[test_case(&["a", "b"], &["b", "c"], false ; "overlap without containment")]
    #[test_case(&["a"], &["b"], false ; "disjoint")]
    #[test_case(&["a", "b"], &["a", "c"], false ; "equal size different members")]
    #[test_case(&[], &["a"], false ; "empty never matches")]
    #[test_case(&[], &[], false ; "both empty")]
    fn subsumption(a: &[&str], b: &[&str], expected: bool) {
        assert_eq!(is_subsumed(&ids(a), &ids(b)), expected);
        assert_eq!(is_subsumed(&ids(b), &ids(a)), expected);
    }
}
