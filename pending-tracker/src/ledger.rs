//! The pending ledger: every transaction the wallet has submitted and not yet seen settle,
//! together with the terminal outcome of those that failed.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use getset::Getters;
use log::debug;

use pending_status::outcome::Outcome;

use crate::status::StatusQueryResult;
use crate::transaction::TransactionTrait;

pub mod read_write;

/// One tracked transaction plus its optional terminal outcome.
///
/// `failure` is `None` while the entry is active. It becomes `Some` once reconciliation
/// classifies the transaction as failed or partially applied, or its time-to-live passes.
#[derive(Clone, Debug, PartialEq, Eq, Getters)]
#[getset(get = "pub")]
pub struct PendingEntry<T> {
    /// The tracked transaction
    tx: T,
    /// The terminal outcome, `None` while active
    failure: Option<Outcome>,
}

impl<T> PendingEntry<T> {
    /// A new active entry
    pub fn active(tx: T) -> Self {
        PendingEntry { tx, failure: None }
    }
    /// true while no terminal outcome is recorded
    pub fn is_active(&self) -> bool {
        self.failure.is_none()
    }
    /// true once a terminal outcome is recorded
    pub fn is_failed(&self) -> bool {
        self.failure.is_some()
    }
    /// Splits the entry into its parts
    pub fn into_parts(self) -> (T, Option<Outcome>) {
        (self.tx, self.failure)
    }
}

/// An ordered collection of [`PendingEntry`], unique by [`TransactionTrait::is_same_logical_transaction`].
///
/// Order has no meaning beyond making snapshots reproducible for observers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingLedger<T> {
    entries: Vec<PendingEntry<T>>,
}

impl<T> Default for PendingLedger<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> PendingLedger<T> {
    /// An empty ledger
    pub fn new() -> Self {
        PendingLedger {
            entries: Vec::new(),
        }
    }
    /// Number of entries, active and failed
    pub fn len(&self) -> usize {
        self.entries.len()
    }
    /// true if nothing is tracked
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
    /// Every entry, active and failed
    pub fn all(&self) -> &[PendingEntry<T>] {
        &self.entries
    }
    /// Every entry with a terminal outcome, paired with that outcome
    pub fn all_failed(&self) -> Vec<(&T, &Outcome)> {
        self.entries
            .iter()
            .filter_map(|entry| entry.failure.as_ref().map(|outcome| (&entry.tx, outcome)))
            .collect()
    }
    /// Every entry still awaiting an outcome
    pub fn active(&self) -> impl Iterator<Item = &PendingEntry<T>> {
        self.entries.iter().filter(|entry| entry.is_active())
    }
}

// query
impl<T> PendingLedger<T> {
    /// The entry tracking the same logical transaction as `probe`, if any
    pub fn find<Tt>(&self, probe: &T, transaction_trait: &Tt) -> Option<&PendingEntry<T>>
    where
        Tt: TransactionTrait<Transaction = T>,
    {
        self.entries
            .iter()
            .find(|entry| transaction_trait.is_same_logical_transaction(&entry.tx, probe))
    }
    /// true iff some entry tracks the same logical transaction as `probe`
    pub fn has<Tt>(&self, probe: &T, transaction_trait: &Tt) -> bool
    where
        Tt: TransactionTrait<Transaction = T>,
    {
        self.find(probe, transaction_trait).is_some()
    }
}

// set
impl<T> PendingLedger<T> {
    /// Inserts `tx` as an active entry, replacing the entry of the same logical transaction.
    ///
    /// The replacement takes the position of the first match. Any further matches (possible when
    /// `tx` subsumes several smaller entries) are dropped so the ledger stays unique.
    /// Returns the number of entries replaced.
    pub(crate) fn upsert<Tt>(&mut self, tx: T, transaction_trait: &Tt) -> usize
    where
        Tt: TransactionTrait<Transaction = T>,
    {
        let matches = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| transaction_trait.is_same_logical_transaction(&entry.tx, &tx))
            .map(|(index, _)| index)
            .collect::<Vec<_>>();

        match matches.split_first() {
            None => {
                self.entries.push(PendingEntry::active(tx));
                0
            }
            Some((&first, rest)) => {
                self.entries[first] = PendingEntry::active(tx);
                for &index in rest.iter().rev() {
                    self.entries.remove(index);
                }
                matches.len()
            }
        }
    }

    /// Removes every entry tracking the same logical transaction as `tx`.
    /// Returns the number of entries removed.
    pub(crate) fn remove_matching<Tt>(&mut self, tx: &T, transaction_trait: &Tt) -> usize
    where
        Tt: TransactionTrait<Transaction = T>,
    {
        let before = self.entries.len();
        self.entries
            .retain(|entry| !transaction_trait.is_same_logical_transaction(&entry.tx, tx));
        before - self.entries.len()
    }

    /// Flags every active entry whose time-to-live has passed with a synthetic `Failure`.
    /// Returns the primary identifiers of the flagged entries.
    pub(crate) fn expire<Tt>(
        &mut self,
        reference_time: DateTime<Utc>,
        transaction_trait: &Tt,
    ) -> Vec<String>
    where
        Tt: TransactionTrait<Transaction = T>,
    {
        let mut expired = Vec::new();
        for entry in self.entries.iter_mut().filter(|entry| entry.is_active()) {
            if transaction_trait.ttl_expired(&entry.tx, reference_time) {
                entry.failure = Some(Outcome::Failure);
                expired.push(transaction_trait.primary_identifier(&entry.tx));
            }
        }
        expired
    }

    /// Every identifier of every active entry, sorted and deduplicated
    pub(crate) fn active_identifiers<Tt>(&self, transaction_trait: &Tt) -> Vec<String>
    where
        Tt: TransactionTrait<Transaction = T>,
    {
        self.active()
            .flat_map(|entry| transaction_trait.identifiers(&entry.tx))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Applies provider results to the entries that are active now.
    ///
    /// An entry with any `Success` is removed. Otherwise the first failing outcome among its
    /// identifiers (in identifier order) is stored as received.
    /// Returns `(cleared, failed)` counts.
    pub(crate) fn apply_outcomes<Tt>(
        &mut self,
        results: &StatusQueryResult,
        transaction_trait: &Tt,
    ) -> (usize, usize)
    where
        Tt: TransactionTrait<Transaction = T>,
    {
        let mut cleared = 0;
        let mut failed = 0;
        self.entries.retain_mut(|entry| {
            if !entry.is_active() {
                return true;
            }
            let outcomes = transaction_trait
                .identifiers(&entry.tx)
                .iter()
                .filter_map(|identifier| results.get(identifier))
                .collect::<Vec<_>>();

            if outcomes.iter().any(|outcome| outcome.is_success()) {
                debug!(
                    "Pending transaction {} settled, clearing",
                    transaction_trait.primary_identifier(&entry.tx)
                );
                cleared += 1;
                return false;
            }
            if let Some(outcome) = outcomes
                .into_iter()
                .find(|outcome| outcome.is_terminal_failure())
            {
                debug!(
                    "Pending transaction {} flagged. {}",
                    transaction_trait.primary_identifier(&entry.tx),
                    outcome
                );
                entry.failure = Some(outcome.clone());
                failed += 1;
            }
            true
        });
        (cleared, failed)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use proptest::prelude::*;

    use super::*;
    use crate::test_framework::mocks::{MockTransaction, MockTransactionBuilder, MockTransactionTrait};

    fn tx(identifiers: &[&str]) -> MockTransaction {
        MockTransactionBuilder::new().identifiers(identifiers).build()
    }

    fn epoch_plus(seconds: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(seconds, 0).unwrap()
    }

    #[test]
    fn upsert_appends_new_transactions_in_order() {
        let mut ledger = PendingLedger::new();
        assert_eq!(ledger.upsert(tx(&["a", "b"]), &MockTransactionTrait), 0);
        assert_eq!(ledger.upsert(tx(&["c"]), &MockTransactionTrait), 0);

        let primaries = ledger
            .all()
            .iter()
            .map(|entry| entry.tx().primary().to_string())
            .collect::<Vec<_>>();
        assert_eq!(primaries, vec!["a", "c"]);
    }

    #[test]
    fn upsert_replaces_payload_and_resets_failure() {
        let mut ledger = PendingLedger::new();
        let expiring = MockTransactionBuilder::new()
            .identifiers(&["a"])
            .ttl(epoch_plus(100))
            .build();
        ledger.upsert(expiring, &MockTransactionTrait);
        ledger.expire(epoch_plus(200), &MockTransactionTrait);
        assert_eq!(ledger.all_failed().len(), 1);

        let fuller = MockTransactionBuilder::new()
            .identifiers(&["a", "b"])
            .memo("merged")
            .build();
        assert_eq!(ledger.upsert(fuller.clone(), &MockTransactionTrait), 1);

        assert_eq!(ledger.len(), 1);
        assert!(ledger.all_failed().is_empty());
        assert_eq!(ledger.all()[0].tx(), &fuller);
    }

    #[test]
    fn upsert_collapses_every_subsumed_entry() {
        let mut ledger = PendingLedger::new();
        ledger.upsert(tx(&["a"]), &MockTransactionTrait);
        ledger.upsert(tx(&["x"]), &MockTransactionTrait);
        ledger.upsert(tx(&["b"]), &MockTransactionTrait);

        assert_eq!(ledger.upsert(tx(&["a", "b"]), &MockTransactionTrait), 2);

        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.all()[0].tx().identifiers().len(), 2);
        assert_eq!(ledger.all()[1].tx().primary(), "x");
    }

    #[test]
    fn remove_matching_unknown_is_noop() {
        let mut ledger = PendingLedger::new();
        ledger.upsert(tx(&["a"]), &MockTransactionTrait);
        assert_eq!(ledger.remove_matching(&tx(&["z"]), &MockTransactionTrait), 0);
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.remove_matching(&tx(&["a", "q"]), &MockTransactionTrait), 1);
        assert!(ledger.is_empty());
    }

    #[test]
    fn expire_only_touches_active_entries_past_ttl() {
        let mut ledger = PendingLedger::new();
        let short = MockTransactionBuilder::new()
            .identifiers(&["short"])
            .ttl(epoch_plus(100))
            .build();
        let long = MockTransactionBuilder::new()
            .identifiers(&["long"])
            .ttl(epoch_plus(1_000))
            .build();
        ledger.upsert(short, &MockTransactionTrait);
        ledger.upsert(long, &MockTransactionTrait);

        assert_eq!(ledger.expire(epoch_plus(150), &MockTransactionTrait), vec!["short"]);
        assert!(ledger.expire(epoch_plus(150), &MockTransactionTrait).is_empty());
        assert_eq!(ledger.active().count(), 1);
        assert_eq!(ledger.all_failed()[0].1, &Outcome::Failure);
    }

    #[test]
    fn success_beats_failure_on_the_same_entry() {
        let mut ledger = PendingLedger::new();
        ledger.upsert(tx(&["a", "b"]), &MockTransactionTrait);
        let results = StatusQueryResult::from_iter([
            ("a".to_string(), Outcome::Failure),
            ("b".to_string(), Outcome::Success),
        ]);

        assert_eq!(ledger.apply_outcomes(&results, &MockTransactionTrait), (1, 0));
        assert!(ledger.is_empty());
    }

    #[test]
    fn partial_success_is_stored_as_received() {
        let mut ledger = PendingLedger::new();
        ledger.upsert(tx(&["a"]), &MockTransactionTrait);
        ledger.upsert(tx(&["b"]), &MockTransactionTrait);
        let partial = Outcome::partial_from_pairs([(1, true), (0, false)]);
        let results = StatusQueryResult::from_iter([("a".to_string(), partial.clone())]);

        assert_eq!(ledger.apply_outcomes(&results, &MockTransactionTrait), (0, 1));
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.all_failed(), vec![(&tx(&["a"]), &partial)]);
    }

    #[test]
    fn failed_entries_are_not_reclassified() {
        let mut ledger = PendingLedger::new();
        ledger.upsert(tx(&["a"]), &MockTransactionTrait);
        ledger.apply_outcomes(
            &StatusQueryResult::from_iter([("a".to_string(), Outcome::Failure)]),
            &MockTransactionTrait,
        );

        let results = StatusQueryResult::from_iter([("a".to_string(), Outcome::Success)]);
        assert_eq!(ledger.apply_outcomes(&results, &MockTransactionTrait), (0, 0));
        assert_eq!(ledger.all_failed().len(), 1);
    }

    #[test]
    fn has_matches_any_historical_view() {
        let mut ledger = PendingLedger::new();
        ledger.upsert(tx(&["a", "b"]), &MockTransactionTrait);

        assert!(ledger.has(&tx(&["a"]), &MockTransactionTrait));
        assert!(ledger.has(&tx(&["a", "b", "c"]), &MockTransactionTrait));
        assert!(!ledger.has(&tx(&["b", "c"]), &MockTransactionTrait));
    }

    proptest! {
        #[test]
        fn no_two_entries_are_the_same_logical_transaction(
            sets in prop::collection::vec(prop::collection::btree_set(0u8..6, 1..4), 0..24)
        ) {
            let mut ledger = PendingLedger::new();
            for set in &sets {
                let identifiers = set.iter().map(|id| id.to_string()).collect::<BTreeSet<_>>();
                ledger.upsert(
                    MockTransactionBuilder::new().identifier_set(identifiers).build(),
                    &MockTransactionTrait,
                );
            }

            let entries = ledger.all();
            for (i, a) in entries.iter().enumerate() {
                for b in &entries[i + 1..] {
                    prop_assert!(!MockTransactionTrait.is_same_logical_transaction(a.tx(), b.tx()));
                }
            }
            let distinct = sets.iter().collect::<BTreeSet<_>>().len();
            prop_assert!(ledger.len() <= distinct);
        }

        #[test]
        fn added_transaction_is_found_by_subsets_and_supersets(
            set in prop::collection::btree_set(0u8..10, 1..6),
            extra in prop::collection::btree_set(10u8..20, 0..3),
        ) {
            let identifiers = set.iter().map(|id| id.to_string()).collect::<BTreeSet<_>>();
            let mut ledger = PendingLedger::new();
            ledger.upsert(
                MockTransactionBuilder::new().identifier_set(identifiers.clone()).build(),
                &MockTransactionTrait,
            );

            let subset = identifiers.iter().take(1).cloned().collect::<BTreeSet<_>>();
            let superset = identifiers
                .iter()
                .cloned()
                .chain(extra.iter().map(|id| id.to_string()))
                .collect::<BTreeSet<_>>();
            prop_assert!(ledger.has(&MockTransactionBuilder::new().identifier_set(subset).build(), &MockTransactionTrait));
            prop_assert!(ledger.has(&MockTransactionBuilder::new().identifier_set(superset).build(), &MockTransactionTrait));
        }
    }
}
