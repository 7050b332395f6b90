//! contains functions that compare ledgers to see if they match

use std::collections::BTreeSet;

use pending_status::outcome::Outcome;
use pending_tracker::ledger::PendingLedger;
use pending_tracker::test_framework::mocks::MockTransaction;

/// The identifier set of every entry, active and failed
pub fn identity_sets(ledger: &PendingLedger<MockTransaction>) -> BTreeSet<BTreeSet<String>> {
    ledger
        .all()
        .iter()
        .map(|entry| entry.tx().identifiers().clone())
        .collect()
}

/// both ledgers track the same identifier sets
pub fn assert_same_identities(
    left: &PendingLedger<MockTransaction>,
    right: &PendingLedger<MockTransaction>,
) {
    assert_eq!(identity_sets(left), identity_sets(right));
}

/// every entry is failed, and failed with `outcome`
pub fn assert_all_failed_with(ledger: &PendingLedger<MockTransaction>, outcome: &Outcome) {
    assert_eq!(ledger.all_failed().len(), ledger.len());
    for (tx, failure) in ledger.all_failed() {
        assert_eq!(failure, outcome, "{:?} failed with an unexpected outcome", tx.primary());
    }
}

/// no entry carries a failure
pub fn assert_all_active(ledger: &PendingLedger<MockTransaction>) {
    assert!(
        ledger.all_failed().is_empty(),
        "unexpected failures: {:?}",
        ledger.all_failed()
    );
}
