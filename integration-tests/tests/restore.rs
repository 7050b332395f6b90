#![forbid(unsafe_code)]

use chrono::Duration;

use pending_config::PendingConfig;
use pending_status::outcome::Outcome;
use pending_testutils::assertions::{assert_all_active, assert_same_identities};
use pending_testutils::mocks::{MockStatusProvider, MockTransactionTrait};
use pending_testutils::PendingScenario;
use pending_tracker::engine::PendingTransactions;
use pending_tracker::error::DeserializationError;
use pending_tracker::status::StatusQueryResult;

#[tokio::test]
async fn restore_keeps_identities_and_forgets_failures() {
    let provider = MockStatusProvider::new().respond_with(Ok(StatusQueryResult::from_iter([(
        "c",
        Outcome::partial_from_pairs([(0, false)]),
    )])));
    let scenario = PendingScenario::new(0, provider);
    scenario.add_all(&[&["a", "b"]], 100);
    scenario.add_all(&[&["c"], &["d", "e"]], 10_000);
    scenario.clock.advance(Duration::seconds(150));
    scenario.tick().await;
    let original = scenario.engine.ledger();
    assert_eq!(original.all_failed().len(), 2);

    let restored = PendingTransactions::restore(
        &scenario.engine.serialize(),
        MockTransactionTrait,
        PendingConfig::default(),
    )
    .unwrap();

    let restored_ledger = restored.ledger();
    assert_same_identities(&original, &restored_ledger);
    assert_all_active(&restored_ledger);
}

#[tokio::test]
async fn restored_engine_is_reconciled_again() {
    let scenario = PendingScenario::new(0, MockStatusProvider::new());
    scenario.add_all(&[&["a"]], 100);
    scenario.clock.advance(Duration::seconds(150));
    scenario.tick().await;

    let restored = PendingTransactions::restore(
        &scenario.engine.serialize(),
        MockTransactionTrait,
        PendingConfig::default(),
    )
    .unwrap();
    assert_all_active(&restored.ledger());

    restored
        .reconcile_once(&scenario.provider, &scenario.clock)
        .await;
    assert_eq!(restored.ledger().all_failed().len(), 1);
}

#[test]
fn malformed_bytes_build_no_engine() {
    let engine = PendingTransactions::new(MockTransactionTrait, PendingConfig::default());
    engine.add(pending_testutils::tx(&["a"], 100));
    let bytes = engine.serialize();

    for malformed in [&bytes[..4], &bytes[..bytes.len() - 1]] {
        assert!(matches!(
            PendingTransactions::restore(malformed, MockTransactionTrait, PendingConfig::default()),
            Err(DeserializationError::Io(_))
        ));
    }
}
