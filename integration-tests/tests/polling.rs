#![forbid(unsafe_code)]

use std::sync::Arc;
use std::time::Duration;

use pending_config::PendingConfig;
use pending_status::outcome::Outcome;
use pending_testutils::mocks::{MockStatusProvider, MockTransactionTrait};
use pending_testutils::{next_snapshot, tx, PendingScenario};
use pending_tracker::engine::PendingTransactions;
use pending_tracker::reconcile::polling::interval_trigger;
use pending_tracker::status::{StatusQueryResult, SystemClock};

#[tokio::test(start_paused = true)]
async fn interval_polling_runs_until_shutdown() {
    let provider = MockStatusProvider::new()
        .respond_with(Ok(StatusQueryResult::new()))
        .respond_with(Ok(StatusQueryResult::from_iter([("a", Outcome::Failure)])));
    let scenario = PendingScenario::with_config(
        0,
        provider,
        PendingConfig::default().with_poll_interval(Duration::from_secs(1)),
    );
    scenario.add_all(&[&["a"]], 10_000);
    let mut snapshots = scenario.engine.snapshots();
    assert_eq!(next_snapshot(&mut snapshots).await.len(), 1);

    let handle = scenario
        .engine
        .start_interval_polling(scenario.provider.clone(), scenario.clock.clone());

    // first tick is immediate and finds nothing
    let first = next_snapshot(&mut snapshots).await;
    assert!(first.all_failed().is_empty());
    // second tick, one period later, reports the failure
    let second = next_snapshot(&mut snapshots).await;
    assert_eq!(second.all_failed().len(), 1);

    handle.shutdown().await.unwrap();
    let queries = scenario.provider.queries().len();
    tokio::time::sleep(Duration::from_secs(300)).await;
    assert_eq!(scenario.provider.queries().len(), queries);
}

#[tokio::test]
async fn cancellation_from_another_task() {
    let engine = PendingTransactions::new(MockTransactionTrait, PendingConfig::default());
    engine.add(tx(&["a"], i64::from(i32::MAX)));
    let provider = Arc::new(MockStatusProvider::new());
    let handle = Arc::new(engine.start_polling(
        interval_trigger(Duration::from_millis(10)),
        provider.clone(),
        SystemClock,
    ));

    provider.wait_for_query().await;
    let canceller = {
        let handle = handle.clone();
        tokio::spawn(async move { handle.cancel() })
    };
    canceller.await.unwrap();

    tokio::time::timeout(Duration::from_secs(5), async {
        while !handle.is_finished() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .unwrap();
    assert!(handle.is_cancelled());
}
