//! Fixtures shared by the integration tests

pub mod assertions;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use futures::stream::{BoxStream, StreamExt};

use pending_config::PendingConfig;
use pending_tracker::engine::PendingTransactions;
use pending_tracker::ledger::PendingLedger;
use pending_tracker::test_framework::mocks::{
    ManualClock, MockStatusProvider, MockTransaction, MockTransactionBuilder, MockTransactionTrait,
};

pub use pending_tracker::test_framework::mocks;

/// How long a test waits for a snapshot before giving up
pub const SNAPSHOT_TIMEOUT: Duration = Duration::from_secs(5);

/// An engine over mock transactions, with a stopped clock and a scripted provider
pub struct PendingScenario {
    pub engine: PendingTransactions<MockTransactionTrait>,
    pub clock: Arc<ManualClock>,
    pub provider: Arc<MockStatusProvider>,
}

impl PendingScenario {
    /// Clock stopped at `start_seconds` after the epoch
    pub fn new(start_seconds: i64, provider: MockStatusProvider) -> Self {
        Self::with_config(start_seconds, provider, PendingConfig::default())
    }

    pub fn with_config(start_seconds: i64, provider: MockStatusProvider, config: PendingConfig) -> Self {
        PendingScenario {
            engine: PendingTransactions::new(MockTransactionTrait, config),
            clock: Arc::new(ManualClock::new(at(start_seconds))),
            provider: Arc::new(provider),
        }
    }

    /// Adds a mock transaction per identifier set, all sharing `ttl_seconds`
    pub fn add_all(&self, identifier_sets: &[&[&str]], ttl_seconds: i64) -> Vec<MockTransaction> {
        identifier_sets
            .iter()
            .map(|identifiers| {
                let tx = tx(identifiers, ttl_seconds);
                self.engine.add(tx.clone());
                tx
            })
            .collect()
    }

    /// One reconciliation pass with the scenario's provider and clock
    pub async fn tick(&self) -> pending_tracker::reconcile::TickReport {
        self.engine.reconcile_once(&self.provider, &self.clock).await
    }
}

/// `seconds` after the epoch
pub fn at(seconds: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(seconds, 0)
        .single()
        .expect("seconds in range")
}

/// A mock transaction expiring `ttl_seconds` after the epoch
pub fn tx(identifiers: &[&str], ttl_seconds: i64) -> MockTransaction {
    MockTransactionBuilder::new()
        .identifiers(identifiers)
        .ttl(at(ttl_seconds))
        .build()
}

/// The next snapshot, panicking if none arrives within [`SNAPSHOT_TIMEOUT`]
pub async fn next_snapshot(
    snapshots: &mut BoxStream<'static, PendingLedger<MockTransaction>>,
) -> PendingLedger<MockTransaction> {
    tokio::time::timeout(SNAPSHOT_TIMEOUT, snapshots.next())
        .await
        .expect("snapshot within timeout")
        .expect("snapshot stream open")
}
