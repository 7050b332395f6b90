//! One reconciliation pass: TTL sweep, status query, outcome application.
//!
//! The pass takes the ledger lock twice (once for the sweep, once to apply outcomes) and never
//! across the provider call, so `add` and `clear` proceed while a query is in flight.
//! Outcomes are applied to whatever is active when the query returns.

use log::{debug, warn};

use crate::engine::PendingTransactions;
use crate::status::{Clock, StatusProvider};
use crate::transaction::TransactionTrait;

pub mod polling;

/// What happened to the status query of one pass
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QueryState {
    /// no active entries remained after the sweep, the provider was not called
    Skipped,
    /// the provider was not called because cancellation had been observed
    Cancelled,
    /// the provider answered and its outcomes were applied
    Applied,
    /// the provider answered after cancellation; its outcomes were discarded
    Discarded,
    /// the provider failed; only the sweep took effect
    Failed(String),
}

/// Summary of one reconciliation pass
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TickReport {
    /// entries flagged by the TTL sweep
    pub expired: usize,
    /// entries removed because of a `Success`
    pub cleared: usize,
    /// entries flagged with a `Failure` or `PartialSuccess` from the provider
    pub failed: usize,
    /// fate of the status query
    pub query: QueryState,
}

impl TickReport {
    fn swept(expired: usize, query: QueryState) -> Self {
        TickReport {
            expired,
            cleared: 0,
            failed: 0,
            query,
        }
    }
}

impl<Tt: TransactionTrait> PendingTransactions<Tt> {
    /// Runs one reconciliation pass against `provider` at the time given by `clock`.
    ///
    /// A provider error is logged and absorbed: the pass then amounts to the TTL sweep.
    pub async fn reconcile_once<P, C>(&self, provider: &P, clock: &C) -> TickReport
    where
        P: StatusProvider,
        C: Clock,
    {
        self.reconcile(provider, clock, || false).await
    }

    /// `is_cancelled` is polled before the provider call and again once it returns.
    pub(crate) async fn reconcile<P, C, F>(
        &self,
        provider: &P,
        clock: &C,
        is_cancelled: F,
    ) -> TickReport
    where
        P: StatusProvider,
        C: Clock,
        F: Fn() -> bool,
    {
        let now = clock.now();
        let (expired, identifiers) = self.update_ledger(|ledger, transaction_trait| {
            let expired = ledger.expire(now, transaction_trait);
            let identifiers = ledger.active_identifiers(transaction_trait);
            let publish = !expired.is_empty();
            ((expired, identifiers), publish)
        });
        for primary_identifier in &expired {
            debug!("Pending transaction {primary_identifier} expired at {now}");
        }

        if identifiers.is_empty() {
            return TickReport::swept(expired.len(), QueryState::Skipped);
        }
        if is_cancelled() {
            return TickReport::swept(expired.len(), QueryState::Cancelled);
        }

        let result = provider.query(&identifiers).await;
        if is_cancelled() {
            debug!("Reconciliation cancelled while querying, discarding result");
            return TickReport::swept(expired.len(), QueryState::Discarded);
        }

        match result {
            Ok(results) => {
                let (cleared, failed) = self.update_ledger(|ledger, transaction_trait| {
                    (ledger.apply_outcomes(&results, transaction_trait), true)
                });
                TickReport {
                    expired: expired.len(),
                    cleared,
                    failed,
                    query: QueryState::Applied,
                }
            }
            Err(e) => {
                warn!(
                    "Status query for {} identifiers failed: {e}",
                    identifiers.len()
                );
                TickReport::swept(expired.len(), QueryState::Failed(e.to_string()))
            }
        }
    }
}
