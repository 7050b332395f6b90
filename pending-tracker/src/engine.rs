//! The pending transactions engine: owns one [`PendingLedger`] and publishes every value it takes.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};

use futures::stream::{self, BoxStream, StreamExt};
use log::{debug, info, warn};
use tokio::sync::broadcast::{self, error::RecvError};

use pending_config::PendingConfig;

use crate::error::DeserializationError;
use crate::ledger::PendingLedger;
use crate::transaction::TransactionTrait;

/// Tracks in-flight transactions of one wallet.
///
/// The handle is cheap to clone. Every clone shares the same ledger, so the polling task and
/// the rest of the wallet see the same state. Separate engines share nothing.
///
/// Mutations (`add`, `clear`, each reconciliation step) are serialized by a lock that is never
/// held across an `.await`, and each publishes its result while still holding it. Observers
/// therefore see values in exactly the order they were produced.
pub struct PendingTransactions<Tt: TransactionTrait> {
    inner: Arc<EngineInner<Tt>>,
}

struct EngineInner<Tt: TransactionTrait> {
    transaction_trait: Tt,
    config: PendingConfig,
    ledger: RwLock<PendingLedger<Tt::Transaction>>,
    snapshot_sender: broadcast::Sender<PendingLedger<Tt::Transaction>>,
}

impl<Tt: TransactionTrait> Clone for PendingTransactions<Tt> {
    fn clone(&self) -> Self {
        PendingTransactions {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<Tt: TransactionTrait> std::fmt::Debug for PendingTransactions<Tt> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingTransactions")
            .field("ledger", &*self.read_ledger())
            .finish()
    }
}

impl<Tt: TransactionTrait> PendingTransactions<Tt> {
    /// An engine with an empty ledger
    pub fn new(transaction_trait: Tt, config: PendingConfig) -> Self {
        Self::with_ledger(transaction_trait, PendingLedger::new(), config)
    }

    /// An engine seeded with `ledger`
    pub fn with_ledger(
        transaction_trait: Tt,
        ledger: PendingLedger<Tt::Transaction>,
        config: PendingConfig,
    ) -> Self {
        if config.snapshot_capacity == 0 {
            warn!("Snapshot capacity of 0 is not usable, buffering 1 snapshot instead");
        }
        let (snapshot_sender, _) = broadcast::channel(config.snapshot_capacity.max(1));

        PendingTransactions {
            inner: Arc::new(EngineInner {
                transaction_trait,
                config,
                ledger: RwLock::new(ledger),
                snapshot_sender,
            }),
        }
    }

    /// Builds an engine from bytes produced by [`PendingTransactions::serialize`].
    /// Every restored entry is active. No engine is built if the bytes are malformed.
    pub fn restore(
        bytes: &[u8],
        transaction_trait: Tt,
        config: PendingConfig,
    ) -> Result<Self, DeserializationError> {
        let ledger = PendingLedger::deserialize(bytes, &transaction_trait)?;
        info!("Restored {} pending transactions", ledger.len());

        Ok(Self::with_ledger(transaction_trait, ledger, config))
    }

    /// The transaction trait this engine was built with
    pub fn transaction_trait(&self) -> &Tt {
        &self.inner.transaction_trait
    }

    /// The configuration this engine was built with
    pub fn config(&self) -> &PendingConfig {
        &self.inner.config
    }

    /// The current ledger value
    pub fn ledger(&self) -> PendingLedger<Tt::Transaction> {
        self.read_ledger().clone()
    }

    /// true iff the current ledger tracks the same logical transaction as `tx`
    pub fn has(&self, tx: &Tt::Transaction) -> bool {
        self.read_ledger().has(tx, &self.inner.transaction_trait)
    }

    /// The current ledger as bytes. Failure outcomes are not written.
    pub fn serialize(&self) -> Vec<u8> {
        self.read_ledger().serialize(&self.inner.transaction_trait)
    }

    /// Starts tracking `tx`. An entry for the same logical transaction is replaced wholesale,
    /// which also resets any failure recorded for it.
    ///
    /// A transaction without identifiers can never be matched again, so it is dropped with a
    /// warning and nothing is published.
    pub fn add(&self, tx: Tt::Transaction) {
        let primary_identifier = self.inner.transaction_trait.primary_identifier(&tx);
        if self.inner.transaction_trait.identifiers(&tx).is_empty() {
            warn!("Pending transaction {primary_identifier:?} has no identifiers, not tracking it");
            return;
        }
        let replaced = self.update_ledger(|ledger, transaction_trait| {
            (ledger.upsert(tx, transaction_trait), true)
        });

        if replaced > 0 {
            debug!("Pending transaction {primary_identifier} replaced {replaced} entries");
        } else {
            debug!("Pending transaction {primary_identifier} added");
        }
    }

    /// Stops tracking `tx`. Clearing an unknown transaction does nothing beyond publishing.
    pub fn clear(&self, tx: &Tt::Transaction) {
        let removed = self.update_ledger(|ledger, transaction_trait| {
            (ledger.remove_matching(tx, transaction_trait), true)
        });

        if removed > 0 {
            debug!(
                "Pending transaction {} cleared",
                self.inner.transaction_trait.primary_identifier(tx)
            );
        }
    }

    /// A live stream of ledger values.
    ///
    /// The first element is the value at subscription time; every later element is a value
    /// published after it, in production order. The stream is backed by a bounded broadcast
    /// buffer of [`PendingConfig::snapshot_capacity`] values: producers never wait for
    /// observers, and an observer that falls further behind skips forward to the oldest value
    /// still buffered. The stream ends once every handle to the engine is dropped.
    pub fn snapshots(&self) -> BoxStream<'static, PendingLedger<Tt::Transaction>> {
        // subscribing under the lock pins the first element to the subscription point
        let (current, receiver) = {
            let ledger = self.read_ledger();
            (ledger.clone(), self.inner.snapshot_sender.subscribe())
        };

        let updates = stream::unfold(receiver, |mut receiver| async move {
            loop {
                match receiver.recv().await {
                    Ok(ledger) => return Some((ledger, receiver)),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Snapshot observer fell behind, skipped {skipped} ledger values");
                    }
                    Err(RecvError::Closed) => return None,
                }
            }
        });

        stream::once(async move { current }).chain(updates).boxed()
    }

    fn read_ledger(&self) -> RwLockReadGuard<'_, PendingLedger<Tt::Transaction>> {
        self.inner
            .ledger
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// The single write path. `update` returns a value and whether the new ledger should be
    /// published; publication happens before the lock is released.
    pub(crate) fn update_ledger<F, R>(&self, update: F) -> R
    where
        F: FnOnce(&mut PendingLedger<Tt::Transaction>, &Tt) -> (R, bool),
    {
        let mut ledger = self
            .inner
            .ledger
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let (result, publish) = update(&mut ledger, &self.inner.transaction_trait);
        if publish {
            // no receivers is not an error, nobody is observing
            let _ = self.inner.snapshot_sender.send(ledger.clone());
        }
        result
    }
}
