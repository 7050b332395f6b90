//! The long-running reconciliation loop and the handle that owns its lifetime.

use std::time::Duration;

use futures::stream::{self, BoxStream, Stream, StreamExt};
use log::{debug, info};
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{Instant, MissedTickBehavior};

use crate::engine::PendingTransactions;
use crate::status::{Clock, StatusProvider};
use crate::transaction::TransactionTrait;

/// A trigger stream ticking every `period`. The first tick fires immediately; ticks missed
/// while a slow pass runs are not replayed in a burst.
pub fn interval_trigger(period: Duration) -> BoxStream<'static, Instant> {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    stream::unfold(interval, |mut interval| async move {
        let instant = interval.tick().await;
        Some((instant, interval))
    })
    .boxed()
}

/// Owns a running reconciliation loop.
///
/// Closing the scope ([`PollingHandle::cancel`], [`PollingHandle::shutdown`], or dropping the
/// handle) stops the loop from starting any new status query. A query already in flight is
/// awaited and its result discarded.
#[derive(Debug)]
pub struct PollingHandle {
    cancel_sender: watch::Sender<bool>,
    join_handle: Option<JoinHandle<()>>,
}

impl PollingHandle {
    /// Signals the loop to stop. Calling this more than once has no further effect.
    pub fn cancel(&self) {
        self.cancel_sender.send_replace(true);
    }

    /// Whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        *self.cancel_sender.borrow()
    }

    /// Whether the loop has exited, either cancelled or because its trigger ended
    pub fn is_finished(&self) -> bool {
        self.join_handle
            .as_ref()
            .map_or(true, |join_handle| join_handle.is_finished())
    }

    /// Cancels the loop and waits for it to exit
    pub async fn shutdown(mut self) -> Result<(), JoinError> {
        self.cancel();
        match self.join_handle.take() {
            Some(join_handle) => join_handle.await,
            None => Ok(()),
        }
    }
}

impl Drop for PollingHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl<Tt: TransactionTrait> PendingTransactions<Tt> {
    /// Spawns the reconciliation loop: one pass per element of `trigger`, until the returned
    /// handle is cancelled or `trigger` ends. Must be called within a tokio runtime.
    pub fn start_polling<S, P, C>(&self, trigger: S, provider: P, clock: C) -> PollingHandle
    where
        S: Stream + Send + Unpin + 'static,
        S::Item: Send,
        P: StatusProvider,
        C: Clock,
    {
        let (cancel_sender, cancel_receiver) = watch::channel(false);
        let engine = self.clone();
        let join_handle = tokio::spawn(engine.poll(trigger, provider, clock, cancel_receiver));

        PollingHandle {
            cancel_sender,
            join_handle: Some(join_handle),
        }
    }

    /// [`PendingTransactions::start_polling`] ticked every [`pending_config::PendingConfig::poll_interval`]
    pub fn start_interval_polling<P, C>(&self, provider: P, clock: C) -> PollingHandle
    where
        P: StatusProvider,
        C: Clock,
    {
        self.start_polling(interval_trigger(self.config().poll_interval), provider, clock)
    }

    async fn poll<S, P, C>(
        self,
        mut trigger: S,
        provider: P,
        clock: C,
        mut cancel_receiver: watch::Receiver<bool>,
    ) where
        S: Stream + Send + Unpin + 'static,
        S::Item: Send,
        P: StatusProvider,
        C: Clock,
    {
        info!("Pending transactions polling starting");
        let mut ticks = 0u64;

        loop {
            if *cancel_receiver.borrow() {
                break;
            }
            let tick = tokio::select! {
                biased;
                changed = cancel_receiver.changed() => {
                    // a dropped sender means the handle is gone
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
                tick = trigger.next() => tick,
            };
            if tick.is_none() {
                debug!("Trigger stream ended");
                break;
            }

            ticks += 1;
            let report = self
                .reconcile(&provider, &clock, || *cancel_receiver.borrow())
                .await;
            debug!("Reconciliation pass {ticks}: {report:?}");
        }

        info!("Pending transactions polling stopped after {ticks} passes");
    }
}
