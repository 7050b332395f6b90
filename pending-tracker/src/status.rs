//! Seams to the outside world used by reconciliation: the remote status provider and the clock.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use pending_status::outcome::Outcome;

/// Outcomes reported by a [`StatusProvider`] for some of the identifiers it was asked about.
/// An identifier with no outcome means "no news yet".
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StatusQueryResult {
    outcomes: HashMap<String, Outcome>,
}

impl StatusQueryResult {
    /// An empty result
    pub fn new() -> Self {
        Self::default()
    }
    /// Records the outcome of one identifier, replacing any previous one
    pub fn insert(&mut self, identifier: impl Into<String>, outcome: Outcome) -> Option<Outcome> {
        self.outcomes.insert(identifier.into(), outcome)
    }
    /// The outcome reported for `identifier`
    pub fn get(&self, identifier: &str) -> Option<&Outcome> {
        self.outcomes.get(identifier)
    }
    /// Number of identifiers with an outcome
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }
    /// true if the provider had no news
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
    /// Iterates `(identifier, outcome)` pairs in no particular order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Outcome)> {
        self.outcomes.iter()
    }
}

impl<S: Into<String>> FromIterator<(S, Outcome)> for StatusQueryResult {
    fn from_iter<I: IntoIterator<Item = (S, Outcome)>>(iter: I) -> Self {
        StatusQueryResult {
            outcomes: iter
                .into_iter()
                .map(|(identifier, outcome)| (identifier.into(), outcome))
                .collect(),
        }
    }
}

/// Answers "what is the on-chain status of these identifiers?", typically by asking an indexer.
///
/// A provider is handed to each reconciliation run rather than stored in the engine, so test
/// doubles and alternative backends can be swapped in freely.
pub trait StatusProvider: Send + Sync + 'static {
    /// Transport error. Logged and absorbed by reconciliation.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Queries the status of `identifiers`
    fn query(
        &self,
        identifiers: &[String],
    ) -> impl Future<Output = Result<StatusQueryResult, Self::Error>> + Send;
}

impl<P: StatusProvider> StatusProvider for Arc<P> {
    type Error = P::Error;

    fn query(
        &self,
        identifiers: &[String],
    ) -> impl Future<Output = Result<StatusQueryResult, Self::Error>> + Send {
        (**self).query(identifiers)
    }
}

/// The reference time used to evaluate time-to-live
pub trait Clock: Send + Sync + 'static {
    /// Current time
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock time
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

impl<C: Clock> Clock for Arc<C> {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}
