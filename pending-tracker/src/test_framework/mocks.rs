//! Mock transaction type, status provider and clock

use std::collections::{BTreeSet, VecDeque};
use std::future::Future;
use std::io::{self, Read};
use std::sync::{Arc, Mutex, RwLock};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use chrono::{DateTime, Duration, TimeZone, Utc};
use getset::Getters;
use tokio::sync::{Notify, Semaphore};
use zcash_encoding::Vector;

use crate::status::{Clock, StatusProvider, StatusQueryResult};
use crate::test_framework::macros::build_method;
use crate::transaction::TransactionTrait;

/// A transaction reduced to what the engine can observe
#[derive(Clone, Debug, PartialEq, Eq, Getters)]
#[getset(get = "pub")]
pub struct MockTransaction {
    /// Every identifier the transaction is known by
    identifiers: BTreeSet<String>,
    /// The identifier used in logs
    primary: String,
    /// Expiry instant
    ttl: DateTime<Utc>,
    /// Opaque payload
    memo: String,
}

/// A struct to build a [`MockTransaction`] from scratch.
#[derive(Clone, Debug, Default)]
pub struct MockTransactionBuilder {
    identifiers: Option<BTreeSet<String>>,
    primary: Option<String>,
    ttl: Option<DateTime<Utc>>,
    memo: Option<String>,
}

impl MockTransactionBuilder {
    /// Instantiate an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    build_method!(ttl, DateTime<Utc>);

    /// Set the identifiers from string slices.
    pub fn identifiers(self, identifiers: &[&str]) -> Self {
        self.identifier_set(identifiers.iter().map(|id| id.to_string()).collect())
    }

    /// Set the identifiers.
    pub fn identifier_set(mut self, identifiers: BTreeSet<String>) -> Self {
        self.identifiers = Some(identifiers);
        self
    }

    /// Set the primary identifier. Defaults to the smallest identifier.
    pub fn primary(mut self, primary: &str) -> Self {
        self.primary = Some(primary.to_string());
        self
    }

    /// Set an opaque payload, to tell apart transactions with the same identifiers.
    pub fn memo(mut self, memo: &str) -> Self {
        self.memo = Some(memo.to_string());
        self
    }

    /// Builds the transaction. Unset fields get defaults: identifier `"0"` and a time-to-live
    /// that never passes in practice.
    pub fn build(self) -> MockTransaction {
        let identifiers = self
            .identifiers
            .unwrap_or_else(|| BTreeSet::from(["0".to_string()]));
        let primary = self
            .primary
            .or_else(|| identifiers.iter().next().cloned())
            .unwrap_or_default();
        MockTransaction {
            identifiers,
            primary,
            ttl: self.ttl.unwrap_or_else(far_future),
            memo: self.memo.unwrap_or_default(),
        }
    }
}

fn far_future() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(9999, 12, 31, 0, 0, 0).unwrap()
}

/// [`TransactionTrait`] for [`MockTransaction`]
#[derive(Clone, Copy, Debug, Default)]
pub struct MockTransactionTrait;

fn write_string<W: io::Write>(writer: W, string: &str) -> io::Result<()> {
    Vector::write(writer, string.as_bytes(), |w, byte| w.write_u8(*byte))
}

fn read_string<R: Read>(reader: R) -> io::Result<String> {
    let bytes = Vector::read(reader, |r| r.read_u8())?;
    String::from_utf8(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

impl TransactionTrait for MockTransactionTrait {
    type Transaction = MockTransaction;

    fn identifiers(&self, tx: &MockTransaction) -> BTreeSet<String> {
        tx.identifiers.clone()
    }

    fn primary_identifier(&self, tx: &MockTransaction) -> String {
        tx.primary.clone()
    }

    fn serialize(&self, tx: &MockTransaction) -> Vec<u8> {
        let mut buffer = Vec::new();
        let identifiers = tx.identifiers.iter().collect::<Vec<_>>();
        Vector::write(&mut buffer, &identifiers, |w, id| write_string(w, id)).unwrap();
        write_string(&mut buffer, &tx.primary).unwrap();
        buffer
            .write_i64::<LittleEndian>(tx.ttl.timestamp_millis())
            .unwrap();
        write_string(&mut buffer, &tx.memo).unwrap();
        buffer
    }

    fn deserialize(&self, mut bytes: &[u8]) -> io::Result<MockTransaction> {
        let identifiers = Vector::read(&mut bytes, |r| read_string(r))?
            .into_iter()
            .collect::<BTreeSet<_>>();
        let primary = read_string(&mut bytes)?;
        let ttl_millis = bytes.read_i64::<LittleEndian>()?;
        let ttl = Utc
            .timestamp_millis_opt(ttl_millis)
            .single()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "ttl out of range"))?;
        let memo = read_string(&mut bytes)?;
        if !bytes.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "trailing bytes after mock transaction",
            ));
        }

        Ok(MockTransaction {
            identifiers,
            primary,
            ttl,
            memo,
        })
    }

    fn ttl_expired(&self, tx: &MockTransaction, reference_time: DateTime<Utc>) -> bool {
        tx.ttl < reference_time
    }
}

/// Error returned by [`MockStatusProvider`] when scripted to fail
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("Mock transport error. {0}")]
pub struct MockTransportError(pub String);

/// A [`StatusProvider`] answering from a script of responses, then with "no news".
///
/// Every query is recorded. A gated provider holds each query until a permit is added to
/// its semaphore, which keeps a query in flight for as long as a test needs.
#[derive(Debug, Default)]
pub struct MockStatusProvider {
    responses: Mutex<VecDeque<Result<StatusQueryResult, MockTransportError>>>,
    queries: Mutex<Vec<Vec<String>>>,
    gate: Option<Arc<Semaphore>>,
    query_started: Notify,
}

impl MockStatusProvider {
    /// A provider with no news for anything
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a response to the script
    pub fn respond_with(mut self, response: Result<StatusQueryResult, MockTransportError>) -> Self {
        self.responses.get_mut().unwrap().push_back(response);
        self
    }

    /// Holds every query until `gate` yields a permit
    pub fn gated(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Identifiers of every query made so far, in order
    pub fn queries(&self) -> Vec<Vec<String>> {
        self.queries.lock().unwrap().clone()
    }

    /// Waits until a query has started
    pub async fn wait_for_query(&self) {
        self.query_started.notified().await
    }
}

impl StatusProvider for MockStatusProvider {
    type Error = MockTransportError;

    fn query(
        &self,
        identifiers: &[String],
    ) -> impl Future<Output = Result<StatusQueryResult, Self::Error>> + Send {
        let identifiers = identifiers.to_vec();
        async move {
            self.queries.lock().unwrap().push(identifiers);
            self.query_started.notify_one();
            if let Some(gate) = &self.gate {
                if let Ok(permit) = gate.acquire().await {
                    permit.forget();
                }
            }
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(StatusQueryResult::new()))
        }
    }
}

/// A clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: RwLock<DateTime<Utc>>,
}

impl ManualClock {
    /// A clock stopped at `start`
    pub fn new(start: DateTime<Utc>) -> Self {
        ManualClock {
            now: RwLock::new(start),
        }
    }

    /// Moves the clock to `now`
    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.write().unwrap() = now;
    }

    /// Moves the clock forward by `duration`
    pub fn advance(&self, duration: Duration) {
        let mut now = self.now.write().unwrap();
        *now += duration;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read().unwrap()
    }
}
