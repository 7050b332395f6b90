//! contains associated methods for writing a PendingLedger to bytes and reading it back
//!
//! Only transaction payloads are written. Failure outcomes are live information: a restored
//! ledger starts with every entry active and is re-checked by the next reconciliation.

use std::io::{self, Cursor, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use zcash_encoding::Vector;

use crate::error::DeserializationError;
use crate::transaction::TransactionTrait;

use super::PendingLedger;

impl<T> PendingLedger<T> {
    /// Version written at the head of every serialized ledger
    pub fn serialized_version() -> u64 {
        1
    }

    /// Writes the version, then every entry's payload (failed or not) as a length-prefixed byte vector
    pub fn write<W, Tt>(&self, mut writer: W, transaction_trait: &Tt) -> io::Result<()>
    where
        W: Write,
        Tt: TransactionTrait<Transaction = T>,
    {
        writer.write_u64::<LittleEndian>(Self::serialized_version())?;

        let payloads = self
            .entries
            .iter()
            .map(|entry| transaction_trait.serialize(&entry.tx))
            .collect::<Vec<_>>();
        Vector::write(&mut writer, &payloads, |w, payload| {
            Vector::write(w, payload, |w, byte| w.write_u8(*byte))
        })
    }

    /// Reads a ledger written by [`PendingLedger::write`]. Every entry comes back active.
    pub fn read<R, Tt>(mut reader: R, transaction_trait: &Tt) -> Result<Self, DeserializationError>
    where
        R: Read,
        Tt: TransactionTrait<Transaction = T>,
    {
        let version = reader.read_u64::<LittleEndian>()?;
        if version > Self::serialized_version() {
            return Err(DeserializationError::UnsupportedVersion {
                found: version,
                supported: Self::serialized_version(),
            });
        }

        let payloads: Vec<Vec<u8>> =
            Vector::read(&mut reader, |r| Vector::read(r, |r| r.read_u8()))?;

        let mut ledger = PendingLedger::new();
        for (index, payload) in payloads.iter().enumerate() {
            let tx = transaction_trait
                .deserialize(payload)
                .map_err(|source| DeserializationError::Transaction { index, source })?;
            if transaction_trait.identifiers(&tx).is_empty() {
                return Err(DeserializationError::NoIdentifiers(index));
            }
            ledger.upsert(tx, transaction_trait);
        }

        Ok(ledger)
    }

    /// The ledger as bytes
    pub fn serialize<Tt>(&self, transaction_trait: &Tt) -> Vec<u8>
    where
        Tt: TransactionTrait<Transaction = T>,
    {
        let mut buffer = Vec::new();
        self.write(&mut buffer, transaction_trait)
            .expect("writing to a Vec is infallible");
        buffer
    }

    /// Restores a ledger from exactly the bytes produced by [`PendingLedger::serialize`]
    pub fn deserialize<Tt>(bytes: &[u8], transaction_trait: &Tt) -> Result<Self, DeserializationError>
    where
        Tt: TransactionTrait<Transaction = T>,
    {
        let mut cursor = Cursor::new(bytes);
        let ledger = Self::read(&mut cursor, transaction_trait)?;

        let trailing = bytes.len() - cursor.position() as usize;
        if trailing > 0 {
            return Err(DeserializationError::TrailingBytes(trailing));
        }
        Ok(ledger)
    }
}
