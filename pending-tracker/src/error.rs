//! Top level error module for the crate

/// Errors raised while restoring a serialized pending ledger
#[derive(Debug, thiserror::Error)]
pub enum DeserializationError {
    /// The framing could not be read
    #[error("Io error. {0}")]
    Io(#[from] std::io::Error),
    /// Written by a newer version of this crate
    #[error("Can't read pending ledger because of incorrect version. found {found}, supported up to {supported}")]
    UnsupportedVersion {
        /// version found in the bytes
        found: u64,
        /// newest version this crate reads
        supported: u64,
    },
    /// Bytes remain after the last payload
    #[error("{0} unexpected trailing bytes after pending ledger")]
    TrailingBytes(usize),
    /// A payload was framed correctly but could not be decoded into a transaction
    #[error("Transaction {index} could not be decoded. {source}")]
    Transaction {
        /// position of the payload in the ledger
        index: usize,
        /// decoding error from the transaction trait
        source: std::io::Error,
    },
    /// A decoded transaction carries no identifiers and can never be matched
    #[error("Transaction {0} has no identifiers")]
    NoIdentifiers(usize),
}
