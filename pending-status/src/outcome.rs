//! The result shape returned by a status provider for one transaction identifier.

/// The result of one segment of a transaction that was only partially applied.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SegmentOutcome {
    /// Segment id, as assigned by the ledger.
    pub id: u16,
    /// Whether this segment was applied.
    pub success: bool,
}

impl SegmentOutcome {
    /// Creates a new segment result
    pub fn new(id: u16, success: bool) -> Self {
        SegmentOutcome { id, success }
    }
}

/// The on-chain classification of a transaction.
///
/// This value is stored as received and never reinterpreted: a `PartialSuccess`
/// keeps its segments in the order the provider reported them.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// the transaction was applied in full.
    Success,
    /// the transaction was rejected, or is presumed dead.
    Failure,
    /// some segments applied and some did not.
    PartialSuccess(Vec<SegmentOutcome>),
}

impl Outcome {
    /// Creates a `PartialSuccess` from `(id, success)` pairs
    pub fn partial_from_pairs(pairs: impl IntoIterator<Item = (u16, bool)>) -> Self {
        Self::PartialSuccess(
            pairs
                .into_iter()
                .map(|(id, success)| SegmentOutcome::new(id, success))
                .collect(),
        )
    }
    /// true for `Success`
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
    /// true for `Failure`
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure)
    }
    /// true for `PartialSuccess`
    pub fn is_partial_success(&self) -> bool {
        matches!(self, Self::PartialSuccess(_))
    }
    /// A terminal failure flags a pending entry instead of clearing it.
    pub fn is_terminal_failure(&self) -> bool {
        !self.is_success()
    }
    /// The segments of a `PartialSuccess`, empty otherwise.
    pub fn segments(&self) -> &[SegmentOutcome] {
        match self {
            Self::PartialSuccess(segments) => segments,
            _ => &[],
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use Outcome::*;
        match self {
            Success => write!(f, "Transaction applied."),
            Failure => write!(f, "Transaction failed."),
            PartialSuccess(segments) => {
                let applied = segments.iter().filter(|segment| segment.success).count();
                write!(
                    f,
                    "Transaction partially applied, {} of {} segments succeeded.",
                    applied,
                    segments.len()
                )
            }
        }
    }
}

impl From<Outcome> for String {
    fn from(value: Outcome) -> Self {
        format!("{value}")
    }
}
