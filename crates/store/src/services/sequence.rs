//! Monotonic per-stream sequence allocation.

use crate::memory::Txn;

/// Allocates strictly increasing values per named stream.
///
/// Backed by the store's counters, which sit outside the transaction
/// snapshot: allocation in a scope that later rolls back leaves a gap, and
/// gaps are never reused. The invariant is strict monotonicity, not
/// gapless numbering.
pub struct SequenceService<'t, 'a> {
    txn: &'t Txn<'a>,
}

impl<'t, 'a> SequenceService<'t, 'a> {
    /// Stream for journal entry sequences.
    pub const JOURNAL_ENTRY: &'static str = "journal_entry";
    /// Stream for audit event sequences.
    pub const AUDIT_EVENT: &'static str = "audit_event";

    /// Creates a sequence service over a scope.
    #[must_use]
    pub const fn new(txn: &'t Txn<'a>) -> Self {
        Self { txn }
    }

    /// Advances `stream` and returns the new value.
    #[must_use]
    pub fn next_value(&self, stream: &str) -> i64 {
        self.txn.next_sequence(stream)
    }
}
