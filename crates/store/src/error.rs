//! Store-level error taxonomy.

use thiserror::Error;

/// Errors raised by the store's guarded table operations.
///
/// These are the database-trigger analog: they fire regardless of which
/// service attempted the operation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    /// A unique constraint was violated.
    #[error("Unique violation on {table}: {key}")]
    UniqueViolation {
        /// Table with the constraint.
        table: &'static str,
        /// The conflicting key.
        key: String,
    },

    /// A referenced row does not exist.
    #[error("{entity} not found: {key}")]
    NotFound {
        /// Kind of entity looked up.
        entity: &'static str,
        /// The missing key.
        key: String,
    },

    /// A protected column of a posted entry or line was about to change.
    #[error("Immutability violation on {entity} {id}: {reason}")]
    ImmutabilityViolation {
        /// Kind of entity.
        entity: &'static str,
        /// Row identity.
        id: String,
        /// Which protection fired.
        reason: String,
    },

    /// A structural field of a closed period was about to change.
    #[error("Period '{period_code}' is closed and immutable")]
    PeriodImmutable {
        /// The closed period.
        period_code: String,
    },

    /// A second rounding line was about to be inserted for one entry.
    #[error("Entry {entry_id} already has a rounding line")]
    RoundingInvariantViolation {
        /// The entry the line targets.
        entry_id: String,
    },

    /// A rounding line exceeded the rounding threshold.
    #[error("Rounding amount {amount} exceeds threshold {threshold} on entry {entry_id}")]
    RoundingThresholdViolation {
        /// The entry the line targets.
        entry_id: String,
        /// Offending amount.
        amount: String,
        /// Allowed maximum.
        threshold: String,
    },

    /// A compare-and-swap update observed a concurrent modification.
    #[error("Optimistic lock failure on {entity} {id}")]
    OptimisticLock {
        /// Kind of entity.
        entity: &'static str,
        /// Row identity.
        id: String,
    },

    /// An account with journal lines cannot be removed.
    #[error("Account {account_id} is referenced by journal lines")]
    AccountReferenced {
        /// The referenced account.
        account_id: String,
    },
}

impl StoreError {
    /// Returns the machine-readable error code.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::UniqueViolation { .. } => "UNIQUE_VIOLATION",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::ImmutabilityViolation { .. } => "IMMUTABILITY_VIOLATION",
            Self::PeriodImmutable { .. } => "PERIOD_IMMUTABLE",
            Self::RoundingInvariantViolation { .. } => "ROUNDING_INVARIANT_VIOLATION",
            Self::RoundingThresholdViolation { .. } => "ROUNDING_THRESHOLD_VIOLATION",
            Self::OptimisticLock { .. } => "OPTIMISTIC_LOCK",
            Self::AccountReferenced { .. } => "ACCOUNT_REFERENCED",
        }
    }
}
