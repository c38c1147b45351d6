//! Subledger domain errors.

use thiserror::Error;

/// Errors from subledger entry construction and reconciliation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubledgerError {
    /// An entry carries exactly one of debit or credit, never both.
    #[error("Subledger entry cannot have both debit and credit")]
    BothSides,

    /// An entry carries exactly one of debit or credit, never neither.
    #[error("Subledger entry must have either debit or credit")]
    MissingAmount,

    /// A ledger ID did not name a known subledger type.
    #[error("Unknown subledger type: {0}")]
    UnknownSubledgerType(String),

    /// A control contract definition named an invalid currency.
    #[error("Invalid currency in control contract: {0}")]
    InvalidContractCurrency(String),

    /// Reconciliation inputs came from different subledgers.
    #[error("Cannot reconcile entries from different subledgers")]
    DifferentSubledgers,

    /// Reconciliation inputs belong to different entities.
    #[error("Cannot reconcile entries for different entities")]
    DifferentEntities,

    /// Reconciliation inputs are in different currencies.
    #[error("Currency mismatch: {left} vs {right}")]
    CurrencyMismatch {
        /// Currency on the left-hand side.
        left: String,
        /// Currency on the right-hand side.
        right: String,
    },

    /// The first reconciliation input must be a debit.
    #[error("First entry must be a debit")]
    FirstEntryNotDebit,

    /// The second reconciliation input must be a credit.
    #[error("Second entry must be a credit")]
    SecondEntryNotCredit,

    /// Both reconciliation inputs must still be open.
    #[error("Both entries must be open for reconciliation")]
    EntriesNotOpen,

    /// The reconciliation amount must be positive.
    #[error("Reconciliation amount must be positive")]
    NonPositiveAmount,

    /// The reconciliation amount exceeds an entry's open amount.
    #[error("Amount exceeds the {side} entry's open amount")]
    AmountExceedsOpen {
        /// Which entry's open amount was exceeded.
        side: &'static str,
    },
}

impl SubledgerError {
    /// Returns the machine-readable error code.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::BothSides | Self::MissingAmount => "INVALID_SUBLEDGER_ENTRY",
            Self::UnknownSubledgerType(_) => "UNKNOWN_SUBLEDGER_TYPE",
            Self::InvalidContractCurrency(_) => "INVALID_CURRENCY",
            Self::DifferentSubledgers
            | Self::DifferentEntities
            | Self::FirstEntryNotDebit
            | Self::SecondEntryNotCredit
            | Self::EntriesNotOpen
            | Self::NonPositiveAmount
            | Self::AmountExceedsOpen { .. } => "INVALID_RECONCILIATION",
            Self::CurrencyMismatch { .. } => "CURRENCY_MISMATCH",
        }
    }
}
