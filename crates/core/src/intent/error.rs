//! Intent construction errors.

use rust_decimal::Decimal;
use thiserror::Error;

/// Errors from intent constructors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IntentError {
    /// Intent line amounts carry direction via side and must be
    /// non-negative.
    #[error("Intent line amount must be non-negative, got {0}")]
    NegativeAmount(Decimal),

    /// A ledger intent must have at least one line.
    #[error("Ledger intent for '{0}' must have at least one line")]
    EmptyLedgerIntent(String),

    /// An accounting intent must target at least one ledger.
    #[error("Accounting intent must have at least one ledger intent")]
    EmptyIntent,
}

impl IntentError {
    /// Returns the machine-readable error code.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NegativeAmount(_) => "NEGATIVE_LINE_AMOUNT",
            Self::EmptyLedgerIntent(_) => "EMPTY_LEDGER_INTENT",
            Self::EmptyIntent => "EMPTY_INTENT",
        }
    }
}
