//! Construction errors for posting DTOs.

use rust_decimal::Decimal;
use thiserror::Error;

/// Errors from DTO constructors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DtoError {
    /// Line amounts carry direction via `side`; the amount itself must be
    /// non-negative.
    #[error("Line amount must be non-negative, got {0}")]
    NegativeLineAmount(Decimal),

    /// A proposed entry must have at least one line.
    #[error("Proposed journal entry must have at least one line")]
    EmptyEntry,
}

impl DtoError {
    /// Returns the machine-readable error code.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NegativeLineAmount(_) => "NEGATIVE_LINE_AMOUNT",
            Self::EmptyEntry => "EMPTY_ENTRY",
        }
    }
}
