//! Validation results carried across the bookkeeper boundary.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single validation error with a machine-readable code.
///
/// Callers dispatch on `code`; the message is for humans only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationError {
    /// UPPERCASE_SNAKE_CASE machine code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Field the error refers to, if any.
    pub field: Option<String>,
    /// Structured error context.
    pub details: Option<Value>,
}

impl ValidationError {
    /// Creates a validation error.
    #[must_use]
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            field: None,
            details: None,
        }
    }

    /// Attaches the offending field name.
    #[must_use]
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    /// Attaches structured context.
    #[must_use]
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// Outcome of a validation pass.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Errors collected; empty means valid.
    pub errors: Vec<ValidationError>,
}

impl ValidationResult {
    /// A successful result.
    #[must_use]
    pub fn success() -> Self {
        Self { errors: Vec::new() }
    }

    /// A failed result from one or more errors.
    #[must_use]
    pub fn failure(errors: Vec<ValidationError>) -> Self {
        Self { errors }
    }

    /// Returns true if no errors were collected.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns true if any collected error carries `code`.
    #[must_use]
    pub fn has_code(&self, code: &str) -> bool {
        self.errors.iter().any(|e| e.code == code)
    }
}
