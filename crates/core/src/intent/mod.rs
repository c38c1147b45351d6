//! Multi-ledger accounting intent IR.
//!
//! The intent is the contract between the economic interpretation layer
//! and the posting layer: role-keyed lines grouped per target ledger, plus
//! the reference snapshot versions under which role resolution must occur.

pub mod error;
pub mod types;

#[cfg(test)]
mod types_tests;

pub use error::IntentError;
pub use types::{
    AccountingIntent, IntentLine, IntentSnapshot, LedgerIntent, ResolvedIntentLine,
};
