//! Subledger domain types and control reconciliation.
//!
//! Subledgers (AP, AR, Bank, Inventory, WIP) carry per-entity detail that
//! must reconcile with a GL control account within a contract-defined
//! tolerance. The types here are pure; the stateful subledger services
//! live in the store crate.

pub mod control;
pub mod error;
pub mod types;

#[cfg(test)]
mod control_tests;

pub use control::{
    ControlAccountBinding, ReconciliationCheck, ReconciliationTiming, ReconciliationTolerance,
    ReconciliationViolation, SubledgerControlContract, SubledgerControlRegistry,
    SubledgerReconciler, SubledgerType, ToleranceType, ViolationType,
};
pub use error::SubledgerError;
pub use types::{
    EntryDirection, ReconciliationResult, ReconciliationStatus, SubledgerBalance, SubledgerEntry,
};
