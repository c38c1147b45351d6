//! Transactional store and stateful kernel services for Quill.
//!
//! The store is an in-memory snapshot-transactional database: a caller
//! begins a transaction scope (`Txn`), every kernel service borrows that
//! scope, and the scope either commits or rolls back atomically. Two
//! layers enforce immutability: service-level validation and guarded
//! update methods on the scope itself, so no caller can mutate protected
//! columns of posted entries or closed periods.
//!
//! # Modules
//!
//! - `entities` - Persisted row types
//! - `memory` - The store, transaction scope, and guarded update methods
//! - `error` - Store-level error taxonomy
//! - `services` - Sequence, auditor, ingestor, period, reference data,
//!   snapshot, journal writer, subledger, subledger period close, and the
//!   posting orchestrator

pub mod entities;
pub mod error;
pub mod memory;
pub mod services;

pub use error::StoreError;
pub use memory::{Store, Txn};
