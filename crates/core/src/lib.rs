//! Pure posting domain for Quill.
//!
//! This crate contains the pure functional core of the posting kernel with
//! ZERO storage dependencies. All domain types, validation rules, and
//! calculations live here.
//!
//! # Modules
//!
//! - `clock` - Injected time source (no service reads the wall clock directly)
//! - `event` - Event envelope and canonical payload hashing
//! - `journal` - Posting DTOs: line specs, proposed entries, reference data
//! - `strategy` - Posting strategies, registry, and the bookkeeper
//! - `intent` - Multi-ledger accounting intent IR
//! - `subledger` - Subledger domain types and control reconciliation
//! - `policy` - Compiled policy pack contract consumed from the config layer

pub mod clock;
pub mod event;
pub mod intent;
pub mod journal;
pub mod policy;
pub mod strategy;
pub mod subledger;
