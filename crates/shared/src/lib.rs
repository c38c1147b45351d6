//! Shared value primitives and typed IDs for Quill.
//!
//! This crate provides the foundational types used across all other crates:
//! - `Money`, `Currency`, `Quantity`, `ExchangeRate` value objects with
//!   decimal precision (never floating point)
//! - The process-global ISO 4217 currency registry
//! - Typed IDs for type-safe entity references

pub mod types;

pub use types::money::{Currency, ExchangeRate, Money, MoneyError, Quantity};
pub use types::registry::CurrencyRegistry;
