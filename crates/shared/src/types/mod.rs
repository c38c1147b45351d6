//! Common types used across the kernel.

pub mod id;
pub mod money;
pub mod registry;

#[cfg(test)]
mod money_tests;

pub use id::*;
pub use money::{Currency, ExchangeRate, Money, MoneyError, Quantity};
pub use registry::CurrencyRegistry;
