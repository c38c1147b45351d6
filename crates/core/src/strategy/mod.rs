//! Posting strategies, the strategy registry, and the bookkeeper.
//!
//! A posting strategy is a pure function from an event and reference data
//! to line specifications. Dispatch from event type to strategy goes
//! through the registry mapping only -- nothing in the engine matches on
//! event type strings.

pub mod bookkeeper;
pub mod error;
pub mod generic;
pub mod proposal;
pub mod registry;
pub mod types;

#[cfg(test)]
mod registry_tests;

pub use bookkeeper::{Bookkeeper, BookkeeperResult};
pub use error::{RegistryError, StrategyError};
pub use generic::GenericPostingStrategy;
pub use registry::StrategyRegistry;
pub use types::{PostingStrategy, ReplayPolicy};
