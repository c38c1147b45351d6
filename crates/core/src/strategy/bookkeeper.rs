//! Registry-based dispatcher from events to proposed entries.
//!
//! The bookkeeper holds no state across invocations. It looks up the
//! strategy for the event type, invokes it through the shared proposal
//! assembly, and converts every failure into a typed validation result --
//! strategy failures never propagate past this boundary.

use serde_json::json;
use tracing::warn;

use super::error::RegistryError;
use super::proposal;
use super::registry::StrategyRegistry;
use crate::event::EventEnvelope;
use crate::journal::{ProposedJournalEntry, ReferenceData, ValidationError, ValidationResult};

/// Result of a [`Bookkeeper::propose`] call.
#[derive(Debug, Clone)]
pub struct BookkeeperResult {
    /// The proposed entry on success.
    pub proposed_entry: Option<ProposedJournalEntry>,
    /// Validation outcome; valid iff a proposed entry is present.
    pub validation: ValidationResult,
    /// Version of the strategy that produced the entry.
    pub strategy_version: Option<u32>,
}

impl BookkeeperResult {
    /// A successful result.
    #[must_use]
    pub fn success(entry: ProposedJournalEntry, strategy_version: u32) -> Self {
        Self {
            proposed_entry: Some(entry),
            validation: ValidationResult::success(),
            strategy_version: Some(strategy_version),
        }
    }

    /// A failed result.
    #[must_use]
    pub fn failure(errors: Vec<ValidationError>) -> Self {
        Self {
            proposed_entry: None,
            validation: ValidationResult::failure(errors),
            strategy_version: None,
        }
    }

    /// Whether a valid proposed entry was produced.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.validation.is_valid() && self.proposed_entry.is_some()
    }
}

/// Stateless dispatcher over a strategy registry.
pub struct Bookkeeper<'a> {
    registry: &'a StrategyRegistry,
}

impl<'a> Bookkeeper<'a> {
    /// Creates a bookkeeper over a registry.
    #[must_use]
    pub const fn new(registry: &'a StrategyRegistry) -> Self {
        Self { registry }
    }

    /// Transforms an event into a proposed journal entry.
    ///
    /// Looks up the strategy for `(event.event_type, strategy_version)`
    /// -- the latest version when `strategy_version` is `None` -- and runs
    /// it. Lookup failures and strategy failures are returned as typed
    /// validation errors, never propagated.
    #[must_use]
    pub fn propose(
        &self,
        event: &EventEnvelope,
        reference: &ReferenceData,
        strategy_version: Option<u32>,
    ) -> BookkeeperResult {
        let strategy = match self.registry.get(&event.event_type, strategy_version) {
            Ok(strategy) => strategy,
            Err(e) => {
                warn!(
                    event_type = %event.event_type,
                    error_code = e.error_code(),
                    "strategy_lookup_failed"
                );
                return BookkeeperResult::failure(vec![lookup_error(&e, event)]);
            }
        };

        match proposal::propose(strategy.as_ref(), event, reference) {
            Ok(entry) => BookkeeperResult::success(entry, strategy.version()),
            Err(errors) => {
                warn!(
                    event_type = %event.event_type,
                    error_count = errors.len(),
                    "proposal_rejected"
                );
                BookkeeperResult::failure(errors)
            }
        }
    }

    /// Validates an event without keeping the proposed entry.
    #[must_use]
    pub fn validate_event(
        &self,
        event: &EventEnvelope,
        reference: &ReferenceData,
    ) -> ValidationResult {
        self.propose(event, reference, None).validation
    }

    /// Whether a strategy is registered for this event type.
    #[must_use]
    pub fn can_handle(&self, event_type: &str) -> bool {
        self.registry.has_strategy(event_type)
    }

    /// The latest strategy version for an event type, if any.
    #[must_use]
    pub fn latest_strategy_version(&self, event_type: &str) -> Option<u32> {
        self.registry.latest_version(event_type).ok()
    }
}

fn lookup_error(error: &RegistryError, event: &EventEnvelope) -> ValidationError {
    let mut details = json!({"event_type": event.event_type});
    if let RegistryError::VersionNotFound {
        version, available, ..
    } = error
    {
        details["version"] = json!(version);
        details["available_versions"] = json!(available);
    }
    ValidationError::new(error.error_code(), error.to_string()).with_details(details)
}
