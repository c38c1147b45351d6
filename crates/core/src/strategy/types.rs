//! The posting strategy contract.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::StrategyError;
use crate::event::EventEnvelope;
use crate::journal::{LineSpec, ReferenceData};

/// How an event may be replayed against this strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplayPolicy {
    /// Replay must use the exact original strategy version.
    Strict,
    /// Replay may use a newer compatible version. The registry currently
    /// still returns the original version for permissive strategies; the
    /// distinction is declared but selection is intentionally not
    /// implemented.
    Permissive,
}

/// A pure function from an event to proposed journal lines.
///
/// Strategies are side-effect free: they read only the event and the
/// reference data snapshot, and perform no I/O. All validation and
/// account-code resolution beyond line derivation happens in the shared
/// proposal assembly, so implementations stay small.
pub trait PostingStrategy: Send + Sync {
    /// The event type this strategy handles.
    fn event_type(&self) -> &str;

    /// Strategy version; must be >= 1.
    fn version(&self) -> u32;

    /// Replay policy for events posted with this strategy.
    fn replay_policy(&self) -> ReplayPolicy {
        ReplayPolicy::Strict
    }

    /// Lowest system version this strategy supports.
    fn supported_from_version(&self) -> u32 {
        1
    }

    /// Highest system version this strategy supports; `None` is open-ended.
    fn supported_to_version(&self) -> Option<u32> {
        None
    }

    /// Derives the line specifications for an event.
    ///
    /// # Errors
    ///
    /// Returns `StrategyError::Execution` when the event cannot be
    /// interpreted.
    fn compute_line_specs(
        &self,
        event: &EventEnvelope,
        reference: &ReferenceData,
    ) -> Result<Vec<LineSpec>, StrategyError>;

    /// Entry description derived from the event, if any.
    fn description(&self, _event: &EventEnvelope) -> Option<String> {
        None
    }

    /// Entry metadata derived from the event, if any.
    fn metadata(&self, _event: &EventEnvelope) -> Option<Value> {
        None
    }

    /// Whether this strategy supports the given system version.
    fn is_compatible_with_system_version(&self, system_version: u32) -> bool {
        self.supported_from_version() <= system_version
            && self
                .supported_to_version()
                .is_none_or(|to| system_version <= to)
    }
}
