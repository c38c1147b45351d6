//! Persisted reference snapshots and freshness validation.
//!
//! A posting may carry a reference to a persisted full snapshot; before
//! commit, the writer asks this service whether every component of that
//! snapshot still matches the current reference versions. A stale
//! component is fatal to the posting.

use tracing::info;

use quill_core::clock::Clock;
use quill_core::intent::IntentSnapshot;
use quill_shared::types::SnapshotId;

use crate::entities::ReferenceSnapshotRow;
use crate::memory::Txn;

/// Result of a snapshot integrity validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotValidation {
    /// Components whose versions no longer match; empty means fresh.
    pub stale_components: Vec<String>,
}

impl SnapshotValidation {
    /// Whether every component is still current.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.stale_components.is_empty()
    }
}

/// Registers full reference snapshots and validates their freshness.
pub struct ReferenceSnapshotService<'t, 'a> {
    txn: &'t Txn<'a>,
    clock: &'a dyn Clock,
    current: IntentSnapshot,
}

impl<'t, 'a> ReferenceSnapshotService<'t, 'a> {
    /// Creates a snapshot service that validates against `current`
    /// reference versions.
    #[must_use]
    pub const fn new(txn: &'t Txn<'a>, clock: &'a dyn Clock, current: IntentSnapshot) -> Self {
        Self {
            txn,
            clock,
            current,
        }
    }

    /// Persists a snapshot of the current reference versions.
    #[must_use]
    pub fn take_snapshot(&self) -> ReferenceSnapshotRow {
        let row = ReferenceSnapshotRow {
            snapshot_id: SnapshotId::new(),
            coa_version: self.current.coa_version,
            dimension_schema_version: self.current.dimension_schema_version,
            rounding_policy_version: self.current.rounding_policy_version,
            currency_registry_version: self.current.currency_registry_version,
            taken_at: self.clock.now(),
        };
        self.txn.insert_reference_snapshot(row.clone());
        info!(snapshot_id = %row.snapshot_id, "reference_snapshot_taken");
        row
    }

    /// Looks up a persisted snapshot.
    #[must_use]
    pub fn get(&self, snapshot_id: SnapshotId) -> Option<ReferenceSnapshotRow> {
        self.txn.get_reference_snapshot(snapshot_id)
    }

    /// Compares a persisted snapshot against the current reference
    /// versions, listing every component that has drifted.
    #[must_use]
    pub fn validate_integrity(&self, snapshot: &ReferenceSnapshotRow) -> SnapshotValidation {
        let mut stale_components = Vec::new();
        if snapshot.coa_version != self.current.coa_version {
            stale_components.push("coa_version".to_string());
        }
        if snapshot.dimension_schema_version != self.current.dimension_schema_version {
            stale_components.push("dimension_schema_version".to_string());
        }
        if snapshot.rounding_policy_version != self.current.rounding_policy_version {
            stale_components.push("rounding_policy_version".to_string());
        }
        if snapshot.currency_registry_version != self.current.currency_registry_version {
            stale_components.push("currency_registry_version".to_string());
        }
        SnapshotValidation { stale_components }
    }
}
