//! Hash-linked append-only audit chain.
//!
//! Every state change in the kernel is recorded as an audit event whose
//! hash covers the previous event's hash, forming a tamper-evident chain:
//! `hash = SHA-256(entity_type|entity_id|action|payload_hash|prev)` where
//! `prev` is the previous hash or the literal `GENESIS` for the first
//! event.

use serde_json::Value;
use thiserror::Error;
use tracing::info;

use quill_core::clock::Clock;
use quill_core::event::hash::{payload_hash, sha256_hex};

use super::sequence::SequenceService;
use crate::entities::AuditEventRow;
use crate::memory::Txn;

/// Sentinel previous-hash for the first event of the chain.
pub const GENESIS: &str = "GENESIS";

/// Audit chain validation errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuditError {
    /// The chain failed to re-verify: a hash or linkage mismatch is
    /// tamper evidence.
    #[error("Audit chain broken at seq {seq}: {reason}")]
    ChainBroken {
        /// Sequence of the first bad event.
        seq: i64,
        /// What failed to verify.
        reason: String,
    },
}

impl AuditError {
    /// Returns the machine-readable error code.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::ChainBroken { .. } => "AUDIT_CHAIN_BROKEN",
        }
    }
}

/// Appends to and validates the audit chain.
pub struct AuditorService<'t, 'a> {
    txn: &'t Txn<'a>,
    clock: &'a dyn Clock,
    sequences: SequenceService<'t, 'a>,
}

impl<'t, 'a> AuditorService<'t, 'a> {
    /// Creates an auditor over a scope.
    #[must_use]
    pub fn new(txn: &'t Txn<'a>, clock: &'a dyn Clock) -> Self {
        Self {
            txn,
            clock,
            sequences: SequenceService::new(txn),
        }
    }

    /// Computes the chain hash over the canonical field sequence.
    #[must_use]
    pub fn chain_hash(
        entity_type: &str,
        entity_id: &str,
        action: &str,
        payload_hash: &str,
        prev_hash: Option<&str>,
    ) -> String {
        let prev = prev_hash.unwrap_or(GENESIS);
        sha256_hex(format!("{entity_type}|{entity_id}|{action}|{payload_hash}|{prev}").as_bytes())
    }

    /// Records an audit event, linking it to the current chain tail.
    ///
    /// The tail is selected under the scope's store lock, so concurrent
    /// appends serialize; the event's payload is hashed canonically.
    pub fn record(
        &self,
        entity_type: &str,
        entity_id: &str,
        action: &str,
        payload: &Value,
    ) -> AuditEventRow {
        let prev_hash = self.txn.last_audit_event().map(|e| e.hash);
        let payload_hash = payload_hash(payload);
        let hash = Self::chain_hash(
            entity_type,
            entity_id,
            action,
            &payload_hash,
            prev_hash.as_deref(),
        );
        let event = AuditEventRow {
            seq: self.sequences.next_value(SequenceService::AUDIT_EVENT),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            action: action.to_string(),
            payload_hash,
            prev_hash,
            hash,
            recorded_at: self.clock.now(),
        };

        info!(
            seq = event.seq,
            entity_type = entity_type,
            entity_id = entity_id,
            action = action,
            "audit_event_recorded"
        );
        self.txn.insert_audit_event(event.clone());
        event
    }

    /// Walks the whole chain in `seq` order, recomputing every hash and
    /// verifying `prev_hash` linkage.
    ///
    /// # Errors
    ///
    /// Returns `AuditError::ChainBroken` at the first event that fails to
    /// re-verify.
    pub fn verify_chain(&self) -> Result<usize, AuditError> {
        let events = self.txn.audit_events();
        let mut prev: Option<&AuditEventRow> = None;

        for event in &events {
            let expected_prev = prev.map(|p| p.hash.clone());
            if event.prev_hash != expected_prev {
                return Err(AuditError::ChainBroken {
                    seq: event.seq,
                    reason: "prev_hash does not match the preceding event".to_string(),
                });
            }
            let recomputed = Self::chain_hash(
                &event.entity_type,
                &event.entity_id,
                &event.action,
                &event.payload_hash,
                event.prev_hash.as_deref(),
            );
            if recomputed != event.hash {
                return Err(AuditError::ChainBroken {
                    seq: event.seq,
                    reason: "hash does not match recomputation".to_string(),
                });
            }
            prev = Some(event);
        }

        Ok(events.len())
    }

    /// Follows `prev_hash` links from the latest event for `entity_id`
    /// back to genesis.
    #[must_use]
    pub fn trace(&self, entity_id: &str) -> Vec<AuditEventRow> {
        let events = self.txn.audit_events();
        let Some(start) = events.iter().rev().find(|e| e.entity_id == entity_id) else {
            return Vec::new();
        };

        let mut chain = vec![start.clone()];
        let mut cursor = start.prev_hash.clone();
        while let Some(prev_hash) = cursor {
            let Some(previous) = events.iter().find(|e| e.hash == prev_hash) else {
                break;
            };
            chain.push(previous.clone());
            cursor = previous.prev_hash.clone();
        }
        chain
    }
}
