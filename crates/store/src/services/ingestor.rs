//! Idempotent event ingestion.
//!
//! Events are the entry point of the posting pipeline. Ingestion is
//! idempotent on `(producer, event_type, event_id)`: the same triple may
//! be submitted many times and yields the stored row, but a re-submission
//! whose payload hash differs is rejected -- the triple names exactly one
//! payload, forever.

use thiserror::Error;
use tracing::{info, warn};

use quill_core::clock::Clock;
use quill_core::event::EventEnvelope;
use quill_shared::types::EventId;

use super::auditor::AuditorService;
use crate::entities::EventRow;
use crate::memory::Txn;

/// Highest payload schema version this kernel understands.
pub const SUPPORTED_SCHEMA_VERSION: u32 = 1;

/// Ingestion errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IngestError {
    /// Lookup of an event that was never ingested.
    #[error("Event not found: {0}")]
    EventNotFound(EventId),

    /// Strict ingestion saw an already-ingested triple.
    #[error("Event already exists: {0}")]
    EventAlreadyExists(String),

    /// A re-submitted triple carried a different payload.
    #[error("Payload mismatch for {key}: stored hash {stored}, submitted hash {submitted}")]
    PayloadMismatch {
        /// The idempotency triple.
        key: String,
        /// Hash already on record.
        stored: String,
        /// Hash of the conflicting submission.
        submitted: String,
    },

    /// The payload schema version is newer than this kernel supports.
    #[error("Unsupported schema version {0} (max {SUPPORTED_SCHEMA_VERSION})")]
    UnsupportedSchemaVersion(u32),
}

impl IngestError {
    /// Returns the machine-readable error code.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::EventNotFound(_) => "EVENT_NOT_FOUND",
            Self::EventAlreadyExists(_) => "EVENT_ALREADY_EXISTS",
            Self::PayloadMismatch { .. } => "PAYLOAD_MISMATCH",
            Self::UnsupportedSchemaVersion(_) => "UNSUPPORTED_SCHEMA_VERSION",
        }
    }
}

/// Outcome of an idempotent ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// The event row was created.
    Created,
    /// The triple was already on record with a matching payload.
    AlreadyExists,
}

/// Validates and persists incoming events.
pub struct IngestorService<'t, 'a> {
    txn: &'t Txn<'a>,
    clock: &'a dyn Clock,
    auditor: AuditorService<'t, 'a>,
}

impl<'t, 'a> IngestorService<'t, 'a> {
    /// Creates an ingestor over a scope.
    #[must_use]
    pub fn new(txn: &'t Txn<'a>, clock: &'a dyn Clock) -> Self {
        Self {
            txn,
            clock,
            auditor: AuditorService::new(txn, clock),
        }
    }

    /// Ingests an event idempotently.
    ///
    /// # Errors
    ///
    /// Returns `IngestError::UnsupportedSchemaVersion` for a payload
    /// schema this kernel does not understand, or
    /// `IngestError::PayloadMismatch` when the triple exists with a
    /// different payload hash.
    pub fn ingest(
        &self,
        envelope: &EventEnvelope,
    ) -> Result<(EventRow, IngestOutcome), IngestError> {
        if envelope.schema_version > SUPPORTED_SCHEMA_VERSION {
            return Err(IngestError::UnsupportedSchemaVersion(
                envelope.schema_version,
            ));
        }

        if let Some(existing) =
            self.txn
                .find_event(&envelope.producer, &envelope.event_type, envelope.event_id)
        {
            if existing.payload_hash != envelope.payload_hash {
                warn!(
                    key = %envelope.idempotency_key(),
                    "event_payload_mismatch"
                );
                return Err(IngestError::PayloadMismatch {
                    key: envelope.idempotency_key(),
                    stored: existing.payload_hash,
                    submitted: envelope.payload_hash.clone(),
                });
            }
            info!(key = %envelope.idempotency_key(), "event_ingest_idempotent");
            return Ok((existing, IngestOutcome::AlreadyExists));
        }

        let row = EventRow {
            event_id: envelope.event_id,
            event_type: envelope.event_type.clone(),
            occurred_at: envelope.occurred_at,
            effective_date: envelope.effective_date,
            actor_id: envelope.actor_id,
            producer: envelope.producer.clone(),
            payload: envelope.payload.clone(),
            payload_hash: envelope.payload_hash.clone(),
            schema_version: envelope.schema_version,
            ingested_at: self.clock.now(),
        };
        self.txn
            .insert_event(row.clone())
            .expect("existence checked under the scope lock");

        self.auditor.record(
            "event",
            &envelope.event_id.to_string(),
            "ingested",
            &envelope.payload,
        );
        info!(key = %envelope.idempotency_key(), "event_ingested");
        Ok((row, IngestOutcome::Created))
    }

    /// Ingests an event, failing when the triple already exists.
    ///
    /// # Errors
    ///
    /// Returns `IngestError::EventAlreadyExists` for a known triple, plus
    /// everything [`IngestorService::ingest`] can return.
    pub fn ingest_new(&self, envelope: &EventEnvelope) -> Result<EventRow, IngestError> {
        match self.ingest(envelope)? {
            (row, IngestOutcome::Created) => Ok(row),
            (_, IngestOutcome::AlreadyExists) => {
                Err(IngestError::EventAlreadyExists(envelope.idempotency_key()))
            }
        }
    }

    /// Looks up an ingested event.
    ///
    /// # Errors
    ///
    /// Returns `IngestError::EventNotFound` when no such event was
    /// ingested.
    pub fn get_event(&self, event_id: EventId) -> Result<EventRow, IngestError> {
        self.txn
            .get_event(event_id)
            .ok_or(IngestError::EventNotFound(event_id))
    }
}
