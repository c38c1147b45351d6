//! Pure domain representation of an ingested business event.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use quill_shared::types::{ActorId, EventId};

use super::hash::payload_hash;

/// Immutable envelope around a business event.
///
/// This is the input to the posting pipeline. Strategies receive it by
/// shared reference, so the payload cannot be mutated by a strategy -- the
/// envelope is frozen at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Producer-scoped event identifier.
    pub event_id: EventId,
    /// Event type, e.g. `ap.invoice_received`.
    pub event_type: String,
    /// When the event occurred in the source system.
    pub occurred_at: DateTime<Utc>,
    /// Accounting effective date.
    pub effective_date: NaiveDate,
    /// Who caused the event.
    pub actor_id: ActorId,
    /// Producing system, e.g. `erp`.
    pub producer: String,
    /// Event payload as structured JSON.
    pub payload: Value,
    /// SHA-256 of the canonical payload serialization.
    pub payload_hash: String,
    /// Payload schema version.
    pub schema_version: u32,
}

impl EventEnvelope {
    /// Creates an envelope, computing the payload hash.
    #[must_use]
    pub fn new(
        event_id: EventId,
        event_type: impl Into<String>,
        occurred_at: DateTime<Utc>,
        effective_date: NaiveDate,
        actor_id: ActorId,
        producer: impl Into<String>,
        payload: Value,
    ) -> Self {
        let hash = payload_hash(&payload);
        Self {
            event_id,
            event_type: event_type.into(),
            occurred_at,
            effective_date,
            actor_id,
            producer: producer.into(),
            payload,
            payload_hash: hash,
            schema_version: 1,
        }
    }

    /// Sets the schema version.
    #[must_use]
    pub fn with_schema_version(mut self, schema_version: u32) -> Self {
        self.schema_version = schema_version;
        self
    }

    /// The idempotency key for this event: `producer:event_type:event_id`.
    #[must_use]
    pub fn idempotency_key(&self) -> String {
        format!("{}:{}:{}", self.producer, self.event_type, self.event_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn envelope(payload: Value) -> EventEnvelope {
        EventEnvelope::new(
            EventId::new(),
            "ap.invoice_received",
            Utc.with_ymd_and_hms(2026, 6, 15, 12, 0, 0).unwrap(),
            NaiveDate::from_ymd_opt(2026, 6, 15).unwrap(),
            ActorId::new(),
            "erp",
            payload,
        )
    }

    #[test]
    fn test_hash_computed_at_construction() {
        let env = envelope(json!({"amount": "1000.00", "currency": "USD"}));
        assert_eq!(env.payload_hash, payload_hash(&env.payload));
    }

    #[test]
    fn test_idempotency_key_format() {
        let env = envelope(json!({}));
        assert_eq!(
            env.idempotency_key(),
            format!("erp:ap.invoice_received:{}", env.event_id)
        );
    }

    #[test]
    fn test_schema_version_defaults_to_one() {
        let env = envelope(json!({}));
        assert_eq!(env.schema_version, 1);
        assert_eq!(env.with_schema_version(3).schema_version, 3);
    }
}
