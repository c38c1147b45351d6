//! Persisted row types.
//!
//! These mirror the logical table layout of the kernel: events, journal
//! entries and lines, audit events, fiscal periods, subledger period
//! status rows, reconciliation failure reports, exchange rates, and
//! reference snapshots. Subledger entries persist the domain
//! `SubledgerEntry` value directly.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use quill_core::journal::{EntryStatus, LineSide};
use quill_core::subledger::SubledgerType;
use quill_shared::types::{
    AccountId, ActorId, EventId, ExchangeRate, ExchangeRateId, JournalEntryId, JournalLineId,
    ReportId, SnapshotId,
};

/// A chart of accounts entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRow {
    /// Account identifier.
    pub id: AccountId,
    /// Chart of accounts code.
    pub code: String,
    /// Account name.
    pub name: String,
    /// Account classification, e.g. `asset`, `liability`.
    pub account_type: String,
    /// Which side increases the balance.
    pub normal_balance: LineSide,
    /// Whether the account accepts posting.
    pub is_active: bool,
}

/// An ingested business event. Unique on
/// `(producer, event_type, event_id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRow {
    /// Producer-scoped event identifier.
    pub event_id: EventId,
    /// Event type.
    pub event_type: String,
    /// When the event occurred.
    pub occurred_at: DateTime<Utc>,
    /// Accounting effective date.
    pub effective_date: NaiveDate,
    /// Who caused the event.
    pub actor_id: ActorId,
    /// Producing system.
    pub producer: String,
    /// Event payload.
    pub payload: Value,
    /// SHA-256 of the canonical payload serialization.
    pub payload_hash: String,
    /// Payload schema version.
    pub schema_version: u32,
    /// When the event was ingested.
    pub ingested_at: DateTime<Utc>,
}

/// A journal entry header. Unique on `idempotency_key` and on `seq`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntryRow {
    /// Entry identifier.
    pub id: JournalEntryId,
    /// Monotonic sequence, assigned at post.
    pub seq: Option<i64>,
    /// Idempotency key.
    pub idempotency_key: String,
    /// The business event this entry derives from.
    pub source_event_id: EventId,
    /// Event type of the source event.
    pub source_event_type: String,
    /// When the source event occurred.
    pub occurred_at: DateTime<Utc>,
    /// Accounting effective date.
    pub effective_date: NaiveDate,
    /// When the entry was posted.
    pub posted_at: Option<DateTime<Utc>>,
    /// Who posted the entry.
    pub actor_id: ActorId,
    /// Lifecycle status.
    pub status: EntryStatus,
    /// Entry description.
    pub description: Option<String>,
    /// Structured metadata; carries `ledger_id` among others.
    pub metadata: Option<Value>,
    /// Version of the posting rule that produced the entry.
    pub posting_rule_version: u32,
    /// For reversal entries, the entry being reversed.
    pub reversal_of_id: Option<JournalEntryId>,
    /// Chart of accounts version at post time.
    pub coa_version: Option<u32>,
    /// Dimension schema version at post time.
    pub dimension_schema_version: Option<u32>,
    /// Rounding policy version at post time.
    pub rounding_policy_version: Option<u32>,
    /// Currency registry version at post time.
    pub currency_registry_version: Option<u32>,
}

impl JournalEntryRow {
    /// The target ledger, read from metadata; `GL` when absent.
    #[must_use]
    pub fn ledger_id(&self) -> &str {
        self.metadata
            .as_ref()
            .and_then(|m| m.get("ledger_id"))
            .and_then(Value::as_str)
            .unwrap_or("GL")
    }
}

/// A journal line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalLineRow {
    /// Line identifier.
    pub id: JournalLineId,
    /// The entry this line belongs to.
    pub journal_entry_id: JournalEntryId,
    /// The account posted to.
    pub account_id: AccountId,
    /// Debit or credit.
    pub side: LineSide,
    /// Non-negative amount.
    pub amount: Decimal,
    /// ISO 4217 currency code.
    pub currency: String,
    /// Dimension values.
    pub dimensions: Option<BTreeMap<String, String>>,
    /// Whether this line carries a rounding remainder.
    pub is_rounding: bool,
    /// Line memo.
    pub line_memo: Option<String>,
    /// Exchange rate used, if any.
    pub exchange_rate_id: Option<ExchangeRateId>,
    /// Position within the entry.
    pub line_seq: u32,
}

/// A hash-chained audit event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEventRow {
    /// Monotonic position in the chain.
    pub seq: i64,
    /// Type of the entity the action applies to.
    pub entity_type: String,
    /// Identity of the entity.
    pub entity_id: String,
    /// What happened.
    pub action: String,
    /// Hash of the action payload.
    pub payload_hash: String,
    /// Hash of the previous chain event; `None` for the genesis event.
    pub prev_hash: Option<String>,
    /// Hash over the canonical field sequence.
    pub hash: String,
    /// When the event was recorded.
    pub recorded_at: DateTime<Utc>,
}

/// Fiscal period lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodStatus {
    /// Open for posting.
    Open,
    /// Closed; structural fields locked.
    Closed,
}

/// A fiscal period. Period date ranges may not overlap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FiscalPeriodRow {
    /// Globally unique period code, e.g. `2026-01`.
    pub period_code: String,
    /// Period name.
    pub name: String,
    /// First day of the period.
    pub start_date: NaiveDate,
    /// Last day of the period.
    pub end_date: NaiveDate,
    /// Lifecycle status.
    pub status: PeriodStatus,
    /// Whether adjustment entries may post after close.
    pub allows_adjustments: bool,
    /// When the period was closed.
    pub closed_at: Option<DateTime<Utc>>,
    /// Who closed the period.
    pub closed_by_id: Option<ActorId>,
}

impl FiscalPeriodRow {
    /// Whether `date` falls inside this period.
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }
}

/// Subledger period close lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubledgerPeriodState {
    /// Not yet closed.
    Open,
    /// Close in progress; reconciliation running.
    Reconciling,
    /// Closed.
    Closed,
}

/// Close status of one subledger for one period. Unique on
/// `(subledger_type, period_code)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubledgerPeriodStatusRow {
    /// Which subledger.
    pub subledger_type: SubledgerType,
    /// Fiscal period code.
    pub period_code: String,
    /// Close lifecycle state.
    pub status: SubledgerPeriodState,
    /// When the subledger period was closed.
    pub closed_at: Option<DateTime<Utc>>,
    /// Who closed it.
    pub closed_by: Option<ActorId>,
    /// Failure report from the last blocked close attempt.
    pub reconciliation_report_id: Option<ReportId>,
}

/// Persisted record of a blocked subledger period close.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationFailureReportRow {
    /// Report identifier.
    pub id: ReportId,
    /// Which subledger failed to reconcile.
    pub subledger_type: SubledgerType,
    /// Fiscal period code.
    pub period_code: String,
    /// GL control account balance at period end.
    pub gl_control_balance: Decimal,
    /// Subledger aggregate balance at period end.
    pub sl_aggregate_balance: Decimal,
    /// `sl_aggregate_balance - gl_control_balance`.
    pub delta_amount: Decimal,
    /// Currency of the balances.
    pub currency: String,
    /// When the reconciliation ran.
    pub checked_at: DateTime<Utc>,
}

/// A stored exchange rate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeRateRow {
    /// Rate identifier.
    pub id: ExchangeRateId,
    /// The rate itself.
    pub rate: ExchangeRate,
    /// Date the rate is effective from.
    pub effective_date: NaiveDate,
}

/// A persisted full reference snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceSnapshotRow {
    /// Snapshot identifier.
    pub snapshot_id: SnapshotId,
    /// Chart of accounts version.
    pub coa_version: u32,
    /// Dimension schema version.
    pub dimension_schema_version: u32,
    /// Rounding policy version.
    pub rounding_policy_version: u32,
    /// Currency registry version.
    pub currency_registry_version: u32,
    /// When the snapshot was taken.
    pub taken_at: DateTime<Utc>,
}
