//! Construct-once DI container for the posting pipeline.
//!
//! The orchestrator exclusively owns its service set: every kernel
//! service is constructed exactly once, in dependency order, against one
//! transaction scope and one clock. No service constructs another
//! service. It also drives the full event posting pipeline: ingest,
//! period gate, bookkeeper proposal, intent construction, journal write,
//! and subledger bridging.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use quill_core::clock::Clock;
use quill_core::event::EventEnvelope;
use quill_core::intent::{AccountingIntent, IntentLine, IntentSnapshot, LedgerIntent};
use quill_core::journal::{ProposedJournalEntry, ReferenceData, ValidationError, ValidationResult};
use quill_core::policy::{build_subledger_registry, CompiledPolicyPack};
use quill_core::strategy::{Bookkeeper, StrategyRegistry};
use quill_core::subledger::{SubledgerEntry, SubledgerError, SubledgerType};
use quill_shared::types::{ActorId, EconEventId, EventId, JournalEntryId};

use super::auditor::AuditorService;
use super::ingestor::{IngestError, IngestorService};
use super::journal_writer::{
    JournalWriteResult, JournalWriter, RoleResolver, WriteError, WriteStatus, WrittenEntry,
};
use super::period::{PeriodError, PeriodService};
use super::sequence::SequenceService;
use super::snapshot::ReferenceSnapshotService;
use super::subledger::{SubledgerService, SubledgerServiceError};
use super::subledger_period::SubledgerPeriodService;
use crate::entities::JournalEntryRow;
use crate::memory::Txn;

/// Convention-based entity ID payload fields per subledger type.
const ENTITY_ID_FIELDS: &[(SubledgerType, &[&str])] = &[
    (SubledgerType::Ap, &["vendor_id", "supplier_id"]),
    (SubledgerType::Ar, &["customer_id"]),
    (
        SubledgerType::Inventory,
        &["item_id", "sku", "inventory_item_id"],
    ),
    (SubledgerType::Bank, &["bank_account_id", "account_id"]),
    (SubledgerType::Wip, &["contract_id"]),
];

/// Pipeline errors surfaced to the caller, who owns the rollback
/// decision.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Ingestion failure.
    #[error(transparent)]
    Ingest(#[from] IngestError),

    /// Fiscal period gate failure.
    #[error(transparent)]
    Period(#[from] PeriodError),

    /// Journal write failure that must roll back the scope.
    #[error(transparent)]
    Write(#[from] WriteError),

    /// Subledger posting failure that must roll back the scope.
    #[error(transparent)]
    Subledger(#[from] SubledgerServiceError),

    /// The compiled pack's subledger contracts failed to build.
    #[error(transparent)]
    Config(#[from] SubledgerError),
}

impl OrchestratorError {
    /// Returns the machine-readable error code.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Ingest(inner) => inner.error_code(),
            Self::Period(inner) => inner.error_code(),
            Self::Write(inner) => inner.error_code(),
            Self::Subledger(inner) => inner.error_code(),
            Self::Config(inner) => inner.error_code(),
        }
    }
}

/// Outcome of the full [`PostingOrchestrator::post_event`] pipeline.
#[derive(Debug, Clone)]
pub struct PostEventResult {
    /// Write status; `ValidationFailed` when the proposal was rejected.
    pub status: WriteStatus,
    /// Written (or pre-existing) entries.
    pub entries: Vec<WrittenEntry>,
    /// Validation outcome carrying typed error codes on rejection.
    pub validation: ValidationResult,
    /// Strategy version used, when a proposal was produced.
    pub strategy_version: Option<u32>,
}

impl PostEventResult {
    /// Whether entries were written or already existed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self.status, WriteStatus::Written | WriteStatus::AlreadyExists)
    }
}

/// Central factory and pipeline driver for kernel services.
pub struct PostingOrchestrator<'t, 'a> {
    txn: &'t Txn<'a>,
    clock: &'a dyn Clock,
    strategy_registry: &'a StrategyRegistry,
    /// Role-to-account resolution, shared with the writer.
    pub role_resolver: RoleResolver,
    /// Audit chain service.
    pub auditor: AuditorService<'t, 'a>,
    /// Fiscal period lifecycle.
    pub period_service: PeriodService<'t, 'a>,
    /// Sequence allocation.
    pub sequence_service: SequenceService<'t, 'a>,
    /// Reference snapshot persistence and freshness.
    pub snapshot_service: ReferenceSnapshotService<'t, 'a>,
    /// Event ingestion.
    pub ingestor: IngestorService<'t, 'a>,
    /// Journal posting.
    pub journal_writer: JournalWriter<'t, 'a>,
    /// Subledger services keyed by type.
    pub subledger_services: HashMap<SubledgerType, SubledgerService<'t, 'a>>,
    /// Subledger period close, when the pack defines contracts.
    pub subledger_period_service: Option<SubledgerPeriodService<'t, 'a>>,
}

impl<'t, 'a> PostingOrchestrator<'t, 'a> {
    /// Wires every kernel service against one scope, pack, and clock.
    ///
    /// # Errors
    ///
    /// Returns `OrchestratorError::Config` when the pack's subledger
    /// contract definitions fail to compile.
    pub fn new(
        txn: &'t Txn<'a>,
        clock: &'a dyn Clock,
        strategy_registry: &'a StrategyRegistry,
        pack: &CompiledPolicyPack,
        role_resolver: RoleResolver,
        current_versions: IntentSnapshot,
    ) -> Result<Self, OrchestratorError> {
        // Foundational services first, then the writer, then the
        // subledger layer that depends on both.
        let auditor = AuditorService::new(txn, clock);
        let period_service = PeriodService::new(txn, clock);
        let sequence_service = SequenceService::new(txn);
        let snapshot_service = ReferenceSnapshotService::new(txn, clock, current_versions);
        let ingestor = IngestorService::new(txn, clock);

        let control_registry = if pack.subledger_contracts.is_empty() {
            None
        } else {
            Some(build_subledger_registry(pack)?)
        };

        let mut journal_writer = JournalWriter::new(txn, clock, role_resolver.clone())
            .with_snapshot_service(ReferenceSnapshotService::new(txn, clock, current_versions));
        if let Some(registry) = &control_registry {
            journal_writer = journal_writer.with_control_registry(registry.clone());
        }

        let mut subledger_services = HashMap::new();
        subledger_services.insert(SubledgerType::Ap, SubledgerService::ap(txn, clock));
        subledger_services.insert(SubledgerType::Ar, SubledgerService::ar(txn, clock));
        subledger_services.insert(SubledgerType::Bank, SubledgerService::bank(txn, clock));
        subledger_services.insert(
            SubledgerType::Inventory,
            SubledgerService::inventory(txn, clock),
        );
        subledger_services.insert(SubledgerType::Wip, SubledgerService::contract(txn, clock));

        let subledger_period_service = control_registry.map(|registry| {
            SubledgerPeriodService::new(txn, clock, registry, role_resolver.clone())
        });

        Ok(Self {
            txn,
            clock,
            strategy_registry,
            role_resolver,
            auditor,
            period_service,
            sequence_service,
            snapshot_service,
            ingestor,
            journal_writer,
            subledger_services,
            subledger_period_service,
        })
    }

    /// The transaction scope shared by all services.
    #[must_use]
    pub fn txn(&self) -> &'t Txn<'a> {
        self.txn
    }

    /// The clock shared by all services.
    #[must_use]
    pub fn clock(&self) -> &'a dyn Clock {
        self.clock
    }

    /// Drives the full posting pipeline for one event.
    ///
    /// Ingests the event idempotently, gates on the fiscal period,
    /// invokes the bookkeeper, converts the proposal into a GL accounting
    /// intent, writes it, and bridges any subledger intents. Proposal and
    /// write validation failures come back in the result; everything that
    /// must roll back the scope comes back as an error.
    ///
    /// # Errors
    ///
    /// Returns ingestion failures, period gate failures
    /// (`CLOSED_PERIOD`, `ADJUSTMENTS_NOT_ALLOWED`), and write failures
    /// that abort the scope.
    pub fn post_event(
        &self,
        event: &EventEnvelope,
        reference: &ReferenceData,
        is_adjustment: bool,
        strategy_version: Option<u32>,
    ) -> Result<PostEventResult, OrchestratorError> {
        self.ingestor.ingest(event)?;
        self.period_service
            .validate_posting(event.effective_date, is_adjustment)?;

        let bookkeeper = Bookkeeper::new(self.strategy_registry);
        let proposal = bookkeeper.propose(event, reference, strategy_version);
        let Some(proposed_entry) = proposal.proposed_entry else {
            info!(
                event_type = %event.event_type,
                error_count = proposal.validation.errors.len(),
                "post_event_rejected"
            );
            return Ok(PostEventResult {
                status: WriteStatus::ValidationFailed,
                entries: Vec::new(),
                validation: proposal.validation,
                strategy_version: None,
            });
        };

        let intent = Self::intent_from_proposal(event, &proposed_entry);
        let write_result = self
            .journal_writer
            .write(&intent, event.actor_id, &event.event_type)?;

        if write_result.is_success() {
            self.post_subledger_entries(
                &intent,
                &write_result,
                event.event_id,
                &event.event_type,
                &event.payload,
                event.actor_id,
            )?;
        }

        let validation = match (&write_result.error_code, &write_result.error_message) {
            (Some(code), Some(message)) => {
                ValidationResult::failure(vec![ValidationError::new(code, message)])
            }
            _ => ValidationResult::success(),
        };

        Ok(PostEventResult {
            status: write_result.status,
            entries: write_result.entries,
            validation,
            strategy_version: proposal.strategy_version,
        })
    }

    /// Writes a pre-built accounting intent, bridging subledger intents
    /// on success.
    ///
    /// # Errors
    ///
    /// Returns write failures that abort the scope.
    pub fn post_intent(
        &self,
        intent: &AccountingIntent,
        event_type: &str,
        payload: &Value,
        actor_id: ActorId,
    ) -> Result<JournalWriteResult, OrchestratorError> {
        let result = self.journal_writer.write(intent, actor_id, event_type)?;
        if result.is_success() {
            self.post_subledger_entries(
                intent,
                &result,
                intent.source_event_id,
                event_type,
                payload,
                actor_id,
            )?;
        }
        Ok(result)
    }

    /// Reverses a posted entry within the fiscal period gate.
    ///
    /// # Errors
    ///
    /// Returns period gate failures for the reversal's effective date and
    /// reversal failures from the writer.
    pub fn reverse_entry(
        &self,
        original_entry_id: JournalEntryId,
        source_event_id: EventId,
        actor_id: ActorId,
        effective_date: NaiveDate,
        reason: &str,
        expected_ledger_id: Option<&str>,
    ) -> Result<JournalEntryRow, OrchestratorError> {
        self.period_service.validate_posting(effective_date, false)?;
        let reversal = self.journal_writer.write_reversal(
            original_entry_id,
            source_event_id,
            actor_id,
            effective_date,
            reason,
            "system.reversal",
            expected_ledger_id,
        )?;
        Ok(reversal)
    }

    /// Bridges journal write results into the subledger services.
    ///
    /// For each ledger intent naming a subledger type: look up the
    /// service and the journal entry written for that ledger, resolve the
    /// entity ID from the payload by convention, and post one subledger
    /// entry per intent line. Unrecognized ledgers are skipped; a missing
    /// service, journal entry, or entity ID is logged and skipped. Runs
    /// in the same scope as the journal write, so a failure here rolls
    /// back the entire posting.
    ///
    /// # Errors
    ///
    /// Returns subledger validation failures.
    pub fn post_subledger_entries(
        &self,
        intent: &AccountingIntent,
        write_result: &JournalWriteResult,
        event_id: EventId,
        event_type: &str,
        payload: &Value,
        actor_id: ActorId,
    ) -> Result<(), OrchestratorError> {
        let entry_id_by_ledger: HashMap<&str, JournalEntryId> = write_result
            .entries
            .iter()
            .map(|e| (e.ledger_id.as_str(), e.entry_id))
            .collect();
        let source_doc_type = derive_source_document_type(event_type);

        for ledger_intent in &intent.ledger_intents {
            let Ok(sl_type) = ledger_intent.ledger_id.parse::<SubledgerType>() else {
                continue;
            };
            let Some(service) = self.subledger_services.get(&sl_type) else {
                continue;
            };
            let Some(&journal_entry_id) = entry_id_by_ledger.get(ledger_intent.ledger_id.as_str())
            else {
                warn!(
                    subledger_type = %sl_type,
                    event_id = %event_id,
                    "subledger_no_journal_entry"
                );
                continue;
            };
            let Some(entity_id) = resolve_entity_id(sl_type, payload) else {
                warn!(
                    subledger_type = %sl_type,
                    event_id = %event_id,
                    "subledger_entity_id_missing"
                );
                continue;
            };

            for (line_idx, line) in ledger_intent.lines.iter().enumerate() {
                let mut entry = SubledgerEntry::new(
                    sl_type,
                    entity_id.clone(),
                    source_doc_type.clone(),
                    event_id.to_string(),
                    matches!(line.side, quill_core::journal::LineSide::Debit)
                        .then(|| line.money.clone()),
                    matches!(line.side, quill_core::journal::LineSide::Credit)
                        .then(|| line.money.clone()),
                    intent.effective_date,
                )
                .map_err(SubledgerServiceError::Domain)?;
                entry.source_line_id = Some(line_idx.to_string());
                entry.memo = line.memo.clone().unwrap_or_default();
                entry.dimensions = line.dimensions.clone().unwrap_or_default();

                service.post(entry, journal_entry_id, actor_id)?;
                info!(
                    subledger_type = %sl_type,
                    entity_id = entity_id,
                    side = %line.side,
                    amount = %line.money.amount,
                    currency = line.currency(),
                    event_id = %event_id,
                    "subledger_entry_posted"
                );
            }
        }
        Ok(())
    }

    /// Converts a strategy proposal into a single-ledger GL intent.
    ///
    /// Account codes become roles; the writer's resolver carries an
    /// identity binding for every chart account, so resolution round
    /// trips. The economic event ID is derived from the source event so
    /// replays produce the same idempotency key.
    fn intent_from_proposal(
        event: &EventEnvelope,
        proposed: &ProposedJournalEntry,
    ) -> AccountingIntent {
        let lines = proposed
            .lines
            .iter()
            .map(|line| {
                let mut intent_line =
                    IntentLine::new(line.account_code.clone(), line.side, line.money.clone())
                        .expect("proposed line amounts are non-negative");
                intent_line.dimensions = line.dimensions.clone();
                intent_line.memo = line.memo.clone();
                intent_line.is_rounding = line.is_rounding;
                intent_line
            })
            .collect();

        let ledger_intent =
            LedgerIntent::new("GL", lines).expect("proposed entries are non-empty");
        let mut intent = AccountingIntent::new(
            EconEventId::from_uuid(event.event_id.into_inner()),
            event.event_id,
            event.event_type.clone(),
            proposed.posting_rule_version,
            event.effective_date,
            vec![ledger_intent],
            IntentSnapshot::new(
                proposed.coa_version,
                proposed.dimension_schema_version,
                proposed.rounding_policy_version,
                proposed.currency_registry_version,
            ),
        )
        .expect("single ledger intent is non-empty");
        intent.description = proposed.description.clone();
        intent.created_at = Some(event.occurred_at);
        intent.metadata = proposed.metadata.clone();
        intent
    }
}

/// Derives the subledger source document type from an event type:
/// `ap.invoice` becomes `INVOICE`.
fn derive_source_document_type(event_type: &str) -> String {
    event_type
        .rsplit('.')
        .next()
        .unwrap_or(event_type)
        .to_uppercase()
}

/// Resolves the subledger entity ID from the payload by convention.
fn resolve_entity_id(subledger_type: SubledgerType, payload: &Value) -> Option<String> {
    let fields = ENTITY_ID_FIELDS
        .iter()
        .find(|(t, _)| *t == subledger_type)
        .map(|(_, fields)| *fields)?;
    fields
        .iter()
        .find_map(|field| payload.get(field).and_then(Value::as_str))
        .map(ToString::to_string)
}
