//! Atomic multi-ledger journal posting.
//!
//! `JournalWriter::write` turns an `AccountingIntent` into posted journal
//! entries, one per target ledger, all inside the caller's transaction
//! scope: balance validation per ledger per currency, role resolution,
//! idempotency partitioning, rounding and snapshot invariants, monotonic
//! sequence allocation, subledger control enforcement, and snapshot
//! freshness. Expected failures come back as a typed result; only
//! violations that must abort the whole scope (blocking subledger
//! reconciliation, stale snapshots, store guard trips) are returned as
//! errors for the caller to roll back on.

use std::collections::HashMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde_json::json;
use thiserror::Error;
use tracing::{error, info, warn};

use quill_core::clock::Clock;
use quill_core::intent::{AccountingIntent, LedgerIntent, ResolvedIntentLine};
use quill_core::journal::{EntryStatus, LineSide, ReferenceData};
use quill_core::policy::CompiledPolicyPack;
use quill_core::strategy::proposal::rounding_threshold;
use quill_core::subledger::{SubledgerControlRegistry, SubledgerReconciler, SubledgerType};
use quill_shared::types::{
    AccountId, ActorId, EventId, JournalEntryId, JournalLineId, Money,
};

use super::auditor::AuditorService;
use super::sequence::SequenceService;
use super::snapshot::ReferenceSnapshotService;
use crate::entities::{JournalEntryRow, JournalLineRow};
use crate::error::StoreError;
use crate::memory::Txn;

/// Status of a write operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStatus {
    /// New entries were written.
    Written,
    /// Every target ledger already had its entry; idempotent success.
    AlreadyExists,
    /// One or more roles could not be resolved.
    RoleResolutionFailed,
    /// An invariant failed validation.
    ValidationFailed,
    /// A non-validation failure, e.g. an unresolvable insert conflict.
    Failed,
}

/// A successfully written journal entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenEntry {
    /// Entry identifier.
    pub entry_id: JournalEntryId,
    /// Target ledger.
    pub ledger_id: String,
    /// Assigned sequence.
    pub seq: i64,
    /// Idempotency key of the entry.
    pub idempotency_key: String,
}

/// Result of a [`JournalWriter::write`] operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalWriteResult {
    /// Outcome status.
    pub status: WriteStatus,
    /// Written (or pre-existing) entries.
    pub entries: Vec<WrittenEntry>,
    /// Machine-readable error code on failure.
    pub error_code: Option<String>,
    /// Human-readable message on failure.
    pub error_message: Option<String>,
    /// Roles that failed to resolve.
    pub unresolved_roles: Option<Vec<String>>,
}

impl JournalWriteResult {
    /// A successful write.
    #[must_use]
    pub fn success(entries: Vec<WrittenEntry>) -> Self {
        Self {
            status: WriteStatus::Written,
            entries,
            error_code: None,
            error_message: None,
            unresolved_roles: None,
        }
    }

    /// An idempotent success: everything already existed.
    #[must_use]
    pub fn already_exists(entries: Vec<WrittenEntry>) -> Self {
        Self {
            status: WriteStatus::AlreadyExists,
            entries,
            error_code: None,
            error_message: None,
            unresolved_roles: None,
        }
    }

    /// A role resolution failure listing the unresolved roles.
    #[must_use]
    pub fn role_resolution_failed(roles: Vec<String>, message: impl Into<String>) -> Self {
        Self {
            status: WriteStatus::RoleResolutionFailed,
            entries: Vec::new(),
            error_code: Some("ROLE_RESOLUTION_FAILED".to_string()),
            error_message: Some(message.into()),
            unresolved_roles: Some(roles),
        }
    }

    /// A validation failure with a typed code.
    #[must_use]
    pub fn validation_failed(error_code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: WriteStatus::ValidationFailed,
            entries: Vec::new(),
            error_code: Some(error_code.into()),
            error_message: Some(message.into()),
            unresolved_roles: None,
        }
    }

    /// A general failure with a typed code.
    #[must_use]
    pub fn failure(error_code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: WriteStatus::Failed,
            entries: Vec::new(),
            error_code: Some(error_code.into()),
            error_message: Some(message.into()),
            unresolved_roles: None,
        }
    }

    /// Whether the operation succeeded, including idempotent success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self.status, WriteStatus::Written | WriteStatus::AlreadyExists)
    }

    /// All entry IDs in the result.
    #[must_use]
    pub fn entry_ids(&self) -> Vec<JournalEntryId> {
        self.entries.iter().map(|e| e.entry_id).collect()
    }
}

/// Errors that abort the whole transaction scope.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WriteError {
    /// A blocking subledger control violation; the posting must not
    /// survive.
    #[error("Subledger reconciliation failed for ledger '{ledger_id}': {violations:?}")]
    SubledgerReconciliation {
        /// Ledger whose control check failed.
        ledger_id: String,
        /// Violation messages.
        violations: Vec<String>,
    },

    /// The intent's reference snapshot is no longer current.
    #[error("Reference snapshot is stale: {stale_components:?}")]
    StaleReferenceSnapshot {
        /// Components that drifted.
        stale_components: Vec<String>,
    },

    /// An entry reached finalization without all four snapshot versions.
    #[error("Entry {entry_id} is missing reference snapshot fields: {missing_fields:?}")]
    MissingReferenceSnapshot {
        /// The offending entry.
        entry_id: JournalEntryId,
        /// Snapshot columns that are null.
        missing_fields: Vec<String>,
    },

    /// The persisted lines of an entry failed the balance re-check.
    #[error("Entry {entry_id} persisted lines unbalanced for {currency}: {net}")]
    PersistedImbalance {
        /// The offending entry.
        entry_id: JournalEntryId,
        /// Currency that failed to balance.
        currency: String,
        /// Net debits minus credits.
        net: Decimal,
    },

    /// The referenced entry does not exist.
    #[error("Journal entry not found: {0}")]
    EntryNotFound(JournalEntryId),

    /// Only posted entries can be reversed.
    #[error("Journal entry {0} is not posted")]
    EntryNotPosted(JournalEntryId),

    /// The entry was already reversed.
    #[error("Journal entry {0} is already reversed")]
    EntryAlreadyReversed(JournalEntryId),

    /// The reversal targeted a different ledger than the original entry.
    #[error(
        "Cannot reverse entry {entry_id} into ledger '{requested_ledger_id}': original is in \
         '{original_ledger_id}'"
    )]
    CrossLedgerReversal {
        /// The original entry.
        entry_id: JournalEntryId,
        /// Ledger of the original entry.
        original_ledger_id: String,
        /// Ledger the caller expected.
        requested_ledger_id: String,
    },

    /// A store guard fired.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl WriteError {
    /// Returns the machine-readable error code.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::SubledgerReconciliation { .. } => "SUBLEDGER_RECONCILIATION_ERROR",
            Self::StaleReferenceSnapshot { .. } => "STALE_REFERENCE_SNAPSHOT",
            Self::MissingReferenceSnapshot { .. } => "MISSING_REFERENCE_SNAPSHOT",
            Self::PersistedImbalance { .. } => "UNBALANCED_ENTRY",
            Self::EntryNotFound(_) => "ENTRY_NOT_FOUND",
            Self::EntryNotPosted(_) => "ENTRY_NOT_POSTED",
            Self::EntryAlreadyReversed(_) => "ENTRY_ALREADY_REVERSED",
            Self::CrossLedgerReversal { .. } => "CROSS_LEDGER_REVERSAL",
            Self::Store(inner) => inner.error_code(),
        }
    }
}

/// Full provenance record for a role-to-account binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingRecord {
    /// Resolved account ID.
    pub account_id: AccountId,
    /// Resolved account code.
    pub account_code: String,
    /// Account name.
    pub account_name: String,
    /// Account classification.
    pub account_type: String,
    /// Which side increases the account balance.
    pub normal_balance: Option<LineSide>,
    /// First date the binding is effective, as ISO text; empty when open.
    pub effective_from: String,
    /// Last date the binding is effective, as ISO text; empty when open.
    pub effective_to: String,
    /// Configuration the binding came from.
    pub config_id: String,
    /// Version of that configuration.
    pub config_version: u32,
}

/// Maps semantic account roles to chart of accounts entries.
#[derive(Debug, Clone, Default)]
pub struct RoleResolver {
    bindings: HashMap<String, BindingRecord>,
}

impl RoleResolver {
    /// Creates an empty resolver.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a resolver from a compiled pack against the store's chart
    /// of accounts.
    ///
    /// Every pack role binding whose account code exists in the reference
    /// data is registered with full provenance. Every known account code
    /// is also registered as a binding for itself, so strategy output
    /// keyed by account code resolves without a dedicated role.
    #[must_use]
    pub fn from_pack(pack: &CompiledPolicyPack, reference: &ReferenceData) -> Self {
        let mut resolver = Self::new();

        for (code, account_id) in &reference.account_ids_by_code {
            resolver.bindings.insert(
                code.clone(),
                BindingRecord {
                    account_id: *account_id,
                    account_code: code.clone(),
                    account_name: String::new(),
                    account_type: String::new(),
                    normal_balance: None,
                    effective_from: String::new(),
                    effective_to: String::new(),
                    config_id: pack.config_id.clone(),
                    config_version: pack.config_version,
                },
            );
        }

        for binding in &pack.role_bindings {
            let Some(account_id) = reference.get_account_id(&binding.account_code) else {
                warn!(
                    role = binding.role,
                    account_code = binding.account_code,
                    "role_binding_account_missing"
                );
                continue;
            };
            resolver.bindings.insert(
                binding.role.clone(),
                BindingRecord {
                    account_id,
                    account_code: binding.account_code.clone(),
                    account_name: String::new(),
                    account_type: String::new(),
                    normal_balance: None,
                    effective_from: binding.effective_from.to_string(),
                    effective_to: binding
                        .effective_to
                        .map(|d| d.to_string())
                        .unwrap_or_default(),
                    config_id: pack.config_id.clone(),
                    config_version: pack.config_version,
                },
            );
        }

        resolver
    }

    /// Registers a role binding with optional provenance metadata.
    pub fn register_binding(&mut self, role: impl Into<String>, record: BindingRecord) {
        self.bindings.insert(role.into(), record);
    }

    /// Resolves a role to `(account_id, account_code)`.
    #[must_use]
    pub fn resolve(&self, role: &str) -> Option<(AccountId, String)> {
        self.bindings
            .get(role)
            .map(|b| (b.account_id, b.account_code.clone()))
    }

    /// Resolves a role to its full binding record with provenance.
    #[must_use]
    pub fn resolve_full(&self, role: &str) -> Option<&BindingRecord> {
        self.bindings.get(role)
    }
}

/// Atomic multi-ledger journal posting service.
pub struct JournalWriter<'t, 'a> {
    txn: &'t Txn<'a>,
    clock: &'a dyn Clock,
    role_resolver: RoleResolver,
    sequences: SequenceService<'t, 'a>,
    auditor: AuditorService<'t, 'a>,
    control_registry: Option<SubledgerControlRegistry>,
    snapshot_service: Option<ReferenceSnapshotService<'t, 'a>>,
}

impl<'t, 'a> JournalWriter<'t, 'a> {
    /// Creates a writer over a scope.
    #[must_use]
    pub fn new(txn: &'t Txn<'a>, clock: &'a dyn Clock, role_resolver: RoleResolver) -> Self {
        Self {
            txn,
            clock,
            role_resolver,
            sequences: SequenceService::new(txn),
            auditor: AuditorService::new(txn, clock),
            control_registry: None,
            snapshot_service: None,
        }
    }

    /// Wires subledger control enforcement.
    #[must_use]
    pub fn with_control_registry(mut self, registry: SubledgerControlRegistry) -> Self {
        self.control_registry = Some(registry);
        self
    }

    /// Wires snapshot freshness validation.
    #[must_use]
    pub fn with_snapshot_service(mut self, service: ReferenceSnapshotService<'t, 'a>) -> Self {
        self.snapshot_service = Some(service);
        self
    }

    /// Loads a journal entry by its primary key.
    ///
    /// Public so callers above this layer can load entries without
    /// touching store internals.
    #[must_use]
    pub fn get_entry(&self, entry_id: JournalEntryId) -> Option<JournalEntryRow> {
        self.txn.get_entry(entry_id)
    }

    /// All journal entries already written for an intent.
    #[must_use]
    pub fn get_entries_for_intent(&self, intent: &AccountingIntent) -> Vec<JournalEntryRow> {
        intent
            .ledger_intents
            .iter()
            .filter_map(|li| {
                self.txn
                    .find_entry_by_idempotency_key(&intent.idempotency_key(&li.ledger_id))
            })
            .collect()
    }

    /// Writes journal entries for every ledger in the intent, atomically
    /// within the caller's scope.
    ///
    /// # Errors
    ///
    /// Returns a `WriteError` for conditions that must roll back the
    /// whole scope: blocking subledger reconciliation violations, stale
    /// reference snapshots, and store guard failures. Every expected
    /// failure -- imbalance, unresolved roles, rounding violations --
    /// comes back inside the `JournalWriteResult` instead.
    pub fn write(
        &self,
        intent: &AccountingIntent,
        actor_id: ActorId,
        event_type: &str,
    ) -> Result<JournalWriteResult, WriteError> {
        info!(
            source_event_id = %intent.source_event_id,
            ledger_count = intent.ledger_intents.len(),
            "journal_write_started"
        );

        // The posting rule version is recorded for replay and must name a
        // real rule.
        if intent.profile_version < 1 {
            return Ok(JournalWriteResult::validation_failed(
                "POSTING_RULE_NOT_FOUND",
                format!(
                    "Intent for profile '{}' names posting rule version {}",
                    intent.profile_id, intent.profile_version
                ),
            ));
        }

        // Debits must equal credits per currency per ledger; every check
        // is logged, balanced or not.
        for ledger_intent in &intent.ledger_intents {
            for currency in ledger_intent.currencies() {
                let sum_debit = ledger_intent.total_debits(Some(&currency));
                let sum_credit = ledger_intent.total_credits(Some(&currency));
                let balanced = sum_debit == sum_credit;
                info!(
                    ledger_id = ledger_intent.ledger_id,
                    currency = currency,
                    sum_debit = %sum_debit,
                    sum_credit = %sum_credit,
                    balanced = balanced,
                    source_event_id = %intent.source_event_id,
                    "balance_validated"
                );
                if !balanced {
                    let imbalance = sum_debit - sum_credit;
                    warn!(
                        ledger_id = ledger_intent.ledger_id,
                        currency = currency,
                        imbalance = %imbalance,
                        "unbalanced_intent"
                    );
                    return Ok(JournalWriteResult::validation_failed(
                        "UNBALANCED_INTENT",
                        format!(
                            "Ledger '{}' is unbalanced for {currency}: imbalance = {imbalance}",
                            ledger_intent.ledger_id
                        ),
                    ));
                }
            }
        }

        // Every role must resolve to exactly one COA account.
        let resolved = match self.resolve_all_roles(intent) {
            Ok(resolved) => resolved,
            Err(unresolved) => {
                warn!(unresolved_roles = ?unresolved, "role_resolution_failed");
                let message = format!(
                    "Cannot resolve roles {:?} at COA version {}",
                    unresolved, intent.snapshot.coa_version
                );
                return Ok(JournalWriteResult::role_resolution_failed(
                    unresolved, message,
                ));
            }
        };

        // Link legality: resolved accounts must exist and accept posting.
        for (_, lines) in &resolved {
            for line in lines {
                match self.txn.get_account(line.account_id) {
                    None => {
                        return Ok(JournalWriteResult::validation_failed(
                            "ACCOUNT_NOT_FOUND",
                            format!("Account {} does not exist", line.account_id),
                        ));
                    }
                    Some(account) if !account.is_active => {
                        return Ok(JournalWriteResult::validation_failed(
                            "ACCOUNT_INACTIVE",
                            format!("Account '{}' does not accept posting", account.code),
                        ));
                    }
                    Some(_) => {}
                }
            }
        }

        // Rounding discipline per ledger, checked before anything is
        // inserted so a validation failure leaves no partial rows.
        for (ledger_intent, lines) in &resolved {
            if let Some(result) = Self::validate_rounding(&ledger_intent.ledger_id, lines) {
                return Ok(result);
            }
        }

        // Idempotency partition under the scope lock.
        let mut existing_entries: Vec<WrittenEntry> = Vec::new();
        let mut pending: Vec<&(LedgerIntent, Vec<ResolvedIntentLine>)> = Vec::new();
        for item in &resolved {
            let (ledger_intent, _) = item;
            let idempotency_key = intent.idempotency_key(&ledger_intent.ledger_id);
            match self.txn.find_entry_by_idempotency_key(&idempotency_key) {
                Some(existing) if existing.status.is_immutable() => {
                    existing_entries.push(WrittenEntry {
                        entry_id: existing.id,
                        ledger_id: ledger_intent.ledger_id.clone(),
                        seq: existing.seq.unwrap_or(0),
                        idempotency_key,
                    });
                }
                Some(stale_draft) => {
                    // An abandoned draft under this key: clear it and
                    // write fresh.
                    self.txn.remove_draft_entry(stale_draft.id)?;
                    pending.push(item);
                }
                None => pending.push(item),
            }
        }

        if pending.is_empty() {
            info!("journal_write_idempotent");
            return Ok(JournalWriteResult::already_exists(existing_entries));
        }

        let mut written_entries = existing_entries;
        for (ledger_intent, lines) in pending {
            match self.create_entry(intent, ledger_intent, lines, actor_id, event_type) {
                Ok(entry) => {
                    written_entries.push(WrittenEntry {
                        entry_id: entry.id,
                        ledger_id: ledger_intent.ledger_id.clone(),
                        seq: entry.seq.unwrap_or(0),
                        idempotency_key: entry.idempotency_key,
                    });
                }
                Err(WriteError::Store(StoreError::UniqueViolation { .. })) => {
                    // Concurrent insert: re-fetch by key and treat as
                    // already posted.
                    warn!(ledger_id = ledger_intent.ledger_id, "concurrent_insert_conflict");
                    let idempotency_key = intent.idempotency_key(&ledger_intent.ledger_id);
                    match self.txn.find_entry_by_idempotency_key(&idempotency_key) {
                        Some(existing) => written_entries.push(WrittenEntry {
                            entry_id: existing.id,
                            ledger_id: ledger_intent.ledger_id.clone(),
                            seq: existing.seq.unwrap_or(0),
                            idempotency_key,
                        }),
                        None => {
                            return Ok(JournalWriteResult::failure(
                                "CONCURRENT_INSERT",
                                format!(
                                    "Concurrent insert conflict for ledger '{}'",
                                    ledger_intent.ledger_id
                                ),
                            ));
                        }
                    }
                }
                Err(other) => return Err(other),
            }
        }

        // Subledger control reconciliation, post-time enforcement.
        self.validate_subledger_controls(intent)?;

        // Reference snapshot freshness.
        self.validate_snapshot_freshness(intent)?;

        info!(
            entry_count = written_entries.len(),
            source_event_id = %intent.source_event_id,
            "journal_write_completed"
        );
        Ok(JournalWriteResult::success(written_entries))
    }

    /// Creates a reversal entry that mechanically inverts an original.
    ///
    /// The reversal mirrors the original exactly -- same accounts,
    /// amounts, currencies, dimensions, exchange rates -- with only the
    /// side flipped and `is_rounding` cleared: a mechanical inversion
    /// balances exactly without new rounding. Snapshot versions are
    /// copied from the original, so the reversal is evaluated under the
    /// original's reference state even when posted in a later period.
    /// Idempotent on `reversal:{original_id}:{ledger_id}`.
    ///
    /// # Errors
    ///
    /// Returns `WriteError::EntryNotFound` for an unknown entry,
    /// `WriteError::EntryNotPosted` for a draft,
    /// `WriteError::EntryAlreadyReversed` when the entry was reversed
    /// outside this key, `WriteError::CrossLedgerReversal` when
    /// `expected_ledger_id` does not match, and store guard failures.
    #[allow(clippy::too_many_arguments)]
    pub fn write_reversal(
        &self,
        original_entry_id: JournalEntryId,
        source_event_id: EventId,
        actor_id: ActorId,
        effective_date: NaiveDate,
        reason: &str,
        event_type: &str,
        expected_ledger_id: Option<&str>,
    ) -> Result<JournalEntryRow, WriteError> {
        let original = self
            .txn
            .get_entry(original_entry_id)
            .ok_or(WriteError::EntryNotFound(original_entry_id))?;

        let ledger_id = original.ledger_id().to_string();
        if let Some(expected) = expected_ledger_id {
            if expected != ledger_id {
                return Err(WriteError::CrossLedgerReversal {
                    entry_id: original_entry_id,
                    original_ledger_id: ledger_id,
                    requested_ledger_id: expected.to_string(),
                });
            }
        }

        let idempotency_key = format!("reversal:{original_entry_id}:{ledger_id}");
        if let Some(existing) = self.txn.find_entry_by_idempotency_key(&idempotency_key) {
            if existing.status.is_immutable() {
                info!(
                    original_entry_id = %original_entry_id,
                    existing_reversal_id = %existing.id,
                    "reversal_idempotent"
                );
                return Ok(existing);
            }
        }

        match original.status {
            EntryStatus::Posted => {}
            EntryStatus::Draft => return Err(WriteError::EntryNotPosted(original_entry_id)),
            EntryStatus::Reversed => {
                return Err(WriteError::EntryAlreadyReversed(original_entry_id));
            }
        }

        let original_lines = self.txn.lines_for_entry(original_entry_id);
        let now = self.clock.now();

        let reversal = JournalEntryRow {
            id: JournalEntryId::new(),
            seq: None,
            idempotency_key,
            source_event_id,
            source_event_type: event_type.to_string(),
            occurred_at: now,
            effective_date,
            posted_at: None,
            actor_id,
            status: EntryStatus::Draft,
            description: Some(format!(
                "Reversal of entry seq {}: {reason}",
                original.seq.unwrap_or(0)
            )),
            metadata: Some(json!({
                "ledger_id": ledger_id,
                "reversal_reason": reason,
                "original_entry_id": original_entry_id.to_string(),
            })),
            posting_rule_version: original.posting_rule_version,
            reversal_of_id: Some(original_entry_id),
            coa_version: original.coa_version,
            dimension_schema_version: original.dimension_schema_version,
            rounding_policy_version: original.rounding_policy_version,
            currency_registry_version: original.currency_registry_version,
        };
        self.txn.insert_entry(reversal.clone())?;

        for original_line in &original_lines {
            self.txn.insert_line(JournalLineRow {
                id: JournalLineId::new(),
                journal_entry_id: reversal.id,
                account_id: original_line.account_id,
                side: original_line.side.flipped(),
                amount: original_line.amount,
                currency: original_line.currency.clone(),
                dimensions: original_line.dimensions.clone(),
                is_rounding: false,
                line_memo: Some(format!("Reversal of line {}", original_line.line_seq)),
                exchange_rate_id: original_line.exchange_rate_id,
                line_seq: original_line.line_seq,
            })?;
        }

        // Balanced by construction: every line flipped, so the reversal
        // balances iff the original did. Re-verified as defense in depth.
        self.verify_persisted_balance(reversal.id)?;
        let finalized = self.finalize_posting(reversal.id)?;

        self.txn
            .update_entry(original_entry_id, |e| e.status = EntryStatus::Reversed)?;

        self.auditor.record(
            "journal_entry",
            &finalized.id.to_string(),
            "posted",
            &json!({
                "seq": finalized.seq,
                "idempotency_key": finalized.idempotency_key,
                "reversal_of_id": original_entry_id.to_string(),
                "reason": reason,
            }),
        );
        self.auditor.record(
            "journal_entry",
            &original_entry_id.to_string(),
            "reversed",
            &json!({"reversal_entry_id": finalized.id.to_string()}),
        );

        info!(
            reversal_entry_id = %finalized.id,
            original_entry_id = %original_entry_id,
            seq = finalized.seq,
            effective_date = %effective_date,
            line_count = original_lines.len(),
            "reversal_entry_created"
        );
        Ok(finalized)
    }

    fn resolve_all_roles(
        &self,
        intent: &AccountingIntent,
    ) -> Result<Vec<(LedgerIntent, Vec<ResolvedIntentLine>)>, Vec<String>> {
        let mut resolved = Vec::new();
        let mut unresolved: Vec<String> = Vec::new();

        for ledger_intent in &intent.ledger_intents {
            let mut lines = Vec::new();
            for (i, line) in ledger_intent.lines.iter().enumerate() {
                let Some(binding) = self.role_resolver.resolve_full(&line.account_role) else {
                    if !unresolved.contains(&line.account_role) {
                        unresolved.push(line.account_role.clone());
                    }
                    continue;
                };

                info!(
                    role = line.account_role,
                    account_code = binding.account_code,
                    account_id = %binding.account_id,
                    ledger_id = ledger_intent.ledger_id,
                    coa_version = intent.snapshot.coa_version,
                    line_seq = i,
                    side = %line.side,
                    amount = %line.money.amount,
                    currency = line.currency(),
                    config_id = binding.config_id,
                    config_version = binding.config_version,
                    "role_resolved"
                );

                lines.push(ResolvedIntentLine {
                    account_id: binding.account_id,
                    account_code: binding.account_code.clone(),
                    account_role: line.account_role.clone(),
                    side: line.side,
                    money: line.money.clone(),
                    dimensions: line.dimensions.clone(),
                    memo: line.memo.clone(),
                    is_rounding: line.is_rounding,
                    exchange_rate_id: None,
                    line_seq: u32::try_from(i).expect("line count fits in u32"),
                });
            }
            resolved.push((ledger_intent.clone(), lines));
        }

        if unresolved.is_empty() {
            Ok(resolved)
        } else {
            Err(unresolved)
        }
    }

    fn validate_rounding(
        ledger_id: &str,
        lines: &[ResolvedIntentLine],
    ) -> Option<JournalWriteResult> {
        let rounding: Vec<&ResolvedIntentLine> = lines.iter().filter(|l| l.is_rounding).collect();
        if rounding.len() > 1 {
            return Some(JournalWriteResult::validation_failed(
                "MULTIPLE_ROUNDING_LINES",
                format!(
                    "Ledger '{ledger_id}' has {} rounding lines; at most one allowed",
                    rounding.len()
                ),
            ));
        }
        if let Some(line) = rounding.first() {
            let threshold = rounding_threshold(lines.len() - rounding.len());
            if line.amount() > threshold {
                return Some(JournalWriteResult::validation_failed(
                    "ROUNDING_AMOUNT_EXCEEDED",
                    format!(
                        "Rounding amount {} exceeds threshold {threshold} on ledger '{ledger_id}'",
                        line.amount()
                    ),
                ));
            }
        }
        None
    }

    fn create_entry(
        &self,
        intent: &AccountingIntent,
        ledger_intent: &LedgerIntent,
        lines: &[ResolvedIntentLine],
        actor_id: ActorId,
        event_type: &str,
    ) -> Result<JournalEntryRow, WriteError> {
        let now = self.clock.now();
        let entry = JournalEntryRow {
            id: JournalEntryId::new(),
            seq: None,
            idempotency_key: intent.idempotency_key(&ledger_intent.ledger_id),
            source_event_id: intent.source_event_id,
            source_event_type: event_type.to_string(),
            occurred_at: intent.created_at.unwrap_or(now),
            effective_date: intent.effective_date,
            posted_at: None,
            actor_id,
            status: EntryStatus::Draft,
            description: intent.description.clone(),
            metadata: Some(json!({
                "ledger_id": ledger_intent.ledger_id,
                "profile_id": intent.profile_id,
                "econ_event_id": intent.econ_event_id.to_string(),
            })),
            posting_rule_version: intent.profile_version,
            reversal_of_id: None,
            coa_version: Some(intent.snapshot.coa_version),
            dimension_schema_version: Some(intent.snapshot.dimension_schema_version),
            rounding_policy_version: Some(intent.snapshot.rounding_policy_version),
            currency_registry_version: Some(intent.snapshot.currency_registry_version),
        };
        self.txn.insert_entry(entry.clone())?;

        for line in lines {
            self.txn.insert_line(JournalLineRow {
                id: JournalLineId::new(),
                journal_entry_id: entry.id,
                account_id: line.account_id,
                side: line.side,
                amount: line.amount(),
                currency: line.currency().to_string(),
                dimensions: line.dimensions.clone(),
                is_rounding: line.is_rounding,
                line_memo: line.memo.clone(),
                exchange_rate_id: line.exchange_rate_id,
                line_seq: line.line_seq,
            })?;
            info!(
                entry_id = %entry.id,
                line_seq = line.line_seq,
                role = line.account_role,
                account_code = line.account_code,
                side = %line.side,
                amount = %line.amount(),
                currency = line.currency(),
                is_rounding = line.is_rounding,
                "line_written"
            );
        }

        self.verify_persisted_balance(entry.id)?;
        let finalized = self.finalize_posting(entry.id)?;

        self.auditor.record(
            "journal_entry",
            &finalized.id.to_string(),
            "posted",
            &json!({
                "seq": finalized.seq,
                "idempotency_key": finalized.idempotency_key,
                "source_event_id": finalized.source_event_id.to_string(),
                "ledger_id": ledger_intent.ledger_id,
            }),
        );

        Ok(finalized)
    }

    /// Re-verifies per-currency balance over the persisted lines.
    fn verify_persisted_balance(&self, entry_id: JournalEntryId) -> Result<(), WriteError> {
        let lines = self.txn.lines_for_entry(entry_id);
        let mut by_currency: HashMap<&str, Decimal> = HashMap::new();
        for line in &lines {
            let signed = match line.side {
                LineSide::Debit => line.amount,
                LineSide::Credit => -line.amount,
            };
            *by_currency.entry(line.currency.as_str()).or_default() += signed;
        }
        for (currency, net) in by_currency {
            info!(
                entry_id = %entry_id,
                currency = currency,
                balanced = net.is_zero(),
                "entry_balance_validated"
            );
            if !net.is_zero() {
                return Err(WriteError::PersistedImbalance {
                    entry_id,
                    currency: currency.to_string(),
                    net,
                });
            }
        }
        Ok(())
    }

    /// Validates snapshot presence, assigns the sequence, and transitions
    /// the entry to posted.
    fn finalize_posting(&self, entry_id: JournalEntryId) -> Result<JournalEntryRow, WriteError> {
        let entry = self
            .txn
            .get_entry(entry_id)
            .ok_or(WriteError::EntryNotFound(entry_id))?;

        let mut missing = Vec::new();
        if entry.coa_version.is_none() {
            missing.push("coa_version".to_string());
        }
        if entry.dimension_schema_version.is_none() {
            missing.push("dimension_schema_version".to_string());
        }
        if entry.rounding_policy_version.is_none() {
            missing.push("rounding_policy_version".to_string());
        }
        if entry.currency_registry_version.is_none() {
            missing.push("currency_registry_version".to_string());
        }
        if !missing.is_empty() {
            return Err(WriteError::MissingReferenceSnapshot {
                entry_id,
                missing_fields: missing,
            });
        }

        let seq = self.sequences.next_value(SequenceService::JOURNAL_ENTRY);
        debug_assert!(seq > 0, "sequence must be strictly positive");
        let now = self.clock.now();
        let finalized = self.txn.update_entry(entry_id, |e| {
            e.seq = Some(seq);
            e.posted_at = Some(now);
            e.status = EntryStatus::Posted;
        })?;

        info!(
            entry_id = %finalized.id,
            source_event_id = %finalized.source_event_id,
            seq = seq,
            idempotency_key = finalized.idempotency_key,
            effective_date = %finalized.effective_date,
            "journal_entry_created"
        );
        Ok(finalized)
    }

    /// Subledger aggregate balance per the normal-balance convention.
    fn subledger_aggregate(
        &self,
        subledger_type: SubledgerType,
        as_of_date: NaiveDate,
        currency: &str,
    ) -> Decimal {
        let mut debit_total = Decimal::ZERO;
        let mut credit_total = Decimal::ZERO;
        for entry in self.txn.subledger_entries(subledger_type, None) {
            if entry.effective_date > as_of_date || entry.currency() != currency {
                continue;
            }
            if let Some(debit) = &entry.debit {
                debit_total += debit.amount;
            }
            if let Some(credit) = &entry.credit {
                credit_total += credit.amount;
            }
        }
        if subledger_type.is_credit_normal() {
            credit_total - debit_total
        } else {
            debit_total - credit_total
        }
    }

    /// Post-time subledger control enforcement.
    fn validate_subledger_controls(&self, intent: &AccountingIntent) -> Result<(), WriteError> {
        let Some(registry) = &self.control_registry else {
            return Ok(());
        };
        let reconciler = SubledgerReconciler::new();

        for ledger_intent in &intent.ledger_intents {
            let Ok(sl_type) = ledger_intent.ledger_id.parse::<SubledgerType>() else {
                continue;
            };
            let Some(contract) = registry.get(sl_type) else {
                continue;
            };
            if !contract.enforce_on_post {
                continue;
            }

            // Resolve the control account from the binding's role; the
            // posting itself already succeeded, so an unresolvable
            // control account downgrades to a warning.
            let Some((control_account_id, _)) =
                self.role_resolver.resolve(contract.control_account_role())
            else {
                warn!(
                    subledger_type = %sl_type,
                    control_account_role = contract.control_account_role(),
                    source_event_id = %intent.source_event_id,
                    "subledger_control_account_unresolvable"
                );
                continue;
            };

            for currency in ledger_intent.currencies() {
                let raw_gl_balance = self.txn.account_balance(
                    control_account_id,
                    intent.effective_date,
                    &currency,
                    Some("GL"),
                );
                // Normalize the GL balance to the subledger's sign
                // convention.
                let gl_economic = if contract.binding.is_debit_normal {
                    raw_gl_balance
                } else {
                    -raw_gl_balance
                };
                let control_balance =
                    Money::of(gl_economic, &currency).expect("intent currencies are validated");

                let sl_before = self.subledger_aggregate(sl_type, intent.effective_date, &currency);
                let debit_total = ledger_intent.total_debits(Some(&currency));
                let credit_total = ledger_intent.total_credits(Some(&currency));
                let sl_delta = if contract.binding.is_debit_normal {
                    debit_total - credit_total
                } else {
                    credit_total - debit_total
                };
                let sl_after = Money::of(sl_before + sl_delta, &currency)
                    .expect("intent currencies are validated");

                let violations = reconciler
                    .validate_post(
                        contract,
                        &sl_after,
                        &control_balance,
                        intent.effective_date,
                        self.clock.now(),
                    )
                    .map_err(|e| WriteError::SubledgerReconciliation {
                        ledger_id: ledger_intent.ledger_id.clone(),
                        violations: vec![e.to_string()],
                    })?;

                let blocking: Vec<String> = violations
                    .iter()
                    .filter(|v| v.blocking)
                    .map(|v| v.message.clone())
                    .collect();
                if !blocking.is_empty() {
                    error!(
                        subledger_type = %sl_type,
                        currency = currency,
                        sl_balance_after = %sl_after.amount,
                        gl_control_balance = %gl_economic,
                        variance = %(sl_after.amount - gl_economic),
                        source_event_id = %intent.source_event_id,
                        "subledger_control_violation"
                    );
                    self.auditor.record(
                        "subledger_control",
                        sl_type.as_str(),
                        "post_blocked",
                        &json!({
                            "currency": currency,
                            "sl_balance_after": sl_after.amount.to_string(),
                            "gl_control_balance": gl_economic.to_string(),
                            "violations": blocking,
                        }),
                    );
                    return Err(WriteError::SubledgerReconciliation {
                        ledger_id: ledger_intent.ledger_id.clone(),
                        violations: blocking,
                    });
                }

                for violation in violations.iter().filter(|v| !v.blocking) {
                    warn!(
                        subledger_type = %sl_type,
                        currency = currency,
                        message = violation.message,
                        "subledger_control_warning"
                    );
                }
                if violations.is_empty() {
                    info!(
                        subledger_type = %sl_type,
                        currency = currency,
                        sl_balance_after = %sl_after.amount,
                        gl_control_balance = %gl_economic,
                        status = "reconciled",
                        "subledger_control_check"
                    );
                }
            }
        }
        Ok(())
    }

    /// Snapshot freshness validation against the persisted snapshot.
    fn validate_snapshot_freshness(&self, intent: &AccountingIntent) -> Result<(), WriteError> {
        let Some(service) = &self.snapshot_service else {
            return Ok(());
        };
        let Some(snapshot_id) = intent.snapshot.full_snapshot_id else {
            return Ok(());
        };
        let Some(snapshot) = service.get(snapshot_id) else {
            warn!(
                snapshot_id = %snapshot_id,
                source_event_id = %intent.source_event_id,
                "snapshot_not_found_for_freshness_check"
            );
            return Ok(());
        };

        let validation = service.validate_integrity(&snapshot);
        if !validation.is_valid() {
            return Err(WriteError::StaleReferenceSnapshot {
                stale_components: validation.stale_components,
            });
        }
        info!(
            snapshot_id = %snapshot_id,
            source_event_id = %intent.source_event_id,
            "snapshot_freshness_validated"
        );
        Ok(())
    }
}
