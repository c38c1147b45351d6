//! The in-memory snapshot-transactional store.
//!
//! `Store` is the shared database; `Txn` is one caller's transaction
//! scope over it. Beginning a scope takes the store lock and snapshots the
//! state; dropping the scope without committing restores the snapshot, so
//! everything a scope did -- entries, lines, audit events, subledger rows
//! -- is discarded atomically. Sequence counters live outside the snapshot
//! (like database sequences): an allocation in a rolled-back scope leaves
//! a permanent gap that is never reused.
//!
//! The guarded update methods on `Txn` are the trigger layer: they reject
//! mutation of protected columns of posted entries and lines and of closed
//! periods no matter which service asks.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::debug;

use quill_core::journal::{EntryStatus, LineSide};
use quill_core::subledger::{ReconciliationStatus, SubledgerEntry, SubledgerType};
use quill_shared::types::{
    AccountId, EventId, ExchangeRateId, JournalEntryId, JournalLineId, ReportId, SnapshotId,
    SubledgerEntryId,
};

use crate::entities::{
    AccountRow, AuditEventRow, EventRow, ExchangeRateRow, FiscalPeriodRow, JournalEntryRow,
    JournalLineRow, PeriodStatus, ReconciliationFailureReportRow, ReferenceSnapshotRow,
    SubledgerPeriodStatusRow,
};
use crate::error::StoreError;

/// All tables, cloned wholesale for the transaction snapshot.
#[derive(Debug, Clone, Default)]
pub(crate) struct StoreState {
    accounts: HashMap<AccountId, AccountRow>,
    events: HashMap<EventId, EventRow>,
    journal_entries: HashMap<JournalEntryId, JournalEntryRow>,
    entries_by_idempotency_key: HashMap<String, JournalEntryId>,
    journal_lines: HashMap<JournalLineId, JournalLineRow>,
    audit_events: Vec<AuditEventRow>,
    fiscal_periods: HashMap<String, FiscalPeriodRow>,
    subledger_entries: HashMap<SubledgerEntryId, SubledgerEntry>,
    subledger_period_status: HashMap<(SubledgerType, String), SubledgerPeriodStatusRow>,
    failure_reports: HashMap<ReportId, ReconciliationFailureReportRow>,
    exchange_rates: HashMap<ExchangeRateId, ExchangeRateRow>,
    reference_snapshots: HashMap<SnapshotId, ReferenceSnapshotRow>,
}

/// The shared in-memory database.
///
/// Share via `Arc` across threads; each caller begins its own scope.
/// Scopes serialize on the store lock, which stands in for row-level
/// locking: idempotency lookups, sequence allocation, and audit tail
/// selection are all serialized between concurrent scopes.
#[derive(Debug, Default)]
pub struct Store {
    state: Mutex<StoreState>,
    sequences: Mutex<HashMap<String, i64>>,
}

impl Store {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Begins a transaction scope.
    ///
    /// Blocks until any other scope on this store finishes. The returned
    /// scope must be explicitly committed; dropping it rolls back.
    #[must_use]
    pub fn begin(&self) -> Txn<'_> {
        let guard = self.state.lock().expect("store state lock poisoned");
        let undo = guard.clone();
        Txn {
            store: self,
            state: RefCell::new(guard),
            undo: RefCell::new(undo),
            committed: Cell::new(false),
        }
    }

    /// Advances a named sequence stream and returns the new value.
    ///
    /// Counters are store-global and survive transaction rollback, so a
    /// rolled-back allocation leaves a gap; values are strictly
    /// monotonic and never reused.
    fn next_sequence(&self, stream: &str) -> i64 {
        let mut counters = self.sequences.lock().expect("sequence lock poisoned");
        let counter = counters.entry(stream.to_string()).or_insert(0);
        *counter += 1;
        *counter
    }
}

/// One caller's transaction scope over the store.
///
/// All reads and writes inside the scope see the scope's own
/// modifications. [`Txn::commit`] makes them permanent; dropping the scope
/// without committing restores the pre-scope snapshot.
pub struct Txn<'a> {
    store: &'a Store,
    state: RefCell<MutexGuard<'a, StoreState>>,
    undo: RefCell<StoreState>,
    committed: Cell<bool>,
}

impl Drop for Txn<'_> {
    fn drop(&mut self) {
        if !self.committed.get() {
            let undo = self.undo.replace(StoreState::default());
            **self.state.borrow_mut() = undo;
            debug!("txn_rolled_back");
        }
    }
}

impl Txn<'_> {
    /// Commits the scope; all modifications become permanent.
    pub fn commit(self) {
        self.committed.set(true);
        debug!("txn_committed");
    }

    /// Rolls the scope back explicitly. Equivalent to dropping it.
    pub fn rollback(self) {
        drop(self);
    }

    /// Advances a named sequence stream.
    ///
    /// Delegates to the store-global counters, which are not part of the
    /// transaction snapshot.
    #[must_use]
    pub fn next_sequence(&self, stream: &str) -> i64 {
        self.store.next_sequence(stream)
    }

    // ======================================================================
    // Accounts
    // ======================================================================

    /// Inserts a chart of accounts entry.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::UniqueViolation` for a duplicate code or ID.
    pub fn insert_account(&self, account: AccountRow) -> Result<(), StoreError> {
        let mut state = self.state.borrow_mut();
        if state.accounts.contains_key(&account.id)
            || state.accounts.values().any(|a| a.code == account.code)
        {
            return Err(StoreError::UniqueViolation {
                table: "accounts",
                key: account.code,
            });
        }
        state.accounts.insert(account.id, account);
        Ok(())
    }

    /// Looks up an account by ID.
    #[must_use]
    pub fn get_account(&self, id: AccountId) -> Option<AccountRow> {
        self.state.borrow().accounts.get(&id).cloned()
    }

    /// Looks up an account by code.
    #[must_use]
    pub fn get_account_by_code(&self, code: &str) -> Option<AccountRow> {
        self.state
            .borrow()
            .accounts
            .values()
            .find(|a| a.code == code)
            .cloned()
    }

    /// All accounts, sorted by code.
    #[must_use]
    pub fn accounts(&self) -> Vec<AccountRow> {
        let mut accounts: Vec<_> = self.state.borrow().accounts.values().cloned().collect();
        accounts.sort_by(|a, b| a.code.cmp(&b.code));
        accounts
    }

    /// Applies an update to an account.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` for an unknown account.
    pub fn update_account(
        &self,
        id: AccountId,
        f: impl FnOnce(&mut AccountRow),
    ) -> Result<AccountRow, StoreError> {
        let mut state = self.state.borrow_mut();
        let account = state.accounts.get_mut(&id).ok_or(StoreError::NotFound {
            entity: "account",
            key: id.to_string(),
        })?;
        f(account);
        Ok(account.clone())
    }

    /// Removes an account that no journal line references.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::AccountReferenced` when any journal line posts
    /// to the account, or `StoreError::NotFound` for an unknown account.
    pub fn remove_account(&self, id: AccountId) -> Result<(), StoreError> {
        let mut state = self.state.borrow_mut();
        if !state.accounts.contains_key(&id) {
            return Err(StoreError::NotFound {
                entity: "account",
                key: id.to_string(),
            });
        }
        if state.journal_lines.values().any(|l| l.account_id == id) {
            return Err(StoreError::AccountReferenced {
                account_id: id.to_string(),
            });
        }
        state.accounts.remove(&id);
        Ok(())
    }

    // ======================================================================
    // Events
    // ======================================================================

    /// Finds an event by its idempotency triple.
    #[must_use]
    pub fn find_event(
        &self,
        producer: &str,
        event_type: &str,
        event_id: EventId,
    ) -> Option<EventRow> {
        self.state
            .borrow()
            .events
            .get(&event_id)
            .filter(|e| e.producer == producer && e.event_type == event_type)
            .cloned()
    }

    /// Looks up an event by ID.
    #[must_use]
    pub fn get_event(&self, event_id: EventId) -> Option<EventRow> {
        self.state.borrow().events.get(&event_id).cloned()
    }

    /// Inserts an event.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::UniqueViolation` when the
    /// `(producer, event_type, event_id)` triple already exists.
    pub fn insert_event(&self, event: EventRow) -> Result<(), StoreError> {
        let mut state = self.state.borrow_mut();
        if state.events.contains_key(&event.event_id) {
            return Err(StoreError::UniqueViolation {
                table: "events",
                key: format!("{}:{}:{}", event.producer, event.event_type, event.event_id),
            });
        }
        state.events.insert(event.event_id, event);
        Ok(())
    }

    // ======================================================================
    // Journal entries and lines
    // ======================================================================

    /// Looks up a journal entry by ID.
    #[must_use]
    pub fn get_entry(&self, id: JournalEntryId) -> Option<JournalEntryRow> {
        self.state.borrow().journal_entries.get(&id).cloned()
    }

    /// Looks up a journal entry by idempotency key.
    ///
    /// Scopes serialize on the store lock, so this lookup also serializes
    /// concurrent duplicate inserts the way `SELECT ... FOR UPDATE` does.
    #[must_use]
    pub fn find_entry_by_idempotency_key(&self, key: &str) -> Option<JournalEntryRow> {
        let state = self.state.borrow();
        state
            .entries_by_idempotency_key
            .get(key)
            .and_then(|id| state.journal_entries.get(id))
            .cloned()
    }

    /// All journal entries, sorted by sequence then ID.
    #[must_use]
    pub fn journal_entries(&self) -> Vec<JournalEntryRow> {
        let mut entries: Vec<_> = self
            .state
            .borrow()
            .journal_entries
            .values()
            .cloned()
            .collect();
        entries.sort_by_key(|e| (e.seq, e.id));
        entries
    }

    /// Inserts a journal entry.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::UniqueViolation` for a duplicate idempotency
    /// key or entry ID.
    pub fn insert_entry(&self, entry: JournalEntryRow) -> Result<(), StoreError> {
        let mut state = self.state.borrow_mut();
        if state.journal_entries.contains_key(&entry.id)
            || state
                .entries_by_idempotency_key
                .contains_key(&entry.idempotency_key)
        {
            return Err(StoreError::UniqueViolation {
                table: "journal_entries",
                key: entry.idempotency_key,
            });
        }
        state
            .entries_by_idempotency_key
            .insert(entry.idempotency_key.clone(), entry.id);
        state.journal_entries.insert(entry.id, entry);
        Ok(())
    }

    /// Applies an update to a journal entry under the immutability guard.
    ///
    /// Once an entry is posted, the only permitted change is the status
    /// transition `posted -> reversed`; everything else is rejected. A
    /// reversed entry admits no change at all.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` for an unknown entry or
    /// `StoreError::ImmutabilityViolation` when a protected column would
    /// change.
    pub fn update_entry(
        &self,
        id: JournalEntryId,
        f: impl FnOnce(&mut JournalEntryRow),
    ) -> Result<JournalEntryRow, StoreError> {
        let mut state = self.state.borrow_mut();
        let old = state
            .journal_entries
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound {
                entity: "journal_entry",
                key: id.to_string(),
            })?;

        let mut updated = old.clone();
        f(&mut updated);

        if old.status.is_immutable() {
            let only_status_changed = {
                let mut probe = updated.clone();
                probe.status = old.status;
                probe == old
            };
            let legal_transition = old.status == EntryStatus::Posted
                && updated.status == EntryStatus::Reversed
                && only_status_changed;
            let unchanged = updated == old;
            if !legal_transition && !unchanged {
                return Err(StoreError::ImmutabilityViolation {
                    entity: "journal_entry",
                    id: id.to_string(),
                    reason: format!("entry is {:?}", old.status),
                });
            }
        }

        if updated.idempotency_key != old.idempotency_key {
            state.entries_by_idempotency_key.remove(&old.idempotency_key);
            state
                .entries_by_idempotency_key
                .insert(updated.idempotency_key.clone(), id);
        }
        state.journal_entries.insert(id, updated.clone());
        Ok(updated)
    }

    /// Removes a draft entry and its lines.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::ImmutabilityViolation` for a posted or
    /// reversed entry, or `StoreError::NotFound` for an unknown entry.
    pub fn remove_draft_entry(&self, id: JournalEntryId) -> Result<(), StoreError> {
        let mut state = self.state.borrow_mut();
        let entry = state
            .journal_entries
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound {
                entity: "journal_entry",
                key: id.to_string(),
            })?;
        if entry.status.is_immutable() {
            return Err(StoreError::ImmutabilityViolation {
                entity: "journal_entry",
                id: id.to_string(),
                reason: format!("entry is {:?}", entry.status),
            });
        }
        state.entries_by_idempotency_key.remove(&entry.idempotency_key);
        state.journal_entries.remove(&id);
        state.journal_lines.retain(|_, line| line.journal_entry_id != id);
        Ok(())
    }

    /// Inserts a journal line under the draft-only and rounding guards.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` when the entry does not exist,
    /// `StoreError::ImmutabilityViolation` when the entry is no longer a
    /// draft, `StoreError::RoundingInvariantViolation` for a second
    /// rounding line, or `StoreError::RoundingThresholdViolation` for an
    /// oversized rounding amount.
    pub fn insert_line(&self, line: JournalLineRow) -> Result<(), StoreError> {
        let mut state = self.state.borrow_mut();
        let entry = state
            .journal_entries
            .get(&line.journal_entry_id)
            .ok_or(StoreError::NotFound {
                entity: "journal_entry",
                key: line.journal_entry_id.to_string(),
            })?;
        if entry.status.is_immutable() {
            return Err(StoreError::ImmutabilityViolation {
                entity: "journal_line",
                id: line.id.to_string(),
                reason: format!("entry is {:?}", entry.status),
            });
        }

        if line.is_rounding {
            let existing: Vec<&JournalLineRow> = state
                .journal_lines
                .values()
                .filter(|l| l.journal_entry_id == line.journal_entry_id)
                .collect();
            if existing.iter().any(|l| l.is_rounding) {
                return Err(StoreError::RoundingInvariantViolation {
                    entry_id: line.journal_entry_id.to_string(),
                });
            }
            let non_rounding = existing.iter().filter(|l| !l.is_rounding).count();
            let per_line = Decimal::new(1, 2);
            let threshold = per_line.max(per_line * Decimal::from(non_rounding));
            if line.amount > threshold {
                return Err(StoreError::RoundingThresholdViolation {
                    entry_id: line.journal_entry_id.to_string(),
                    amount: line.amount.to_string(),
                    threshold: threshold.to_string(),
                });
            }
        }

        state.journal_lines.insert(line.id, line);
        Ok(())
    }

    /// Applies an update to a journal line under the immutability guard.
    ///
    /// Lines of posted or reversed entries admit no change.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` for an unknown line or
    /// `StoreError::ImmutabilityViolation` when the owning entry is
    /// immutable and anything would change.
    pub fn update_line(
        &self,
        id: JournalLineId,
        f: impl FnOnce(&mut JournalLineRow),
    ) -> Result<JournalLineRow, StoreError> {
        let mut state = self.state.borrow_mut();
        let old = state
            .journal_lines
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound {
                entity: "journal_line",
                key: id.to_string(),
            })?;
        let entry_status = state
            .journal_entries
            .get(&old.journal_entry_id)
            .map(|e| e.status)
            .ok_or(StoreError::NotFound {
                entity: "journal_entry",
                key: old.journal_entry_id.to_string(),
            })?;

        let mut updated = old.clone();
        f(&mut updated);

        if entry_status.is_immutable() && updated != old {
            return Err(StoreError::ImmutabilityViolation {
                entity: "journal_line",
                id: id.to_string(),
                reason: format!("entry is {entry_status:?}"),
            });
        }

        state.journal_lines.insert(id, updated.clone());
        Ok(updated)
    }

    /// Lines of one entry, sorted by `line_seq`.
    #[must_use]
    pub fn lines_for_entry(&self, entry_id: JournalEntryId) -> Vec<JournalLineRow> {
        let mut lines: Vec<_> = self
            .state
            .borrow()
            .journal_lines
            .values()
            .filter(|l| l.journal_entry_id == entry_id)
            .cloned()
            .collect();
        lines.sort_by_key(|l| l.line_seq);
        lines
    }

    /// Balance of an account as of a date, in one currency:
    /// `sum(debits) - sum(credits)` over posted entries, optionally
    /// restricted to one ledger.
    #[must_use]
    pub fn account_balance(
        &self,
        account_id: AccountId,
        as_of_date: NaiveDate,
        currency: &str,
        ledger_id: Option<&str>,
    ) -> Decimal {
        let state = self.state.borrow();
        state
            .journal_lines
            .values()
            .filter(|line| line.account_id == account_id && line.currency == currency)
            .filter_map(|line| {
                state
                    .journal_entries
                    .get(&line.journal_entry_id)
                    .filter(|entry| {
                        entry.status.is_immutable()
                            && entry.effective_date <= as_of_date
                            && ledger_id.is_none_or(|l| entry.ledger_id() == l)
                    })
                    .map(|_| match line.side {
                        LineSide::Debit => line.amount,
                        LineSide::Credit => -line.amount,
                    })
            })
            .sum()
    }

    // ======================================================================
    // Audit events
    // ======================================================================

    /// Appends an audit event. Audit rows are append-only; no update or
    /// delete path exists.
    pub fn insert_audit_event(&self, event: AuditEventRow) {
        self.state.borrow_mut().audit_events.push(event);
    }

    /// All audit events in `seq` order.
    #[must_use]
    pub fn audit_events(&self) -> Vec<AuditEventRow> {
        let mut events = self.state.borrow().audit_events.clone();
        events.sort_by_key(|e| e.seq);
        events
    }

    /// The audit event with the highest `seq`, if any.
    #[must_use]
    pub fn last_audit_event(&self) -> Option<AuditEventRow> {
        self.state
            .borrow()
            .audit_events
            .iter()
            .max_by_key(|e| e.seq)
            .cloned()
    }

    // ======================================================================
    // Fiscal periods
    // ======================================================================

    /// Inserts a fiscal period.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::UniqueViolation` for a duplicate period code.
    pub fn insert_period(&self, period: FiscalPeriodRow) -> Result<(), StoreError> {
        let mut state = self.state.borrow_mut();
        if state.fiscal_periods.contains_key(&period.period_code) {
            return Err(StoreError::UniqueViolation {
                table: "fiscal_periods",
                key: period.period_code,
            });
        }
        state
            .fiscal_periods
            .insert(period.period_code.clone(), period);
        Ok(())
    }

    /// Looks up a period by code.
    #[must_use]
    pub fn get_period(&self, period_code: &str) -> Option<FiscalPeriodRow> {
        self.state
            .borrow()
            .fiscal_periods
            .get(period_code)
            .cloned()
    }

    /// The unique period containing `date`, if any.
    #[must_use]
    pub fn period_for_date(&self, date: NaiveDate) -> Option<FiscalPeriodRow> {
        self.state
            .borrow()
            .fiscal_periods
            .values()
            .find(|p| p.contains(date))
            .cloned()
    }

    /// All periods, sorted by start date.
    #[must_use]
    pub fn fiscal_periods(&self) -> Vec<FiscalPeriodRow> {
        let mut periods: Vec<_> = self
            .state
            .borrow()
            .fiscal_periods
            .values()
            .cloned()
            .collect();
        periods.sort_by_key(|p| p.start_date);
        periods
    }

    /// Applies an update to a period under the closed-period guard.
    ///
    /// A closed period's `start_date`, `end_date`, `status`, and
    /// `allows_adjustments` are fixed; any change to a closed period is
    /// rejected.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` for an unknown period or
    /// `StoreError::PeriodImmutable` when the period is closed and
    /// anything would change.
    pub fn update_period(
        &self,
        period_code: &str,
        f: impl FnOnce(&mut FiscalPeriodRow),
    ) -> Result<FiscalPeriodRow, StoreError> {
        let mut state = self.state.borrow_mut();
        let old = state
            .fiscal_periods
            .get(period_code)
            .cloned()
            .ok_or(StoreError::NotFound {
                entity: "fiscal_period",
                key: period_code.to_string(),
            })?;

        let mut updated = old.clone();
        f(&mut updated);
        updated.period_code = old.period_code.clone();

        if old.status == PeriodStatus::Closed && updated != old {
            return Err(StoreError::PeriodImmutable {
                period_code: period_code.to_string(),
            });
        }

        state
            .fiscal_periods
            .insert(period_code.to_string(), updated.clone());
        Ok(updated)
    }

    // ======================================================================
    // Subledger entries
    // ======================================================================

    /// Inserts a subledger entry.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::UniqueViolation` when the
    /// `(gl_entry_id, subledger_type, source_line_id)` triple already
    /// exists.
    pub fn insert_subledger_entry(&self, entry: SubledgerEntry) -> Result<(), StoreError> {
        let mut state = self.state.borrow_mut();
        if let (Some(gl_entry_id), Some(source_line_id)) =
            (entry.gl_entry_id, entry.source_line_id.as_deref())
        {
            let duplicate = state.subledger_entries.values().any(|e| {
                e.gl_entry_id == Some(gl_entry_id)
                    && e.subledger_type == entry.subledger_type
                    && e.source_line_id.as_deref() == Some(source_line_id)
            });
            if duplicate {
                return Err(StoreError::UniqueViolation {
                    table: "subledger_entries",
                    key: format!("{gl_entry_id}:{}:{source_line_id}", entry.subledger_type),
                });
            }
        }
        state.subledger_entries.insert(entry.entry_id, entry);
        Ok(())
    }

    /// Looks up a subledger entry by ID.
    #[must_use]
    pub fn get_subledger_entry(&self, id: SubledgerEntryId) -> Option<SubledgerEntry> {
        self.state.borrow().subledger_entries.get(&id).cloned()
    }

    /// Finds a subledger entry by its GL linkage triple.
    #[must_use]
    pub fn find_subledger_entry_by_gl(
        &self,
        gl_entry_id: JournalEntryId,
        subledger_type: SubledgerType,
        source_line_id: Option<&str>,
    ) -> Option<SubledgerEntry> {
        self.state
            .borrow()
            .subledger_entries
            .values()
            .find(|e| {
                e.gl_entry_id == Some(gl_entry_id)
                    && e.subledger_type == subledger_type
                    && e.source_line_id.as_deref() == source_line_id
            })
            .cloned()
    }

    /// Subledger entries for one subledger type, optionally filtered by
    /// entity.
    #[must_use]
    pub fn subledger_entries(
        &self,
        subledger_type: SubledgerType,
        entity_id: Option<&str>,
    ) -> Vec<SubledgerEntry> {
        let mut entries: Vec<_> = self
            .state
            .borrow()
            .subledger_entries
            .values()
            .filter(|e| {
                e.subledger_type == subledger_type
                    && entity_id.is_none_or(|id| e.entity_id == id)
            })
            .cloned()
            .collect();
        entries.sort_by_key(|e| (e.effective_date, e.entry_id));
        entries
    }

    /// Replaces a subledger entry via compare-and-swap on its
    /// reconciliation status.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::OptimisticLock` when the current status
    /// differs from `expected_status`, or `StoreError::NotFound` for an
    /// unknown entry.
    pub fn replace_subledger_entry(
        &self,
        expected_status: ReconciliationStatus,
        entry: SubledgerEntry,
    ) -> Result<(), StoreError> {
        let mut state = self.state.borrow_mut();
        let current = state
            .subledger_entries
            .get(&entry.entry_id)
            .ok_or(StoreError::NotFound {
                entity: "subledger_entry",
                key: entry.entry_id.to_string(),
            })?;
        if current.reconciliation_status != expected_status {
            return Err(StoreError::OptimisticLock {
                entity: "subledger_entry",
                id: entry.entry_id.to_string(),
            });
        }
        state.subledger_entries.insert(entry.entry_id, entry);
        Ok(())
    }

    // ======================================================================
    // Subledger period status and failure reports
    // ======================================================================

    /// Looks up the close status row for a subledger period.
    #[must_use]
    pub fn get_subledger_period_status(
        &self,
        subledger_type: SubledgerType,
        period_code: &str,
    ) -> Option<SubledgerPeriodStatusRow> {
        self.state
            .borrow()
            .subledger_period_status
            .get(&(subledger_type, period_code.to_string()))
            .cloned()
    }

    /// Inserts or replaces the close status row for a subledger period.
    pub fn upsert_subledger_period_status(&self, row: SubledgerPeriodStatusRow) {
        self.state
            .borrow_mut()
            .subledger_period_status
            .insert((row.subledger_type, row.period_code.clone()), row);
    }

    /// Persists a reconciliation failure report.
    pub fn insert_failure_report(&self, report: ReconciliationFailureReportRow) {
        self.state
            .borrow_mut()
            .failure_reports
            .insert(report.id, report);
    }

    /// Looks up a failure report by ID.
    #[must_use]
    pub fn get_failure_report(&self, id: ReportId) -> Option<ReconciliationFailureReportRow> {
        self.state.borrow().failure_reports.get(&id).cloned()
    }

    /// Failure reports for one period, sorted by check time.
    #[must_use]
    pub fn failure_reports_for_period(
        &self,
        period_code: &str,
    ) -> Vec<ReconciliationFailureReportRow> {
        let mut reports: Vec<_> = self
            .state
            .borrow()
            .failure_reports
            .values()
            .filter(|r| r.period_code == period_code)
            .cloned()
            .collect();
        reports.sort_by_key(|r| r.checked_at);
        reports
    }

    // ======================================================================
    // Exchange rates and reference snapshots
    // ======================================================================

    /// Inserts a stored exchange rate.
    pub fn insert_exchange_rate(&self, rate: ExchangeRateRow) {
        self.state.borrow_mut().exchange_rates.insert(rate.id, rate);
    }

    /// All stored exchange rates effective on or before a date.
    #[must_use]
    pub fn exchange_rates_as_of(&self, as_of_date: NaiveDate) -> Vec<ExchangeRateRow> {
        let mut rates: Vec<_> = self
            .state
            .borrow()
            .exchange_rates
            .values()
            .filter(|r| r.effective_date <= as_of_date)
            .cloned()
            .collect();
        rates.sort_by_key(|r| (r.effective_date, r.id));
        rates
    }

    /// Persists a full reference snapshot.
    pub fn insert_reference_snapshot(&self, snapshot: ReferenceSnapshotRow) {
        self.state
            .borrow_mut()
            .reference_snapshots
            .insert(snapshot.snapshot_id, snapshot);
    }

    /// Looks up a reference snapshot by ID.
    #[must_use]
    pub fn get_reference_snapshot(&self, id: SnapshotId) -> Option<ReferenceSnapshotRow> {
        self.state.borrow().reference_snapshots.get(&id).cloned()
    }

    /// Forges an audit event's payload hash, bypassing every guard.
    ///
    /// Exists only so tamper-detection tests can corrupt a row and prove
    /// the verification layer catches it.
    #[cfg(test)]
    pub(crate) fn tamper_audit_payload(&self, index: usize, forged_payload_hash: String) {
        self.state.borrow_mut().audit_events[index].payload_hash = forged_payload_hash;
    }

    /// Removes an audit event outright, bypassing append-only protection.
    ///
    /// Exists only for tamper-detection tests.
    #[cfg(test)]
    pub(crate) fn tamper_audit_remove(&self, index: usize) {
        self.state.borrow_mut().audit_events.remove(index);
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;
    use serde_json::json;

    use quill_shared::types::ActorId;

    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn account(code: &str) -> AccountRow {
        AccountRow {
            id: AccountId::new(),
            code: code.to_string(),
            name: format!("Account {code}"),
            account_type: "asset".to_string(),
            normal_balance: LineSide::Debit,
            is_active: true,
        }
    }

    fn draft_entry(key: &str) -> JournalEntryRow {
        JournalEntryRow {
            id: JournalEntryId::new(),
            seq: None,
            idempotency_key: key.to_string(),
            source_event_id: EventId::new(),
            source_event_type: "generic.posting".to_string(),
            occurred_at: Utc.with_ymd_and_hms(2026, 6, 15, 8, 0, 0).unwrap(),
            effective_date: date(2026, 6, 15),
            posted_at: None,
            actor_id: ActorId::new(),
            status: EntryStatus::Draft,
            description: None,
            metadata: Some(json!({"ledger_id": "GL"})),
            posting_rule_version: 1,
            reversal_of_id: None,
            coa_version: Some(1),
            dimension_schema_version: Some(1),
            rounding_policy_version: Some(1),
            currency_registry_version: Some(1),
        }
    }

    fn line_for(entry: &JournalEntryRow, account: &AccountRow, side: LineSide, amount: Decimal) -> JournalLineRow {
        JournalLineRow {
            id: JournalLineId::new(),
            journal_entry_id: entry.id,
            account_id: account.id,
            side,
            amount,
            currency: "USD".to_string(),
            dimensions: None,
            is_rounding: false,
            line_memo: None,
            exchange_rate_id: None,
            line_seq: 0,
        }
    }

    #[test]
    fn test_rollback_restores_state() {
        let store = Store::new();
        {
            let txn = store.begin();
            txn.insert_account(account("1000")).unwrap();
            txn.rollback();
        }
        let txn = store.begin();
        assert!(txn.get_account_by_code("1000").is_none());
    }

    #[test]
    fn test_commit_persists_state() {
        let store = Store::new();
        {
            let txn = store.begin();
            txn.insert_account(account("1000")).unwrap();
            txn.commit();
        }
        let txn = store.begin();
        assert!(txn.get_account_by_code("1000").is_some());
    }

    #[test]
    fn test_sequences_survive_rollback() {
        let store = Store::new();
        {
            let txn = store.begin();
            assert_eq!(txn.next_sequence("journal_entry"), 1);
            txn.rollback();
        }
        let txn = store.begin();
        // The rolled-back allocation leaves a gap; 1 is never reused.
        assert_eq!(txn.next_sequence("journal_entry"), 2);
    }

    #[test]
    fn test_duplicate_idempotency_key_rejected() {
        let store = Store::new();
        let txn = store.begin();
        txn.insert_entry(draft_entry("key-1")).unwrap();
        let err = txn.insert_entry(draft_entry("key-1")).unwrap_err();
        assert_eq!(err.error_code(), "UNIQUE_VIOLATION");
    }

    #[test]
    fn test_posted_entry_fields_locked() {
        let store = Store::new();
        let txn = store.begin();
        let mut entry = draft_entry("key-1");
        entry.status = EntryStatus::Posted;
        entry.seq = Some(1);
        txn.insert_entry(entry.clone()).unwrap();

        let err = txn
            .update_entry(entry.id, |e| e.description = Some("edited".to_string()))
            .unwrap_err();
        assert_eq!(err.error_code(), "IMMUTABILITY_VIOLATION");

        let err = txn
            .update_entry(entry.id, |e| e.effective_date = date(2026, 7, 1))
            .unwrap_err();
        assert_eq!(err.error_code(), "IMMUTABILITY_VIOLATION");
    }

    #[test]
    fn test_posted_entry_may_transition_to_reversed() {
        let store = Store::new();
        let txn = store.begin();
        let mut entry = draft_entry("key-1");
        entry.status = EntryStatus::Posted;
        txn.insert_entry(entry.clone()).unwrap();

        let updated = txn
            .update_entry(entry.id, |e| e.status = EntryStatus::Reversed)
            .unwrap();
        assert_eq!(updated.status, EntryStatus::Reversed);

        // And a reversed entry admits no further change.
        let err = txn
            .update_entry(entry.id, |e| e.status = EntryStatus::Posted)
            .unwrap_err();
        assert_eq!(err.error_code(), "IMMUTABILITY_VIOLATION");
    }

    #[test]
    fn test_lines_of_posted_entry_locked() {
        let store = Store::new();
        let txn = store.begin();
        let acct = account("1000");
        txn.insert_account(acct.clone()).unwrap();
        let entry = draft_entry("key-1");
        txn.insert_entry(entry.clone()).unwrap();
        let line = line_for(&entry, &acct, LineSide::Debit, dec!(100));
        txn.insert_line(line.clone()).unwrap();
        txn.update_entry(entry.id, |e| e.status = EntryStatus::Posted)
            .unwrap();

        let err = txn
            .update_line(line.id, |l| l.amount = dec!(999))
            .unwrap_err();
        assert_eq!(err.error_code(), "IMMUTABILITY_VIOLATION");

        let extra = line_for(&entry, &acct, LineSide::Credit, dec!(100));
        let err = txn.insert_line(extra).unwrap_err();
        assert_eq!(err.error_code(), "IMMUTABILITY_VIOLATION");
    }

    #[test]
    fn test_second_rounding_line_rejected_by_trigger() {
        let store = Store::new();
        let txn = store.begin();
        let acct = account("9999");
        txn.insert_account(acct.clone()).unwrap();
        let entry = draft_entry("key-1");
        txn.insert_entry(entry.clone()).unwrap();

        let mut first = line_for(&entry, &acct, LineSide::Credit, dec!(0.01));
        first.is_rounding = true;
        txn.insert_line(first).unwrap();

        let mut second = line_for(&entry, &acct, LineSide::Debit, dec!(0.01));
        second.is_rounding = true;
        let err = txn.insert_line(second).unwrap_err();
        assert_eq!(err.error_code(), "ROUNDING_INVARIANT_VIOLATION");
    }

    #[test]
    fn test_oversized_rounding_line_rejected_by_trigger() {
        let store = Store::new();
        let txn = store.begin();
        let acct = account("9999");
        txn.insert_account(acct.clone()).unwrap();
        let entry = draft_entry("key-1");
        txn.insert_entry(entry.clone()).unwrap();
        txn.insert_line(line_for(&entry, &acct, LineSide::Debit, dec!(100)))
            .unwrap();

        let mut rounding = line_for(&entry, &acct, LineSide::Credit, dec!(5));
        rounding.is_rounding = true;
        let err = txn.insert_line(rounding).unwrap_err();
        assert_eq!(err.error_code(), "ROUNDING_THRESHOLD_VIOLATION");
    }

    #[test]
    fn test_closed_period_locked() {
        let store = Store::new();
        let txn = store.begin();
        txn.insert_period(FiscalPeriodRow {
            period_code: "2026-01".to_string(),
            name: "January 2026".to_string(),
            start_date: date(2026, 1, 1),
            end_date: date(2026, 1, 31),
            status: PeriodStatus::Closed,
            allows_adjustments: false,
            closed_at: None,
            closed_by_id: None,
        })
        .unwrap();

        for mutation in [
            Box::new(|p: &mut FiscalPeriodRow| p.end_date = date(2026, 1, 15))
                as Box<dyn FnOnce(&mut FiscalPeriodRow)>,
            Box::new(|p: &mut FiscalPeriodRow| p.status = PeriodStatus::Open),
            Box::new(|p: &mut FiscalPeriodRow| p.allows_adjustments = true),
            Box::new(|p: &mut FiscalPeriodRow| p.start_date = date(2025, 12, 1)),
        ] {
            let err = txn.update_period("2026-01", mutation).unwrap_err();
            assert_eq!(err.error_code(), "PERIOD_IMMUTABLE");
        }
    }

    #[test]
    fn test_account_balance_sums_posted_lines_only() {
        let store = Store::new();
        let txn = store.begin();
        let acct = account("2100");
        txn.insert_account(acct.clone()).unwrap();

        let draft = draft_entry("draft");
        txn.insert_entry(draft.clone()).unwrap();
        txn.insert_line(line_for(&draft, &acct, LineSide::Credit, dec!(50)))
            .unwrap();

        let staged = draft_entry("staged");
        txn.insert_entry(staged.clone()).unwrap();
        txn.insert_line(line_for(&staged, &acct, LineSide::Credit, dec!(1000)))
            .unwrap();
        txn.update_entry(staged.id, |e| e.status = EntryStatus::Posted)
            .unwrap();

        // Only the posted entry's credit counts: balance = -1000.
        assert_eq!(
            txn.account_balance(acct.id, date(2026, 12, 31), "USD", None),
            dec!(-1000)
        );
        // Date filter excludes it entirely.
        assert_eq!(
            txn.account_balance(acct.id, date(2026, 1, 1), "USD", None),
            Decimal::ZERO
        );
    }

    #[test]
    fn test_remove_account_guards_referenced() {
        let store = Store::new();
        let txn = store.begin();
        let acct = account("1000");
        txn.insert_account(acct.clone()).unwrap();
        let entry = draft_entry("key-1");
        txn.insert_entry(entry.clone()).unwrap();
        txn.insert_line(line_for(&entry, &acct, LineSide::Debit, dec!(10)))
            .unwrap();

        let err = txn.remove_account(acct.id).unwrap_err();
        assert_eq!(err.error_code(), "ACCOUNT_REFERENCED");
    }

    #[test]
    fn test_optimistic_lock_on_subledger_replace() {
        let store = Store::new();
        let txn = store.begin();
        let entry = SubledgerEntry::debit(
            SubledgerType::Ap,
            "V1",
            quill_shared::types::Money::of(dec!(100), "USD").unwrap(),
            "INVOICE",
            "INV-1",
            date(2026, 6, 15),
        )
        .unwrap();
        txn.insert_subledger_entry(entry.clone()).unwrap();

        let updated = entry
            .with_reconciliation(
                quill_shared::types::Money::of(dec!(100), "USD").unwrap(),
                SubledgerEntryId::new(),
            )
            .unwrap();
        // Wrong expectation: entry is Open, not Partial.
        let err = txn
            .replace_subledger_entry(ReconciliationStatus::Partial, updated.clone())
            .unwrap_err();
        assert_eq!(err.error_code(), "OPTIMISTIC_LOCK");

        txn.replace_subledger_entry(ReconciliationStatus::Open, updated)
            .unwrap();
    }

    proptest::proptest! {
        #![proptest_config(proptest::prelude::ProptestConfig::with_cases(50))]

        /// The balance query equals signed summation of the posted lines.
        #[test]
        fn prop_account_balance_matches_line_sum(
            amounts in proptest::collection::vec((1i64..1_000_000i64, proptest::bool::ANY), 1..8)
        ) {
            let store = Store::new();
            let txn = store.begin();
            let acct = account("3000");
            txn.insert_account(acct.clone()).unwrap();
            let entry = draft_entry("prop-key");
            txn.insert_entry(entry.clone()).unwrap();

            let mut expected = Decimal::ZERO;
            for (i, (cents, is_debit)) in amounts.iter().enumerate() {
                let amount = Decimal::new(*cents, 2);
                let side = if *is_debit { LineSide::Debit } else { LineSide::Credit };
                let mut line = line_for(&entry, &acct, side, amount);
                line.line_seq = u32::try_from(i).unwrap();
                txn.insert_line(line).unwrap();
                expected += if *is_debit { amount } else { -amount };
            }
            txn.update_entry(entry.id, |e| e.status = EntryStatus::Posted).unwrap();

            let balance = txn.account_balance(acct.id, date(2026, 12, 31), "USD", None);
            proptest::prop_assert_eq!(balance, expected);
        }
    }
}
