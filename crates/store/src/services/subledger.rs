//! Stateful subledger services (AP, AR, Bank, Inventory, WIP).
//!
//! Each service manages one subledger's per-entity entries: posting with
//! a GL link, balances per the normal-balance convention, open items, and
//! debit/credit reconciliation. All services share one implementation
//! parameterized by subledger type and document-type whitelist.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde_json::json;
use tracing::{info, warn};

use quill_core::clock::Clock;
use quill_core::subledger::{
    EntryDirection, ReconciliationResult, SubledgerBalance, SubledgerEntry, SubledgerError,
    SubledgerType,
};
use quill_shared::types::{ActorId, JournalEntryId, Money, ReconciliationId};

use super::auditor::AuditorService;
use crate::error::StoreError;
use crate::memory::Txn;

/// Allowed source document types for the AP subledger.
pub const AP_DOCUMENT_TYPES: &[&str] =
    &["INVOICE", "PAYMENT", "CREDIT_MEMO", "REVERSAL", "ADJUSTMENT"];
/// Allowed source document types for the AR subledger.
pub const AR_DOCUMENT_TYPES: &[&str] =
    &["INVOICE", "PAYMENT", "CREDIT_MEMO", "REVERSAL", "ADJUSTMENT"];
/// Allowed source document types for the bank subledger.
pub const BANK_DOCUMENT_TYPES: &[&str] = &[
    "DEPOSIT",
    "WITHDRAWAL",
    "TRANSFER",
    "FEE",
    "INTEREST",
    "REVERSAL",
    "ADJUSTMENT",
];
/// Allowed source document types for the inventory subledger.
pub const INVENTORY_DOCUMENT_TYPES: &[&str] = &[
    "RECEIPT",
    "ISSUE",
    "ADJUSTMENT",
    "REVALUATION",
    "TRANSFER",
    "REVERSAL",
];
/// Allowed source document types for the contract/WIP subledger.
pub const CONTRACT_DOCUMENT_TYPES: &[&str] =
    &["COST_INCURRENCE", "BILLING", "FEE", "REVERSAL", "ADJUSTMENT"];

/// Subledger service errors.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SubledgerServiceError {
    /// An entry failed field validation.
    #[error("Subledger entry validation failed: {errors:?}")]
    ValidationFailed {
        /// Validation messages.
        errors: Vec<String>,
    },

    /// The entry's document type is not allowed for this subledger.
    #[error("Invalid {subledger_type} source document type: {document_type}")]
    InvalidDocumentType {
        /// Which subledger rejected it.
        subledger_type: SubledgerType,
        /// The rejected type.
        document_type: String,
    },

    /// The entry belongs to a different subledger than this service.
    #[error("Entry is for {entry_type}, not {service_type}")]
    WrongSubledger {
        /// The entry's subledger.
        entry_type: SubledgerType,
        /// This service's subledger.
        service_type: SubledgerType,
    },

    /// A pure reconciliation precondition failed.
    #[error(transparent)]
    Domain(#[from] SubledgerError),

    /// A store guard fired.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SubledgerServiceError {
    /// Returns the machine-readable error code.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::ValidationFailed { .. } => "INVALID_SUBLEDGER_ENTRY",
            Self::InvalidDocumentType { .. } => "INVALID_DOCUMENT_TYPE",
            Self::WrongSubledger { .. } => "UNKNOWN_SUBLEDGER_TYPE",
            Self::Domain(inner) => inner.error_code(),
            Self::Store(inner) => inner.error_code(),
        }
    }
}

/// One subledger's stateful service.
pub struct SubledgerService<'t, 'a> {
    txn: &'t Txn<'a>,
    clock: &'a dyn Clock,
    auditor: AuditorService<'t, 'a>,
    subledger_type: SubledgerType,
    document_types: &'static [&'static str],
}

impl<'t, 'a> SubledgerService<'t, 'a> {
    fn new(
        txn: &'t Txn<'a>,
        clock: &'a dyn Clock,
        subledger_type: SubledgerType,
        document_types: &'static [&'static str],
    ) -> Self {
        Self {
            txn,
            clock,
            auditor: AuditorService::new(txn, clock),
            subledger_type,
            document_types,
        }
    }

    /// Accounts payable (vendor) subledger.
    #[must_use]
    pub fn ap(txn: &'t Txn<'a>, clock: &'a dyn Clock) -> Self {
        Self::new(txn, clock, SubledgerType::Ap, AP_DOCUMENT_TYPES)
    }

    /// Accounts receivable (customer) subledger.
    #[must_use]
    pub fn ar(txn: &'t Txn<'a>, clock: &'a dyn Clock) -> Self {
        Self::new(txn, clock, SubledgerType::Ar, AR_DOCUMENT_TYPES)
    }

    /// Bank transaction subledger.
    #[must_use]
    pub fn bank(txn: &'t Txn<'a>, clock: &'a dyn Clock) -> Self {
        Self::new(txn, clock, SubledgerType::Bank, BANK_DOCUMENT_TYPES)
    }

    /// Inventory subledger.
    #[must_use]
    pub fn inventory(txn: &'t Txn<'a>, clock: &'a dyn Clock) -> Self {
        Self::new(
            txn,
            clock,
            SubledgerType::Inventory,
            INVENTORY_DOCUMENT_TYPES,
        )
    }

    /// Contract/WIP subledger.
    #[must_use]
    pub fn contract(txn: &'t Txn<'a>, clock: &'a dyn Clock) -> Self {
        Self::new(txn, clock, SubledgerType::Wip, CONTRACT_DOCUMENT_TYPES)
    }

    /// Which subledger this service manages.
    #[must_use]
    pub const fn subledger_type(&self) -> SubledgerType {
        self.subledger_type
    }

    /// Validates an entry's required fields.
    #[must_use]
    pub fn validate_entry(&self, entry: &SubledgerEntry) -> Vec<String> {
        let mut errors = Vec::new();
        if entry.entity_id.is_empty() {
            errors.push("Entity ID is required".to_string());
        }
        if entry.source_document_type.is_empty() {
            errors.push("Source document type is required".to_string());
        }
        if entry.source_document_id.is_empty() {
            errors.push("Source document ID is required".to_string());
        }
        if entry.amount().is_zero() {
            errors.push("Amount cannot be zero".to_string());
        }
        if !errors.is_empty() {
            warn!(
                entry_id = %entry.entry_id,
                subledger_type = %entry.subledger_type,
                errors = ?errors,
                "subledger_entry_validation_failed"
            );
        }
        errors
    }

    /// Posts an entry to this subledger with a GL link.
    ///
    /// Idempotent on `(gl_entry_id, subledger_type, source_line_id)`: a
    /// duplicate post returns the existing entry.
    ///
    /// # Errors
    ///
    /// Returns `SubledgerServiceError::WrongSubledger`,
    /// `SubledgerServiceError::ValidationFailed`, or
    /// `SubledgerServiceError::InvalidDocumentType`.
    pub fn post(
        &self,
        mut entry: SubledgerEntry,
        gl_entry_id: JournalEntryId,
        actor_id: ActorId,
    ) -> Result<SubledgerEntry, SubledgerServiceError> {
        if entry.subledger_type != self.subledger_type {
            return Err(SubledgerServiceError::WrongSubledger {
                entry_type: entry.subledger_type,
                service_type: self.subledger_type,
            });
        }

        let errors = self.validate_entry(&entry);
        if !errors.is_empty() {
            return Err(SubledgerServiceError::ValidationFailed { errors });
        }

        if !self
            .document_types
            .contains(&entry.source_document_type.as_str())
        {
            return Err(SubledgerServiceError::InvalidDocumentType {
                subledger_type: self.subledger_type,
                document_type: entry.source_document_type,
            });
        }

        if let Some(existing) = self.txn.find_subledger_entry_by_gl(
            gl_entry_id,
            self.subledger_type,
            entry.source_line_id.as_deref(),
        ) {
            info!(
                entry_id = %existing.entry_id,
                subledger_type = %self.subledger_type,
                gl_entry_id = %gl_entry_id,
                "subledger_post_idempotent"
            );
            return Ok(existing);
        }

        entry.gl_entry_id = Some(gl_entry_id);
        entry.posted_at = Some(self.clock.now());
        self.txn.insert_subledger_entry(entry.clone())?;

        self.auditor.record(
            "subledger_entry",
            &entry.entry_id.to_string(),
            "posted",
            &json!({
                "subledger_type": self.subledger_type.as_str(),
                "entity_id": entry.entity_id,
                "gl_entry_id": gl_entry_id.to_string(),
                "direction": match entry.direction() {
                    EntryDirection::Debit => "debit",
                    EntryDirection::Credit => "credit",
                },
                "amount": entry.amount().amount.to_string(),
                "currency": entry.currency(),
                "actor_id": actor_id.to_string(),
            }),
        );
        info!(
            entry_id = %entry.entry_id,
            subledger_type = %self.subledger_type,
            entity_id = entry.entity_id,
            gl_entry_id = %gl_entry_id,
            "subledger_entry_posted"
        );
        Ok(entry)
    }

    /// Point-in-time balance for one entity, respecting the subledger's
    /// normal-balance convention: credit-normal subledgers report
    /// `credits - debits`, debit-normal report `debits - credits`.
    ///
    /// # Errors
    ///
    /// Returns a currency error only for an invalid `currency` code.
    pub fn get_balance(
        &self,
        entity_id: &str,
        as_of_date: NaiveDate,
        currency: &str,
    ) -> Result<SubledgerBalance, SubledgerServiceError> {
        let entries: Vec<SubledgerEntry> = self
            .txn
            .subledger_entries(self.subledger_type, Some(entity_id))
            .into_iter()
            .filter(|e| e.effective_date <= as_of_date && e.currency() == currency)
            .collect();
        self.balance_from_entries(entity_id, as_of_date, currency, &entries)
    }

    /// Aggregate balance across every entity of this subledger.
    ///
    /// # Errors
    ///
    /// Returns a currency error only for an invalid `currency` code.
    pub fn get_aggregate_balance(
        &self,
        as_of_date: NaiveDate,
        currency: &str,
    ) -> Result<SubledgerBalance, SubledgerServiceError> {
        let entries: Vec<SubledgerEntry> = self
            .txn
            .subledger_entries(self.subledger_type, None)
            .into_iter()
            .filter(|e| e.effective_date <= as_of_date && e.currency() == currency)
            .collect();
        self.balance_from_entries("", as_of_date, currency, &entries)
    }

    fn balance_from_entries(
        &self,
        entity_id: &str,
        as_of_date: NaiveDate,
        currency: &str,
        entries: &[SubledgerEntry],
    ) -> Result<SubledgerBalance, SubledgerServiceError> {
        let mut debit_total = Decimal::ZERO;
        let mut credit_total = Decimal::ZERO;
        let mut open_item_count = 0;
        for entry in entries {
            if let Some(debit) = &entry.debit {
                debit_total += debit.amount;
            }
            if let Some(credit) = &entry.credit {
                credit_total += credit.amount;
            }
            if entry.is_open() {
                open_item_count += 1;
            }
        }

        let balance_amount = if self.subledger_type.is_credit_normal() {
            credit_total - debit_total
        } else {
            debit_total - credit_total
        };

        info!(
            entity_id = entity_id,
            subledger_type = %self.subledger_type,
            debit_total = %debit_total,
            credit_total = %credit_total,
            balance = %balance_amount,
            open_item_count = open_item_count,
            "subledger_balance_calculated"
        );

        Ok(SubledgerBalance {
            entity_id: entity_id.to_string(),
            subledger_type: self.subledger_type,
            as_of_date,
            debit_total: Money::of(debit_total, currency).map_err(|_| {
                SubledgerServiceError::Domain(SubledgerError::InvalidContractCurrency(
                    currency.to_string(),
                ))
            })?,
            credit_total: Money::of(credit_total, currency).map_err(|_| {
                SubledgerServiceError::Domain(SubledgerError::InvalidContractCurrency(
                    currency.to_string(),
                ))
            })?,
            balance: Money::of(balance_amount, currency).map_err(|_| {
                SubledgerServiceError::Domain(SubledgerError::InvalidContractCurrency(
                    currency.to_string(),
                ))
            })?,
            open_item_count,
        })
    }

    /// Entries for one entity whose reconciliation is still open or
    /// partial.
    #[must_use]
    pub fn get_open_items(&self, entity_id: &str, currency: Option<&str>) -> Vec<SubledgerEntry> {
        self.txn
            .subledger_entries(self.subledger_type, Some(entity_id))
            .into_iter()
            .filter(|e| e.is_open() && currency.is_none_or(|c| e.currency() == c))
            .collect()
    }

    /// Reconciles a debit entry against a credit entry.
    ///
    /// Both entries must be from this subledger, for the same entity, in
    /// the same currency, open, and correctly directed. The default
    /// amount is the smaller of the two open amounts. Updated entries are
    /// persisted via compare-and-swap on their reconciliation status.
    ///
    /// # Errors
    ///
    /// Returns precondition failures from the domain layer and
    /// `StoreError::OptimisticLock` when either entry changed
    /// concurrently.
    pub fn reconcile(
        &self,
        debit_entry: &SubledgerEntry,
        credit_entry: &SubledgerEntry,
        amount: Option<Money>,
        reconciled_at: DateTime<Utc>,
    ) -> Result<ReconciliationResult, SubledgerServiceError> {
        info!(
            debit_entry_id = %debit_entry.entry_id,
            credit_entry_id = %credit_entry.entry_id,
            subledger_type = %debit_entry.subledger_type,
            "subledger_reconciliation_started"
        );

        if debit_entry.subledger_type != credit_entry.subledger_type {
            return Err(SubledgerError::DifferentSubledgers.into());
        }
        if debit_entry.entity_id != credit_entry.entity_id {
            return Err(SubledgerError::DifferentEntities.into());
        }
        if debit_entry.direction() != EntryDirection::Debit {
            return Err(SubledgerError::FirstEntryNotDebit.into());
        }
        if credit_entry.direction() != EntryDirection::Credit {
            return Err(SubledgerError::SecondEntryNotCredit.into());
        }
        if debit_entry.currency() != credit_entry.currency() {
            return Err(SubledgerError::CurrencyMismatch {
                left: debit_entry.currency().to_string(),
                right: credit_entry.currency().to_string(),
            }
            .into());
        }
        if !debit_entry.is_open() || !credit_entry.is_open() {
            return Err(SubledgerError::EntriesNotOpen.into());
        }

        let amount = match amount {
            Some(amount) => amount,
            None => {
                let debit_open = debit_entry.open_amount();
                let credit_open = credit_entry.open_amount();
                if debit_open.amount <= credit_open.amount {
                    debit_open
                } else {
                    credit_open
                }
            }
        };

        if amount.amount <= Decimal::ZERO {
            return Err(SubledgerError::NonPositiveAmount.into());
        }
        if amount.amount > debit_entry.open_amount().amount {
            return Err(SubledgerError::AmountExceedsOpen { side: "debit" }.into());
        }
        if amount.amount > credit_entry.open_amount().amount {
            return Err(SubledgerError::AmountExceedsOpen { side: "credit" }.into());
        }

        let is_full_match = amount.amount == debit_entry.open_amount().amount
            && amount.amount == credit_entry.open_amount().amount;

        let updated_debit =
            debit_entry.with_reconciliation(amount.clone(), credit_entry.entry_id)?;
        let updated_credit =
            credit_entry.with_reconciliation(amount.clone(), debit_entry.entry_id)?;
        self.txn
            .replace_subledger_entry(debit_entry.reconciliation_status, updated_debit)?;
        self.txn
            .replace_subledger_entry(credit_entry.reconciliation_status, updated_credit)?;

        let result = ReconciliationResult {
            reconciliation_id: ReconciliationId::new(),
            debit_entry_id: debit_entry.entry_id,
            credit_entry_id: credit_entry.entry_id,
            reconciled_amount: amount,
            reconciled_at,
            is_full_match,
            notes: String::new(),
        };

        info!(
            debit_entry_id = %debit_entry.entry_id,
            credit_entry_id = %credit_entry.entry_id,
            reconciled_amount = %result.reconciled_amount.amount,
            is_full_match = is_full_match,
            "subledger_reconciliation_completed"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    use quill_core::clock::FixedClock;
    use quill_core::subledger::ReconciliationStatus;

    use super::*;
    use crate::memory::Store;

    fn clock() -> FixedClock {
        FixedClock::new(Utc.with_ymd_and_hms(2026, 6, 15, 12, 0, 0).unwrap())
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn usd(amount: Decimal) -> Money {
        Money::of(amount, "USD").unwrap()
    }

    fn ap_credit(entity: &str, amount: Decimal, doc_id: &str) -> SubledgerEntry {
        SubledgerEntry::credit(
            SubledgerType::Ap,
            entity,
            usd(amount),
            "INVOICE",
            doc_id,
            date(2026, 6, 15),
        )
        .unwrap()
    }

    fn ap_debit(entity: &str, amount: Decimal, doc_id: &str) -> SubledgerEntry {
        SubledgerEntry::debit(
            SubledgerType::Ap,
            entity,
            usd(amount),
            "PAYMENT",
            doc_id,
            date(2026, 6, 20),
        )
        .unwrap()
    }

    fn with_line_id(mut entry: SubledgerEntry, line_id: &str) -> SubledgerEntry {
        entry.source_line_id = Some(line_id.to_string());
        entry
    }

    #[test]
    fn test_post_links_gl_and_stamps_posted_at() {
        let store = Store::new();
        let txn = store.begin();
        let clock = clock();
        let service = SubledgerService::ap(&txn, &clock);
        let gl_entry_id = JournalEntryId::new();

        let posted = service
            .post(
                with_line_id(ap_credit("V1", dec!(1000), "INV-1"), "0"),
                gl_entry_id,
                ActorId::new(),
            )
            .unwrap();

        assert_eq!(posted.gl_entry_id, Some(gl_entry_id));
        assert!(posted.posted_at.is_some());
    }

    #[test]
    fn test_post_is_idempotent_on_gl_triple() {
        let store = Store::new();
        let txn = store.begin();
        let clock = clock();
        let service = SubledgerService::ap(&txn, &clock);
        let gl_entry_id = JournalEntryId::new();
        let actor = ActorId::new();

        let first = service
            .post(
                with_line_id(ap_credit("V1", dec!(1000), "INV-1"), "0"),
                gl_entry_id,
                actor,
            )
            .unwrap();
        let second = service
            .post(
                with_line_id(ap_credit("V1", dec!(1000), "INV-1"), "0"),
                gl_entry_id,
                actor,
            )
            .unwrap();

        assert_eq!(first.entry_id, second.entry_id);
        assert_eq!(txn.subledger_entries(SubledgerType::Ap, None).len(), 1);
    }

    #[test]
    fn test_post_rejects_wrong_document_type() {
        let store = Store::new();
        let txn = store.begin();
        let clock = clock();
        let service = SubledgerService::ap(&txn, &clock);
        let entry = SubledgerEntry::credit(
            SubledgerType::Ap,
            "V1",
            usd(dec!(10)),
            "DEPOSIT",
            "X-1",
            date(2026, 6, 15),
        )
        .unwrap();

        let err = service
            .post(entry, JournalEntryId::new(), ActorId::new())
            .unwrap_err();
        assert_eq!(err.error_code(), "INVALID_DOCUMENT_TYPE");
    }

    #[test]
    fn test_post_rejects_wrong_subledger() {
        let store = Store::new();
        let txn = store.begin();
        let clock = clock();
        let service = SubledgerService::ar(&txn, &clock);

        let err = service
            .post(
                ap_credit("V1", dec!(10), "INV-1"),
                JournalEntryId::new(),
                ActorId::new(),
            )
            .unwrap_err();
        assert_eq!(err.error_code(), "UNKNOWN_SUBLEDGER_TYPE");
    }

    #[test]
    fn test_ap_balance_is_credit_normal() {
        let store = Store::new();
        let txn = store.begin();
        let clock = clock();
        let service = SubledgerService::ap(&txn, &clock);
        let actor = ActorId::new();
        service
            .post(
                with_line_id(ap_credit("V1", dec!(1000), "INV-1"), "0"),
                JournalEntryId::new(),
                actor,
            )
            .unwrap();
        service
            .post(
                with_line_id(ap_debit("V1", dec!(400), "PAY-1"), "0"),
                JournalEntryId::new(),
                actor,
            )
            .unwrap();

        let balance = service
            .get_balance("V1", date(2026, 12, 31), "USD")
            .unwrap();
        assert_eq!(balance.balance.amount, dec!(600));
        assert_eq!(balance.debit_total.amount, dec!(400));
        assert_eq!(balance.credit_total.amount, dec!(1000));
        assert_eq!(balance.open_item_count, 2);
    }

    #[test]
    fn test_inventory_balance_is_debit_normal() {
        let store = Store::new();
        let txn = store.begin();
        let clock = clock();
        let service = SubledgerService::inventory(&txn, &clock);
        let entry = SubledgerEntry::debit(
            SubledgerType::Inventory,
            "SKU-1",
            usd(dec!(250)),
            "RECEIPT",
            "GRN-1",
            date(2026, 6, 15),
        )
        .unwrap();
        service
            .post(with_line_id(entry, "0"), JournalEntryId::new(), ActorId::new())
            .unwrap();

        let balance = service
            .get_balance("SKU-1", date(2026, 12, 31), "USD")
            .unwrap();
        assert_eq!(balance.balance.amount, dec!(250));
    }

    #[test]
    fn test_balance_respects_as_of_date() {
        let store = Store::new();
        let txn = store.begin();
        let clock = clock();
        let service = SubledgerService::ap(&txn, &clock);
        service
            .post(
                with_line_id(ap_credit("V1", dec!(1000), "INV-1"), "0"),
                JournalEntryId::new(),
                ActorId::new(),
            )
            .unwrap();

        let before = service.get_balance("V1", date(2026, 6, 1), "USD").unwrap();
        assert!(before.balance.is_zero());
    }

    #[test]
    fn test_reconcile_full_match() {
        let store = Store::new();
        let txn = store.begin();
        let clock = clock();
        let service = SubledgerService::ap(&txn, &clock);
        let actor = ActorId::new();
        let invoice = service
            .post(
                with_line_id(ap_credit("V1", dec!(500), "INV-1"), "0"),
                JournalEntryId::new(),
                actor,
            )
            .unwrap();
        let payment = service
            .post(
                with_line_id(ap_debit("V1", dec!(500), "PAY-1"), "0"),
                JournalEntryId::new(),
                actor,
            )
            .unwrap();

        let result = service
            .reconcile(&payment, &invoice, None, clock.now())
            .unwrap();
        assert!(result.is_full_match);
        assert_eq!(result.reconciled_amount.amount, dec!(500));

        let stored = txn.get_subledger_entry(invoice.entry_id).unwrap();
        assert_eq!(stored.reconciliation_status, ReconciliationStatus::Reconciled);
        assert!(service.get_open_items("V1", None).is_empty());
    }

    #[test]
    fn test_reconcile_partial_defaults_to_min_open() {
        let store = Store::new();
        let txn = store.begin();
        let clock = clock();
        let service = SubledgerService::ap(&txn, &clock);
        let actor = ActorId::new();
        let invoice = service
            .post(
                with_line_id(ap_credit("V1", dec!(1000), "INV-1"), "0"),
                JournalEntryId::new(),
                actor,
            )
            .unwrap();
        let payment = service
            .post(
                with_line_id(ap_debit("V1", dec!(400), "PAY-1"), "0"),
                JournalEntryId::new(),
                actor,
            )
            .unwrap();

        let result = service
            .reconcile(&payment, &invoice, None, clock.now())
            .unwrap();
        assert!(!result.is_full_match);
        assert_eq!(result.reconciled_amount.amount, dec!(400));

        let stored_invoice = txn.get_subledger_entry(invoice.entry_id).unwrap();
        assert_eq!(
            stored_invoice.reconciliation_status,
            ReconciliationStatus::Partial
        );
        assert_eq!(stored_invoice.open_amount().amount, dec!(600));
    }

    #[test]
    fn test_reconcile_rejects_mismatched_entities() {
        let store = Store::new();
        let txn = store.begin();
        let clock = clock();
        let service = SubledgerService::ap(&txn, &clock);
        let actor = ActorId::new();
        let invoice = service
            .post(
                with_line_id(ap_credit("V1", dec!(100), "INV-1"), "0"),
                JournalEntryId::new(),
                actor,
            )
            .unwrap();
        let payment = service
            .post(
                with_line_id(ap_debit("V2", dec!(100), "PAY-1"), "0"),
                JournalEntryId::new(),
                actor,
            )
            .unwrap();

        let err = service
            .reconcile(&payment, &invoice, None, clock.now())
            .unwrap_err();
        assert_eq!(err.error_code(), "INVALID_RECONCILIATION");
    }

    #[test]
    fn test_reconcile_rejects_wrong_directions() {
        let store = Store::new();
        let txn = store.begin();
        let clock = clock();
        let service = SubledgerService::ap(&txn, &clock);
        let actor = ActorId::new();
        let invoice = service
            .post(
                with_line_id(ap_credit("V1", dec!(100), "INV-1"), "0"),
                JournalEntryId::new(),
                actor,
            )
            .unwrap();
        let another = service
            .post(
                with_line_id(ap_credit("V1", dec!(100), "INV-2"), "0"),
                JournalEntryId::new(),
                actor,
            )
            .unwrap();

        let err = service
            .reconcile(&invoice, &another, None, clock.now())
            .unwrap_err();
        assert_eq!(err.error_code(), "INVALID_RECONCILIATION");
    }

    #[test]
    fn test_reconcile_rejects_amount_over_open() {
        let store = Store::new();
        let txn = store.begin();
        let clock = clock();
        let service = SubledgerService::ap(&txn, &clock);
        let actor = ActorId::new();
        let invoice = service
            .post(
                with_line_id(ap_credit("V1", dec!(100), "INV-1"), "0"),
                JournalEntryId::new(),
                actor,
            )
            .unwrap();
        let payment = service
            .post(
                with_line_id(ap_debit("V1", dec!(50), "PAY-1"), "0"),
                JournalEntryId::new(),
                actor,
            )
            .unwrap();

        let err = service
            .reconcile(&payment, &invoice, Some(usd(dec!(75))), clock.now())
            .unwrap_err();
        assert_eq!(err.error_code(), "INVALID_RECONCILIATION");
    }
}
