//! Pure subledger value objects: entries, balances, reconciliations.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use quill_shared::types::{
    JournalEntryId, JournalLineId, Money, ReconciliationId, SubledgerEntryId,
};

use super::control::SubledgerType;
use super::error::SubledgerError;

/// Direction of a subledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryDirection {
    /// Debit entry.
    Debit,
    /// Credit entry.
    Credit,
}

/// Reconciliation state of a subledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconciliationStatus {
    /// Not reconciled.
    Open,
    /// Partially reconciled.
    Partial,
    /// Fully reconciled.
    Reconciled,
    /// Written off.
    WrittenOff,
}

/// One-sided accounting line in a subledger, tied to an entity
/// (vendor, customer, item, bank account, contract).
///
/// Exactly one of `debit` or `credit` is set; this is enforced at
/// construction. Entries are immutable -- reconciliation produces a new
/// entry via [`SubledgerEntry::with_reconciliation`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubledgerEntry {
    /// Entry identifier.
    pub entry_id: SubledgerEntryId,
    /// Which subledger this entry belongs to.
    pub subledger_type: SubledgerType,
    /// The entity this entry is for (vendor, customer, ...).
    pub entity_id: String,
    /// Source document type, e.g. `INVOICE`.
    pub source_document_type: String,
    /// Source document identifier.
    pub source_document_id: String,
    /// Source line within the document, if line-level.
    pub source_line_id: Option<String>,
    /// Link to the GL journal entry.
    pub gl_entry_id: Option<JournalEntryId>,
    /// Link to the GL journal line, if line-level.
    pub gl_line_id: Option<JournalLineId>,
    /// Debit amount; mutually exclusive with `credit`.
    pub debit: Option<Money>,
    /// Credit amount; mutually exclusive with `debit`.
    pub credit: Option<Money>,
    /// Accounting effective date.
    pub effective_date: NaiveDate,
    /// When the entry was posted.
    pub posted_at: Option<DateTime<Utc>>,
    /// Reconciliation state.
    pub reconciliation_status: ReconciliationStatus,
    /// Amount reconciled so far.
    pub reconciled_amount: Option<Money>,
    /// Entries this one has been reconciled against.
    pub reconciled_to_ids: Vec<SubledgerEntryId>,
    /// Free-form memo.
    pub memo: String,
    /// External reference.
    pub reference: String,
    /// Dimension values.
    pub dimensions: BTreeMap<String, String>,
}

impl SubledgerEntry {
    /// Creates an entry, enforcing single-sidedness.
    ///
    /// # Errors
    ///
    /// Returns `SubledgerError::BothSides` or
    /// `SubledgerError::MissingAmount` when the debit/credit pairing is
    /// invalid.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        subledger_type: SubledgerType,
        entity_id: impl Into<String>,
        source_document_type: impl Into<String>,
        source_document_id: impl Into<String>,
        debit: Option<Money>,
        credit: Option<Money>,
        effective_date: NaiveDate,
    ) -> Result<Self, SubledgerError> {
        match (&debit, &credit) {
            (Some(_), Some(_)) => return Err(SubledgerError::BothSides),
            (None, None) => return Err(SubledgerError::MissingAmount),
            _ => {}
        }
        Ok(Self {
            entry_id: SubledgerEntryId::new(),
            subledger_type,
            entity_id: entity_id.into(),
            source_document_type: source_document_type.into(),
            source_document_id: source_document_id.into(),
            source_line_id: None,
            gl_entry_id: None,
            gl_line_id: None,
            debit,
            credit,
            effective_date,
            posted_at: None,
            reconciliation_status: ReconciliationStatus::Open,
            reconciled_amount: None,
            reconciled_to_ids: Vec::new(),
            memo: String::new(),
            reference: String::new(),
            dimensions: BTreeMap::new(),
        })
    }

    /// Creates a debit entry.
    ///
    /// # Errors
    ///
    /// Never fails for a present amount; kept fallible for signature
    /// symmetry with [`SubledgerEntry::new`].
    pub fn debit(
        subledger_type: SubledgerType,
        entity_id: impl Into<String>,
        amount: Money,
        source_document_type: impl Into<String>,
        source_document_id: impl Into<String>,
        effective_date: NaiveDate,
    ) -> Result<Self, SubledgerError> {
        Self::new(
            subledger_type,
            entity_id,
            source_document_type,
            source_document_id,
            Some(amount),
            None,
            effective_date,
        )
    }

    /// Creates a credit entry.
    ///
    /// # Errors
    ///
    /// Never fails for a present amount; kept fallible for signature
    /// symmetry with [`SubledgerEntry::new`].
    pub fn credit(
        subledger_type: SubledgerType,
        entity_id: impl Into<String>,
        amount: Money,
        source_document_type: impl Into<String>,
        source_document_id: impl Into<String>,
        effective_date: NaiveDate,
    ) -> Result<Self, SubledgerError> {
        Self::new(
            subledger_type,
            entity_id,
            source_document_type,
            source_document_id,
            None,
            Some(amount),
            effective_date,
        )
    }

    /// Direction of this entry.
    #[must_use]
    pub fn direction(&self) -> EntryDirection {
        if self.debit.is_some() {
            EntryDirection::Debit
        } else {
            EntryDirection::Credit
        }
    }

    /// The amount, whichever side it is on.
    #[must_use]
    pub fn amount(&self) -> &Money {
        self.debit
            .as_ref()
            .or(self.credit.as_ref())
            .expect("construction guarantees one side is set")
    }

    /// Amount with sign: positive for debit, negative for credit.
    #[must_use]
    pub fn signed_amount(&self) -> Money {
        match self.direction() {
            EntryDirection::Debit => self.amount().clone(),
            EntryDirection::Credit => self.amount().neg(),
        }
    }

    /// The currency code of this entry.
    #[must_use]
    pub fn currency(&self) -> &str {
        self.amount().currency.code()
    }

    /// True while the entry is not fully reconciled or written off.
    #[must_use]
    pub fn is_open(&self) -> bool {
        matches!(
            self.reconciliation_status,
            ReconciliationStatus::Open | ReconciliationStatus::Partial
        )
    }

    /// Remaining unreconciled amount.
    #[must_use]
    pub fn open_amount(&self) -> Money {
        match &self.reconciled_amount {
            None => self.amount().clone(),
            Some(reconciled) => self
                .amount()
                .try_sub(reconciled)
                .expect("reconciled amount shares the entry currency"),
        }
    }

    /// Returns a new entry with reconciliation applied.
    ///
    /// The original entry is not mutated; reconciliation state transitions
    /// `open -> partial -> reconciled` based on the accumulated amount.
    ///
    /// # Errors
    ///
    /// Returns `SubledgerError::CurrencyMismatch` when the amount is in a
    /// different currency than the entry.
    pub fn with_reconciliation(
        &self,
        reconciled_amount: Money,
        reconciled_to_id: SubledgerEntryId,
    ) -> Result<Self, SubledgerError> {
        let total = match &self.reconciled_amount {
            Some(existing) => existing.try_add(&reconciled_amount).map_err(|_| {
                SubledgerError::CurrencyMismatch {
                    left: existing.currency.code().to_string(),
                    right: reconciled_amount.currency.code().to_string(),
                }
            })?,
            None => {
                if reconciled_amount.currency != self.amount().currency {
                    return Err(SubledgerError::CurrencyMismatch {
                        left: self.currency().to_string(),
                        right: reconciled_amount.currency.code().to_string(),
                    });
                }
                reconciled_amount
            }
        };

        let status = if total.amount >= self.amount().amount {
            ReconciliationStatus::Reconciled
        } else if total.amount > Decimal::ZERO {
            ReconciliationStatus::Partial
        } else {
            ReconciliationStatus::Open
        };

        let mut next = self.clone();
        next.reconciliation_status = status;
        next.reconciled_amount = Some(total);
        next.reconciled_to_ids.push(reconciled_to_id);
        Ok(next)
    }
}

/// Point-in-time balance for a subledger entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubledgerBalance {
    /// The entity the balance is for; empty for aggregate balances.
    pub entity_id: String,
    /// Which subledger.
    pub subledger_type: SubledgerType,
    /// Balance date.
    pub as_of_date: NaiveDate,
    /// Sum of debit amounts.
    pub debit_total: Money,
    /// Sum of credit amounts.
    pub credit_total: Money,
    /// Net balance per the subledger's normal-balance convention.
    pub balance: Money,
    /// Number of open items included.
    pub open_item_count: usize,
}

impl SubledgerBalance {
    /// True when the net balance is zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.balance.is_zero()
    }
}

/// Result of matching a debit entry against a credit entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationResult {
    /// Reconciliation identifier.
    pub reconciliation_id: ReconciliationId,
    /// The debit entry matched.
    pub debit_entry_id: SubledgerEntryId,
    /// The credit entry matched.
    pub credit_entry_id: SubledgerEntryId,
    /// Amount reconciled.
    pub reconciled_amount: Money,
    /// When the reconciliation happened.
    pub reconciled_at: DateTime<Utc>,
    /// Whether both entries were fully consumed.
    pub is_full_match: bool,
    /// Free-form notes.
    pub notes: String,
}
