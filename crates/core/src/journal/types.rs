//! Core posting DTOs.

use std::collections::{BTreeMap, BTreeSet};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use quill_shared::types::{AccountId, ExchangeRateId, Money};

use super::error::DtoError;
use crate::event::EventEnvelope;

/// Which side of the entry a line is on.
///
/// In double-entry bookkeeping amounts are always non-negative; direction
/// is carried by the side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineSide {
    /// Debit side.
    Debit,
    /// Credit side.
    Credit,
}

impl LineSide {
    /// The opposite side.
    #[must_use]
    pub const fn flipped(self) -> Self {
        match self {
            Self::Debit => Self::Credit,
            Self::Credit => Self::Debit,
        }
    }

    /// Canonical lowercase representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Debit => "debit",
            Self::Credit => "credit",
        }
    }
}

impl std::fmt::Display for LineSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a journal entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    /// Entry is being constructed inside a transaction scope.
    Draft,
    /// Entry is posted: sequence assigned, lines frozen.
    Posted,
    /// Entry has been reversed by a later entry.
    Reversed,
}

impl EntryStatus {
    /// Returns true once the entry and its lines are frozen.
    #[must_use]
    pub fn is_immutable(self) -> bool {
        matches!(self, Self::Posted | Self::Reversed)
    }
}

/// Specification for a journal line, as produced by a posting strategy.
///
/// Carries an account code (not an ID); code resolution happens in the
/// proposal assembly step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineSpec {
    /// Chart of accounts code.
    pub account_code: String,
    /// Debit or credit.
    pub side: LineSide,
    /// Amount and currency; amount is non-negative.
    pub money: Money,
    /// Optional dimension values keyed by dimension code.
    pub dimensions: Option<BTreeMap<String, String>>,
    /// Optional line memo.
    pub memo: Option<String>,
    /// Whether this line carries a rounding remainder.
    pub is_rounding: bool,
}

impl LineSpec {
    /// Creates a line spec.
    ///
    /// # Errors
    ///
    /// Returns `DtoError::NegativeLineAmount` if the amount is negative.
    pub fn new(
        account_code: impl Into<String>,
        side: LineSide,
        money: Money,
    ) -> Result<Self, DtoError> {
        if money.amount < Decimal::ZERO {
            return Err(DtoError::NegativeLineAmount(money.amount));
        }
        Ok(Self {
            account_code: account_code.into(),
            side,
            money,
            dimensions: None,
            memo: None,
            is_rounding: false,
        })
    }

    /// Attaches dimension values.
    #[must_use]
    pub fn with_dimensions(mut self, dimensions: BTreeMap<String, String>) -> Self {
        self.dimensions = Some(dimensions);
        self
    }

    /// Attaches a memo.
    #[must_use]
    pub fn with_memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = Some(memo.into());
        self
    }

    /// Marks this line as the rounding line.
    #[must_use]
    pub fn as_rounding(mut self) -> Self {
        self.is_rounding = true;
        self
    }
}

/// A line after account-code resolution, ready for persistence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposedLine {
    /// Resolved account ID.
    pub account_id: AccountId,
    /// Original account code, preserved for audit.
    pub account_code: String,
    /// Debit or credit.
    pub side: LineSide,
    /// Amount and currency; amount is non-negative.
    pub money: Money,
    /// Optional dimension values.
    pub dimensions: Option<BTreeMap<String, String>>,
    /// Optional line memo.
    pub memo: Option<String>,
    /// Whether this line carries a rounding remainder.
    pub is_rounding: bool,
    /// Exchange rate used for this line, if any.
    pub exchange_rate_id: Option<ExchangeRateId>,
    /// Position within the entry.
    pub line_seq: u32,
}

/// Pure domain output of the posting strategy layer.
///
/// Deterministic: the same event and reference data always produce the
/// same proposed entry. Records the four reference snapshot versions so the
/// posting can be replayed against identical reference state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposedJournalEntry {
    /// The event this entry was derived from.
    pub event: EventEnvelope,
    /// Resolved lines, in `line_seq` order.
    pub lines: Vec<ProposedLine>,
    /// Optional entry description.
    pub description: Option<String>,
    /// Optional structured metadata.
    pub metadata: Option<Value>,
    /// Version of the posting rule that produced this entry.
    pub posting_rule_version: u32,
    /// Chart of accounts version at proposal time.
    pub coa_version: u32,
    /// Dimension schema version at proposal time.
    pub dimension_schema_version: u32,
    /// Rounding policy version at proposal time.
    pub rounding_policy_version: u32,
    /// Currency registry version at proposal time.
    pub currency_registry_version: u32,
}

impl ProposedJournalEntry {
    /// Creates a proposed entry.
    ///
    /// # Errors
    ///
    /// Returns `DtoError::EmptyEntry` if `lines` is empty.
    pub fn new(event: EventEnvelope, lines: Vec<ProposedLine>) -> Result<Self, DtoError> {
        if lines.is_empty() {
            return Err(DtoError::EmptyEntry);
        }
        Ok(Self {
            event,
            lines,
            description: None,
            metadata: None,
            posting_rule_version: 1,
            coa_version: 1,
            dimension_schema_version: 1,
            rounding_policy_version: 1,
            currency_registry_version: 1,
        })
    }

    /// The idempotency key, derived from the event.
    #[must_use]
    pub fn idempotency_key(&self) -> String {
        self.event.idempotency_key()
    }

    /// All currencies present in this entry.
    #[must_use]
    pub fn currencies(&self) -> BTreeSet<String> {
        self.lines
            .iter()
            .map(|line| line.money.currency.code().to_string())
            .collect()
    }

    /// Sum of debit amounts, optionally filtered by currency.
    #[must_use]
    pub fn total_debits(&self, currency: Option<&str>) -> Decimal {
        self.total_for_side(LineSide::Debit, currency)
    }

    /// Sum of credit amounts, optionally filtered by currency.
    #[must_use]
    pub fn total_credits(&self, currency: Option<&str>) -> Decimal {
        self.total_for_side(LineSide::Credit, currency)
    }

    /// Checks that debits equal credits for a currency, or for all.
    #[must_use]
    pub fn is_balanced(&self, currency: Option<&str>) -> bool {
        match currency {
            Some(code) => self.total_debits(Some(code)) == self.total_credits(Some(code)),
            None => self
                .currencies()
                .iter()
                .all(|code| self.is_balanced(Some(code))),
        }
    }

    /// Imbalance (debits - credits) for a specific currency.
    #[must_use]
    pub fn imbalance(&self, currency: &str) -> Decimal {
        self.total_debits(Some(currency)) - self.total_credits(Some(currency))
    }

    fn total_for_side(&self, side: LineSide, currency: Option<&str>) -> Decimal {
        self.lines
            .iter()
            .filter(|line| {
                line.side == side
                    && currency.is_none_or(|code| line.money.currency.code() == code)
            })
            .map(|line| line.money.amount)
            .sum()
    }
}
