//! Accounting intent types.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use quill_shared::types::{
    AccountId, EconEventId, EventId, ExchangeRateId, Money, SnapshotId,
};

use super::error::IntentError;
use crate::journal::{LineSide, ReferenceData};

/// A single role-keyed line in an accounting intent.
///
/// Uses an account role (not a COA code) because the economic layer does
/// not know specific accounts -- only semantic roles. The posting layer
/// resolves the role at write time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentLine {
    /// Semantic account role, e.g. `INVENTORY_ASSET` or `GRNI`.
    pub account_role: String,
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
}

impl IntentLine {
    /// Creates an intent line.
    ///
    /// # Errors
    ///
    /// Returns `IntentError::NegativeAmount` if the amount is negative.
    pub fn new(
        account_role: impl Into<String>,
        side: LineSide,
        money: Money,
    ) -> Result<Self, IntentError> {
        if money.amount < Decimal::ZERO {
            return Err(IntentError::NegativeAmount(money.amount));
        }
        Ok(Self {
            account_role: account_role.into(),
            side,
            money,
            dimensions: None,
            memo: None,
            is_rounding: false,
        })
    }

    /// Creates a debit line.
    ///
    /// # Errors
    ///
    /// Returns `IntentError::NegativeAmount` if the amount is negative.
    pub fn debit(role: impl Into<String>, money: Money) -> Result<Self, IntentError> {
        Self::new(role, LineSide::Debit, money)
    }

    /// Creates a credit line.
    ///
    /// # Errors
    ///
    /// Returns `IntentError::NegativeAmount` if the amount is negative.
    pub fn credit(role: impl Into<String>, money: Money) -> Result<Self, IntentError> {
        Self::new(role, LineSide::Credit, money)
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

    /// The currency code of this line.
    #[must_use]
    pub fn currency(&self) -> &str {
        self.money.currency.code()
    }

    /// The amount of this line.
    #[must_use]
    pub fn amount(&self) -> Decimal {
        self.money.amount
    }
}

/// Intent for a single target ledger.
///
/// A single economic event may produce intents for multiple ledgers (GL
/// plus a subledger); each is processed atomically with the others.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerIntent {
    /// Target ledger identifier, e.g. `GL`, `AP`, `AR`.
    pub ledger_id: String,
    /// The lines for this ledger; non-empty.
    pub lines: Vec<IntentLine>,
}

impl LedgerIntent {
    /// Creates a ledger intent.
    ///
    /// # Errors
    ///
    /// Returns `IntentError::EmptyLedgerIntent` if `lines` is empty.
    pub fn new(ledger_id: impl Into<String>, lines: Vec<IntentLine>) -> Result<Self, IntentError> {
        let ledger_id = ledger_id.into();
        if lines.is_empty() {
            return Err(IntentError::EmptyLedgerIntent(ledger_id));
        }
        Ok(Self { ledger_id, lines })
    }

    /// All currencies in this intent.
    #[must_use]
    pub fn currencies(&self) -> BTreeSet<String> {
        self.lines
            .iter()
            .map(|line| line.currency().to_string())
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

    fn total_for_side(&self, side: LineSide, currency: Option<&str>) -> Decimal {
        self.lines
            .iter()
            .filter(|line| {
                line.side == side && currency.is_none_or(|code| line.currency() == code)
            })
            .map(IntentLine::amount)
            .sum()
    }
}

/// Reference snapshot versions recorded on the intent for deterministic
/// replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentSnapshot {
    /// Chart of accounts version.
    pub coa_version: u32,
    /// Dimension schema version.
    pub dimension_schema_version: u32,
    /// Rounding policy version.
    pub rounding_policy_version: u32,
    /// Currency registry version.
    pub currency_registry_version: u32,
    /// FX policy version, if rates were involved.
    pub fx_policy_version: Option<u32>,
    /// Reference to a persisted full snapshot, if one was taken.
    pub full_snapshot_id: Option<SnapshotId>,
}

impl IntentSnapshot {
    /// Creates a snapshot with the four required versions.
    #[must_use]
    pub const fn new(
        coa_version: u32,
        dimension_schema_version: u32,
        rounding_policy_version: u32,
        currency_registry_version: u32,
    ) -> Self {
        Self {
            coa_version,
            dimension_schema_version,
            rounding_policy_version,
            currency_registry_version,
            fx_policy_version: None,
            full_snapshot_id: None,
        }
    }

    /// Copies the versions out of a reference data snapshot.
    #[must_use]
    pub fn from_reference(reference: &ReferenceData) -> Self {
        Self::new(
            reference.coa_version,
            reference.dimension_schema_version,
            reference.rounding_policy_version,
            reference.currency_registry_version,
        )
    }

    /// Links this snapshot to a persisted full snapshot row.
    #[must_use]
    pub const fn with_full_snapshot(mut self, id: SnapshotId) -> Self {
        self.full_snapshot_id = Some(id);
        self
    }
}

/// The multi-ledger posting IR emitted by the economic layer.
///
/// Contains everything the posting layer needs to create journal entries:
/// role-keyed lines per ledger and the snapshot versions under which role
/// resolution must occur. All ledger intents commit together or not at
/// all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountingIntent {
    /// The economic event that produced this intent.
    pub econ_event_id: EconEventId,
    /// The original business event.
    pub source_event_id: EventId,
    /// Profile that interpreted the event.
    pub profile_id: String,
    /// Version of the profile used.
    pub profile_version: u32,
    /// Accounting effective date.
    pub effective_date: NaiveDate,
    /// Intents for each affected ledger; non-empty.
    pub ledger_intents: Vec<LedgerIntent>,
    /// Reference snapshot versions for replay.
    pub snapshot: IntentSnapshot,
    /// Optional entry description.
    pub description: Option<String>,
    /// When the intent was created.
    pub created_at: Option<DateTime<Utc>>,
    /// Optional structured metadata.
    pub metadata: Option<Value>,
}

impl AccountingIntent {
    /// Creates an accounting intent.
    ///
    /// # Errors
    ///
    /// Returns `IntentError::EmptyIntent` if `ledger_intents` is empty.
    pub fn new(
        econ_event_id: EconEventId,
        source_event_id: EventId,
        profile_id: impl Into<String>,
        profile_version: u32,
        effective_date: NaiveDate,
        ledger_intents: Vec<LedgerIntent>,
        snapshot: IntentSnapshot,
    ) -> Result<Self, IntentError> {
        if ledger_intents.is_empty() {
            return Err(IntentError::EmptyIntent);
        }
        Ok(Self {
            econ_event_id,
            source_event_id,
            profile_id: profile_id.into(),
            profile_version,
            effective_date,
            ledger_intents,
            snapshot,
            description: None,
            created_at: None,
            metadata: None,
        })
    }

    /// All ledger IDs in this intent.
    #[must_use]
    pub fn ledger_ids(&self) -> BTreeSet<&str> {
        self.ledger_intents
            .iter()
            .map(|intent| intent.ledger_id.as_str())
            .collect()
    }

    /// All account roles referenced in this intent.
    #[must_use]
    pub fn all_roles(&self) -> BTreeSet<&str> {
        self.ledger_intents
            .iter()
            .flat_map(|intent| intent.lines.iter())
            .map(|line| line.account_role.as_str())
            .collect()
    }

    /// Intent for a specific ledger, if present.
    #[must_use]
    pub fn get_ledger_intent(&self, ledger_id: &str) -> Option<&LedgerIntent> {
        self.ledger_intents
            .iter()
            .find(|intent| intent.ledger_id == ledger_id)
    }

    /// Idempotency key for one ledger posting:
    /// `econ_event_id:ledger_id:profile_version`.
    #[must_use]
    pub fn idempotency_key(&self, ledger_id: &str) -> String {
        format!(
            "{}:{}:{}",
            self.econ_event_id, ledger_id, self.profile_version
        )
    }

    /// Checks that every ledger intent is balanced.
    #[must_use]
    pub fn all_balanced(&self) -> bool {
        self.ledger_intents
            .iter()
            .all(|intent| intent.is_balanced(None))
    }
}

/// An intent line with the account role resolved to a COA account.
///
/// Produced by the journal writer after role resolution; the original role
/// is preserved for the audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedIntentLine {
    /// Resolved account ID.
    pub account_id: AccountId,
    /// Resolved account code.
    pub account_code: String,
    /// Original role, preserved for audit.
    pub account_role: String,
    /// Debit or credit.
    pub side: LineSide,
    /// Amount and currency.
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

impl ResolvedIntentLine {
    /// The currency code of this line.
    #[must_use]
    pub fn currency(&self) -> &str {
        self.money.currency.code()
    }

    /// The amount of this line.
    #[must_use]
    pub fn amount(&self) -> Decimal {
        self.money.amount
    }
}
