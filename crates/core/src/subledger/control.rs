//! Subledger/GL control contracts and the pure reconciler.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use quill_shared::types::{Currency, Money};

use super::error::SubledgerError;

/// Canonical subledger type identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubledgerType {
    /// Accounts payable.
    Ap,
    /// Accounts receivable.
    Ar,
    /// Inventory.
    Inventory,
    /// Fixed asset register.
    FixedAssets,
    /// Bank transactions.
    Bank,
    /// Payroll liabilities.
    Payroll,
    /// Work in progress.
    Wip,
    /// Intercompany transactions.
    Intercompany,
}

impl SubledgerType {
    /// Canonical uppercase identifier, matching ledger IDs in intents.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ap => "AP",
            Self::Ar => "AR",
            Self::Inventory => "INVENTORY",
            Self::FixedAssets => "FIXED_ASSETS",
            Self::Bank => "BANK",
            Self::Payroll => "PAYROLL",
            Self::Wip => "WIP",
            Self::Intercompany => "INTERCOMPANY",
        }
    }

    /// Credit-normal subledgers (liabilities) report `credit - debit`;
    /// everything else reports `debit - credit`.
    #[must_use]
    pub const fn is_credit_normal(self) -> bool {
        matches!(self, Self::Ap | Self::Payroll)
    }
}

impl std::fmt::Display for SubledgerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SubledgerType {
    type Err = SubledgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AP" => Ok(Self::Ap),
            "AR" => Ok(Self::Ar),
            "INVENTORY" => Ok(Self::Inventory),
            "FIXED_ASSETS" => Ok(Self::FixedAssets),
            "BANK" => Ok(Self::Bank),
            "PAYROLL" => Ok(Self::Payroll),
            "WIP" => Ok(Self::Wip),
            "INTERCOMPANY" => Ok(Self::Intercompany),
            other => Err(SubledgerError::UnknownSubledgerType(other.to_string())),
        }
    }
}

/// When reconciliation must occur.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconciliationTiming {
    /// Every posting must balance.
    RealTime,
    /// End-of-day reconciliation.
    Daily,
    /// Only at period close.
    PeriodEnd,
}

/// How tolerance is calculated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToleranceType {
    /// Zero tolerance; must be exact.
    None,
    /// Fixed amount.
    Absolute,
    /// Percentage of the control balance, optionally capped.
    Percentage,
}

/// Permissible variance between SL aggregate and GL control balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationTolerance {
    /// Which rule applies.
    pub tolerance_type: ToleranceType,
    /// Fixed amount for `Absolute`.
    pub absolute_amount: Decimal,
    /// Percent of balance for `Percentage`.
    pub percentage: Decimal,
    /// Absolute cap for `Percentage`.
    pub max_absolute_cap: Option<Decimal>,
}

impl ReconciliationTolerance {
    /// No tolerance; variance must be exactly zero.
    #[must_use]
    pub fn zero() -> Self {
        Self {
            tolerance_type: ToleranceType::None,
            absolute_amount: Decimal::ZERO,
            percentage: Decimal::ZERO,
            max_absolute_cap: None,
        }
    }

    /// Fixed-amount tolerance.
    #[must_use]
    pub fn absolute(amount: Decimal) -> Self {
        Self {
            tolerance_type: ToleranceType::Absolute,
            absolute_amount: amount,
            percentage: Decimal::ZERO,
            max_absolute_cap: None,
        }
    }

    /// Percentage-of-balance tolerance, with an optional absolute cap.
    #[must_use]
    pub fn percent(percentage: Decimal, max_absolute_cap: Option<Decimal>) -> Self {
        Self {
            tolerance_type: ToleranceType::Percentage,
            absolute_amount: Decimal::ZERO,
            percentage,
            max_absolute_cap,
        }
    }

    /// Whether a variance is within this tolerance, given the control
    /// balance the percentage applies to.
    #[must_use]
    pub fn is_within_tolerance(&self, variance: Decimal, balance: Decimal) -> bool {
        let abs_variance = variance.abs();
        match self.tolerance_type {
            ToleranceType::None => abs_variance.is_zero(),
            ToleranceType::Absolute => abs_variance <= self.absolute_amount,
            ToleranceType::Percentage => {
                let mut threshold = balance.abs() * self.percentage / Decimal::ONE_HUNDRED;
                if let Some(cap) = self.max_absolute_cap {
                    threshold = threshold.min(cap);
                }
                abs_variance <= threshold
            }
        }
    }
}

/// Binds a subledger type to its GL control account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlAccountBinding {
    /// Which subledger.
    pub subledger_type: SubledgerType,
    /// Role of the control account in the COA, e.g. `AP_CONTROL`.
    pub control_account_role: String,
    /// Resolved account code, e.g. `2100`.
    pub control_account_code: String,
    /// True if a debit increases the subledger balance.
    pub is_debit_normal: bool,
    /// Primary currency for this subledger.
    pub currency: Currency,
}

/// Complete control contract for one subledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubledgerControlContract {
    /// The control account binding.
    pub binding: ControlAccountBinding,
    /// When reconciliation must occur.
    pub timing: ReconciliationTiming,
    /// Permissible variance.
    pub tolerance: ReconciliationTolerance,
    /// Check the balance after every post.
    pub enforce_on_post: bool,
    /// Require reconciliation to close the period.
    pub enforce_on_close: bool,
}

impl SubledgerControlContract {
    /// Which subledger this contract governs.
    #[must_use]
    pub const fn subledger_type(&self) -> SubledgerType {
        self.binding.subledger_type
    }

    /// Role of the GL control account.
    #[must_use]
    pub fn control_account_role(&self) -> &str {
        &self.binding.control_account_role
    }
}

/// Registry of all subledger control contracts.
///
/// Read-only after construction; the store-side writer and period close
/// consult it for enforcement.
#[derive(Debug, Clone, Default)]
pub struct SubledgerControlRegistry {
    contracts: HashMap<SubledgerType, SubledgerControlContract>,
}

impl SubledgerControlRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) a contract.
    pub fn register(&mut self, contract: SubledgerControlContract) {
        info!(
            subledger_type = %contract.subledger_type(),
            control_account_role = contract.control_account_role(),
            enforce_on_post = contract.enforce_on_post,
            enforce_on_close = contract.enforce_on_close,
            "subledger_contract_registered"
        );
        self.contracts.insert(contract.subledger_type(), contract);
    }

    /// Contract for a subledger type.
    #[must_use]
    pub fn get(&self, subledger_type: SubledgerType) -> Option<&SubledgerControlContract> {
        self.contracts.get(&subledger_type)
    }

    /// All registered contracts.
    #[must_use]
    pub fn all(&self) -> Vec<&SubledgerControlContract> {
        let mut contracts: Vec<_> = self.contracts.values().collect();
        contracts.sort_by_key(|c| c.subledger_type().as_str());
        contracts
    }

    /// Contract whose control account has the given role.
    #[must_use]
    pub fn get_by_control_account(&self, role: &str) -> Option<&SubledgerControlContract> {
        self.contracts
            .values()
            .find(|c| c.control_account_role() == role)
    }
}

/// Result of one SL-vs-GL reconciliation check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationCheck {
    /// Which subledger was checked.
    pub subledger_type: SubledgerType,
    /// Balance date of the check.
    pub as_of_date: NaiveDate,
    /// Subledger aggregate balance.
    pub subledger_balance: Money,
    /// GL control account balance, normalized to the subledger's sign
    /// convention.
    pub control_account_balance: Money,
    /// `subledger_balance - control_account_balance`.
    pub variance: Money,
    /// True when the variance is exactly zero.
    pub is_reconciled: bool,
    /// True when the variance is within the contract tolerance.
    pub is_within_tolerance: bool,
    /// Tolerance that was applied.
    pub tolerance_used: ReconciliationTolerance,
    /// When the check ran.
    pub checked_at: DateTime<Utc>,
    /// Number of subledger entries included.
    pub entries_checked: usize,
}

/// How a control contract was violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationType {
    /// A posting would leave the subledger out of balance with its
    /// control account.
    OutOfBalance,
    /// A period close is blocked by an out-of-tolerance variance.
    PeriodCloseBlocked,
    /// Variance is nonzero but within tolerance.
    ToleranceWarning,
}

/// A violation of a subledger control contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationViolation {
    /// Which subledger.
    pub subledger_type: SubledgerType,
    /// The check that produced this violation.
    pub check: ReconciliationCheck,
    /// Classification of the violation.
    pub violation_type: ViolationType,
    /// Human-readable description.
    pub message: String,
    /// Whether this violation prevents the post or close.
    pub blocking: bool,
}

/// Pure reconciler for subledger/GL balances.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubledgerReconciler;

impl SubledgerReconciler {
    /// Creates a reconciler.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Compares a subledger aggregate balance against the GL control
    /// account balance.
    ///
    /// Convention: positive variance means the subledger exceeds the
    /// control account.
    ///
    /// # Errors
    ///
    /// Returns `SubledgerError::CurrencyMismatch` when the two balances
    /// are in different currencies.
    pub fn reconcile(
        &self,
        contract: &SubledgerControlContract,
        subledger_balance: &Money,
        control_account_balance: &Money,
        as_of_date: NaiveDate,
        checked_at: DateTime<Utc>,
        entries_checked: usize,
    ) -> Result<ReconciliationCheck, SubledgerError> {
        let variance = subledger_balance
            .try_sub(control_account_balance)
            .map_err(|_| SubledgerError::CurrencyMismatch {
                left: subledger_balance.currency.code().to_string(),
                right: control_account_balance.currency.code().to_string(),
            })?;

        let is_within = contract
            .tolerance
            .is_within_tolerance(variance.amount, control_account_balance.amount);

        let check = ReconciliationCheck {
            subledger_type: contract.subledger_type(),
            as_of_date,
            subledger_balance: subledger_balance.clone(),
            control_account_balance: control_account_balance.clone(),
            is_reconciled: variance.is_zero(),
            is_within_tolerance: is_within,
            variance,
            tolerance_used: contract.tolerance.clone(),
            checked_at,
            entries_checked,
        };

        if check.is_reconciled {
            info!(
                subledger_type = %contract.subledger_type(),
                as_of_date = %as_of_date,
                status = "reconciled",
                "subledger_validated"
            );
        } else if check.is_within_tolerance {
            info!(
                subledger_type = %contract.subledger_type(),
                as_of_date = %as_of_date,
                status = "within_tolerance",
                variance = %check.variance.amount,
                "subledger_validated"
            );
        } else {
            warn!(
                subledger_type = %contract.subledger_type(),
                as_of_date = %as_of_date,
                status = "out_of_balance",
                variance = %check.variance.amount,
                subledger_balance = %check.subledger_balance.amount,
                control_balance = %check.control_account_balance.amount,
                "subledger_violation"
            );
        }

        Ok(check)
    }

    /// Validates that a posting maintains the control contract.
    ///
    /// When `enforce_on_post` is set and the post-state variance exceeds
    /// tolerance, a blocking out-of-balance violation is returned.
    ///
    /// # Errors
    ///
    /// Returns `SubledgerError::CurrencyMismatch` when the balances are in
    /// different currencies.
    pub fn validate_post(
        &self,
        contract: &SubledgerControlContract,
        subledger_balance_after: &Money,
        control_balance_after: &Money,
        as_of_date: NaiveDate,
        checked_at: DateTime<Utc>,
    ) -> Result<Vec<ReconciliationViolation>, SubledgerError> {
        if !contract.enforce_on_post {
            return Ok(Vec::new());
        }

        let check = self.reconcile(
            contract,
            subledger_balance_after,
            control_balance_after,
            as_of_date,
            checked_at,
            0,
        )?;

        if check.is_within_tolerance {
            return Ok(Vec::new());
        }

        warn!(
            subledger_type = %contract.subledger_type(),
            as_of_date = %as_of_date,
            variance = %check.variance.amount,
            violation_type = "out_of_balance",
            "subledger_post_violation"
        );
        let message = format!(
            "Posting would cause {} to be out of balance with control account. Variance: {}",
            contract.subledger_type(),
            check.variance
        );
        Ok(vec![ReconciliationViolation {
            subledger_type: contract.subledger_type(),
            check,
            violation_type: ViolationType::OutOfBalance,
            message,
            blocking: true,
        }])
    }

    /// Validates that a subledger can close its period.
    ///
    /// An out-of-tolerance variance produces a blocking close violation; a
    /// nonzero variance inside tolerance produces a non-blocking warning.
    ///
    /// # Errors
    ///
    /// Returns `SubledgerError::CurrencyMismatch` when the balances are in
    /// different currencies.
    pub fn validate_period_close(
        &self,
        contract: &SubledgerControlContract,
        subledger_balance: &Money,
        control_account_balance: &Money,
        period_end_date: NaiveDate,
        checked_at: DateTime<Utc>,
    ) -> Result<Vec<ReconciliationViolation>, SubledgerError> {
        if !contract.enforce_on_close {
            return Ok(Vec::new());
        }

        let check = self.reconcile(
            contract,
            subledger_balance,
            control_account_balance,
            period_end_date,
            checked_at,
            0,
        )?;

        if !check.is_reconciled && !check.is_within_tolerance {
            warn!(
                subledger_type = %contract.subledger_type(),
                period_end_date = %period_end_date,
                variance = %check.variance.amount,
                violation_type = "period_close_blocked",
                "subledger_period_close_blocked"
            );
            let message = format!(
                "Cannot close period: {} is not reconciled with control account. Variance: {}",
                contract.subledger_type(),
                check.variance
            );
            return Ok(vec![ReconciliationViolation {
                subledger_type: contract.subledger_type(),
                check,
                violation_type: ViolationType::PeriodCloseBlocked,
                message,
                blocking: true,
            }]);
        }

        if !check.is_reconciled {
            info!(
                subledger_type = %contract.subledger_type(),
                period_end_date = %period_end_date,
                variance = %check.variance.amount,
                "subledger_period_close_tolerance_warning"
            );
            let message = format!(
                "{} has variance of {} (within tolerance)",
                contract.subledger_type(),
                check.variance
            );
            return Ok(vec![ReconciliationViolation {
                subledger_type: contract.subledger_type(),
                check,
                violation_type: ViolationType::ToleranceWarning,
                message,
                blocking: false,
            }]);
        }

        Ok(Vec::new())
    }
}
