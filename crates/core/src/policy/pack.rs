//! The compiled policy pack data contract.
//!
//! The configuration compiler lives outside the kernel; the kernel
//! consumes its output as plain data through the accessors here and treats
//! everything else as opaque.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use quill_shared::types::Currency;

use crate::subledger::{
    ControlAccountBinding, ReconciliationTiming, ReconciliationTolerance, SubledgerControlContract,
    SubledgerControlRegistry, SubledgerError,
};

/// Scope of a compiled pack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyScope {
    /// Legal entity the pack applies to; `*` for all.
    pub legal_entity: String,
    /// Default currency for the scope.
    pub currency: String,
}

/// A role-to-account-code binding from the pack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleBindingDef {
    /// Semantic account role.
    pub role: String,
    /// Chart of accounts code the role binds to.
    pub account_code: String,
    /// First date the binding is effective.
    pub effective_from: NaiveDate,
    /// Last date the binding is effective; open-ended when `None`.
    pub effective_to: Option<NaiveDate>,
}

/// A subledger control contract definition from the pack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubledgerContractDef {
    /// Subledger type identifier, e.g. `AP`.
    pub subledger_type: String,
    /// Role of the GL control account.
    pub control_account_role: String,
    /// Resolved control account code.
    pub control_account_code: String,
    /// True if a debit increases the subledger balance.
    pub is_debit_normal: bool,
    /// Subledger currency; defaults to the scope currency.
    pub currency: Option<String>,
    /// When reconciliation must occur.
    pub timing: ReconciliationTiming,
    /// Permissible variance.
    pub tolerance: ReconciliationTolerance,
    /// Check the balance after every post.
    pub enforce_on_post: bool,
    /// Require reconciliation to close the period.
    pub enforce_on_close: bool,
}

/// An approval policy definition; opaque to the kernel beyond its name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalPolicyDef {
    /// Policy name.
    pub policy_name: String,
    /// Policy version.
    pub version: u32,
    /// Workflow the policy applies to.
    pub applies_to_workflow: String,
    /// Optional action within the workflow.
    pub applies_to_action: Option<String>,
}

/// A control rule definition; opaque to the kernel beyond its identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlRuleDef {
    /// Rule identifier.
    pub rule_id: String,
    /// Human-readable description.
    pub description: String,
    /// Whether the rule is active.
    pub enabled: bool,
}

/// Output of the configuration compiler, as consumed by the kernel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledPolicyPack {
    /// Configuration identity.
    pub config_id: String,
    /// Configuration version.
    pub config_version: u32,
    /// Scope the pack applies to.
    pub scope: PolicyScope,
    /// Role bindings.
    pub role_bindings: Vec<RoleBindingDef>,
    /// Subledger control contract definitions.
    pub subledger_contracts: Vec<SubledgerContractDef>,
    /// Approval policies.
    pub approval_policies: Vec<ApprovalPolicyDef>,
    /// Control rules.
    pub controls: Vec<ControlRuleDef>,
}

impl CompiledPolicyPack {
    /// A minimal pack with no bindings or contracts.
    #[must_use]
    pub fn empty(config_id: impl Into<String>, currency: impl Into<String>) -> Self {
        Self {
            config_id: config_id.into(),
            config_version: 1,
            scope: PolicyScope {
                legal_entity: "*".to_string(),
                currency: currency.into(),
            },
            role_bindings: Vec::new(),
            subledger_contracts: Vec::new(),
            approval_policies: Vec::new(),
            controls: Vec::new(),
        }
    }
}

/// Compiles the pack's subledger contract definitions into a registry.
///
/// This is the single build path for the control registry: contract
/// definitions are parsed, currencies default to the scope currency, and
/// the resulting contracts are registered keyed by subledger type.
///
/// # Errors
///
/// Returns `SubledgerError::UnknownSubledgerType` for an unrecognized
/// subledger type identifier and
/// `SubledgerError::InvalidContractCurrency` for an invalid contract
/// currency.
pub fn build_subledger_registry(
    pack: &CompiledPolicyPack,
) -> Result<SubledgerControlRegistry, SubledgerError> {
    let mut registry = SubledgerControlRegistry::new();

    for def in &pack.subledger_contracts {
        let subledger_type = def.subledger_type.parse()?;
        let currency_code = def.currency.as_deref().unwrap_or(&pack.scope.currency);
        let currency = Currency::new(currency_code)
            .map_err(|_| SubledgerError::InvalidContractCurrency(currency_code.to_string()))?;

        registry.register(SubledgerControlContract {
            binding: ControlAccountBinding {
                subledger_type,
                control_account_role: def.control_account_role.clone(),
                control_account_code: def.control_account_code.clone(),
                is_debit_normal: def.is_debit_normal,
                currency,
            },
            timing: def.timing,
            tolerance: def.tolerance.clone(),
            enforce_on_post: def.enforce_on_post,
            enforce_on_close: def.enforce_on_close,
        });
    }

    Ok(registry)
}
