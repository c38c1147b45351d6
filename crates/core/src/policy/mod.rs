//! Compiled policy pack contract consumed from the configuration layer.

pub mod pack;

pub use pack::{
    ApprovalPolicyDef, CompiledPolicyPack, ControlRuleDef, PolicyScope, RoleBindingDef,
    SubledgerContractDef, build_subledger_registry,
};
