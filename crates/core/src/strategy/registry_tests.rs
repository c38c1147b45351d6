//! Tests for the strategy registry and the shared proposal assembly.

use std::sync::Arc;

use chrono::{NaiveDate, TimeZone, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::json;

use quill_shared::types::{AccountId, ActorId, EventId};

use super::error::RegistryError;
use super::generic::GenericPostingStrategy;
use super::proposal::{propose, rounding_threshold};
use super::registry::StrategyRegistry;
use super::types::{PostingStrategy, ReplayPolicy};
use crate::event::EventEnvelope;
use crate::journal::reference::RoundingAccount;
use crate::journal::{LineSpec, ReferenceData};
use crate::strategy::error::StrategyError;

/// Strategy with configurable lifecycle metadata for registry tests.
struct LifecycleStrategy {
    event_type: &'static str,
    version: u32,
    supported_from: u32,
    supported_to: Option<u32>,
    replay_policy: ReplayPolicy,
}

impl LifecycleStrategy {
    fn v(version: u32) -> Self {
        Self {
            event_type: "test.event",
            version,
            supported_from: 1,
            supported_to: None,
            replay_policy: ReplayPolicy::Strict,
        }
    }
}

impl PostingStrategy for LifecycleStrategy {
    fn event_type(&self) -> &str {
        self.event_type
    }

    fn version(&self) -> u32 {
        self.version
    }

    fn replay_policy(&self) -> ReplayPolicy {
        self.replay_policy
    }

    fn supported_from_version(&self) -> u32 {
        self.supported_from
    }

    fn supported_to_version(&self) -> Option<u32> {
        self.supported_to
    }

    fn compute_line_specs(
        &self,
        _event: &EventEnvelope,
        _reference: &ReferenceData,
    ) -> Result<Vec<LineSpec>, StrategyError> {
        Ok(vec![])
    }
}

fn registry_with_versions(versions: &[u32]) -> StrategyRegistry {
    let mut registry = StrategyRegistry::new();
    for &v in versions {
        registry.register(Arc::new(LifecycleStrategy::v(v))).unwrap();
    }
    registry
}

#[test]
fn test_get_latest_version_by_default() {
    let registry = registry_with_versions(&[1, 3, 2]);
    assert_eq!(registry.get("test.event", None).unwrap().version(), 3);
    assert_eq!(registry.latest_version("test.event").unwrap(), 3);
}

#[test]
fn test_get_exact_version() {
    let registry = registry_with_versions(&[1, 2]);
    assert_eq!(registry.get("test.event", Some(1)).unwrap().version(), 1);
}

#[test]
fn test_missing_version_reports_available_sorted() {
    let registry = registry_with_versions(&[3, 1]);
    let err = registry.get("test.event", Some(2)).unwrap_err();
    assert!(matches!(
        err,
        RegistryError::VersionNotFound { version: 2, ref available, .. } if *available == vec![1, 3]
    ));
    assert_eq!(err.error_code(), "STRATEGY_VERSION_NOT_FOUND");
}

#[test]
fn test_unknown_event_type() {
    let registry = StrategyRegistry::new();
    let err = registry.get("nope", None).unwrap_err();
    assert_eq!(err.error_code(), "STRATEGY_NOT_FOUND");
}

#[test]
fn test_duplicate_registration_rejected() {
    let mut registry = registry_with_versions(&[1]);
    let err = registry
        .register(Arc::new(LifecycleStrategy::v(1)))
        .unwrap_err();
    assert!(matches!(err, RegistryError::AlreadyRegistered { .. }));
}

#[test]
fn test_lifecycle_rejects_version_zero() {
    let mut registry = StrategyRegistry::new();
    let err = registry
        .register(Arc::new(LifecycleStrategy::v(0)))
        .unwrap_err();
    assert_eq!(err.error_code(), "STRATEGY_LIFECYCLE_ERROR");
}

#[test]
fn test_lifecycle_rejects_inverted_supported_range() {
    let mut registry = StrategyRegistry::new();
    let strategy = LifecycleStrategy {
        supported_from: 5,
        supported_to: Some(3),
        ..LifecycleStrategy::v(1)
    };
    let err = registry.register(Arc::new(strategy)).unwrap_err();
    assert_eq!(err.error_code(), "STRATEGY_LIFECYCLE_ERROR");
}

#[test]
fn test_replay_returns_original_version() {
    let registry = registry_with_versions(&[1, 2]);
    let strategy = registry.get_for_replay("test.event", 1, 1).unwrap();
    assert_eq!(strategy.version(), 1);
}

#[test]
fn test_replay_rejects_incompatible_system_version() {
    let mut registry = StrategyRegistry::new();
    let strategy = LifecycleStrategy {
        supported_from: 1,
        supported_to: Some(2),
        ..LifecycleStrategy::v(1)
    };
    registry.register(Arc::new(strategy)).unwrap();

    let err = registry.get_for_replay("test.event", 1, 3).unwrap_err();
    assert_eq!(err.error_code(), "STRATEGY_INCOMPATIBLE");
}

#[test]
fn test_permissive_replay_still_returns_original() {
    let mut registry = StrategyRegistry::new();
    for version in [1, 2] {
        let strategy = LifecycleStrategy {
            replay_policy: ReplayPolicy::Permissive,
            ..LifecycleStrategy::v(version)
        };
        registry.register(Arc::new(strategy)).unwrap();
    }

    let strategy = registry.get_for_replay("test.event", 1, 1).unwrap();
    assert_eq!(strategy.version(), 1);
}

#[test]
fn test_compatible_strategies_filters_by_range() {
    let mut registry = StrategyRegistry::new();
    registry
        .register(Arc::new(LifecycleStrategy {
            supported_to: Some(1),
            ..LifecycleStrategy::v(1)
        }))
        .unwrap();
    registry.register(Arc::new(LifecycleStrategy::v(2))).unwrap();

    let compatible = registry.compatible_strategies("test.event", 2).unwrap();
    assert_eq!(compatible.len(), 1);
    assert_eq!(compatible[0].version(), 2);
}

// ===========================================================================
// Proposal assembly
// ===========================================================================

fn reference() -> ReferenceData {
    let mut reference = ReferenceData::default();
    for code in ["5000", "2100", "9999"] {
        reference
            .account_ids_by_code
            .insert(code.to_string(), AccountId::new());
        reference.active_account_codes.insert(code.to_string());
    }
    reference.valid_currencies.insert("USD".parse().unwrap());
    reference.rounding_accounts.insert(
        "USD".to_string(),
        RoundingAccount {
            account_id: reference.account_ids_by_code["9999"],
            account_code: "9999".to_string(),
        },
    );
    reference
}

fn event(payload: serde_json::Value) -> EventEnvelope {
    EventEnvelope::new(
        EventId::from_uuid(uuid::Uuid::from_u128(42)),
        "generic.posting",
        Utc.with_ymd_and_hms(2026, 6, 15, 8, 0, 0).unwrap(),
        NaiveDate::from_ymd_opt(2026, 6, 15).unwrap(),
        ActorId::from_uuid(uuid::Uuid::from_u128(7)),
        "test",
        payload,
    )
}

fn lines_payload(debit: &str, credit: &str) -> serde_json::Value {
    json!({
        "lines": [
            {"account_code": "5000", "side": "debit", "amount": debit, "currency": "USD"},
            {"account_code": "2100", "side": "credit", "amount": credit, "currency": "USD"},
        ],
    })
}

#[test]
fn test_rounding_threshold_scales_with_lines() {
    assert_eq!(rounding_threshold(0), dec!(0.01));
    assert_eq!(rounding_threshold(1), dec!(0.01));
    assert_eq!(rounding_threshold(5), dec!(0.05));
}

#[test]
fn test_balanced_proposal_has_no_rounding_line() {
    let strategy = GenericPostingStrategy::new();
    let entry = propose(&strategy, &event(lines_payload("100.00", "100.00")), &reference())
        .unwrap();
    assert_eq!(entry.lines.len(), 2);
    assert!(entry.lines.iter().all(|l| !l.is_rounding));
}

#[test]
fn test_small_residual_gets_rounding_line() {
    let strategy = GenericPostingStrategy::new();
    let entry = propose(&strategy, &event(lines_payload("100.00", "99.99")), &reference())
        .unwrap();

    assert_eq!(entry.lines.len(), 3);
    let rounding = entry.lines.iter().find(|l| l.is_rounding).unwrap();
    assert_eq!(rounding.account_code, "9999");
    assert_eq!(rounding.money.amount, dec!(0.01));
    assert!(entry.is_balanced(None));
}

#[test]
fn test_residual_without_rounding_account_fails() {
    let strategy = GenericPostingStrategy::new();
    let mut reference = reference();
    reference.rounding_accounts.clear();

    let errors = propose(&strategy, &event(lines_payload("100.00", "99.99")), &reference)
        .unwrap_err();
    assert!(errors.iter().any(|e| e.code == "NO_ROUNDING_ACCOUNT"));
}

#[test]
fn test_large_imbalance_is_unbalanced_entry() {
    let strategy = GenericPostingStrategy::new();
    let errors = propose(&strategy, &event(lines_payload("1000.00", "900.00")), &reference())
        .unwrap_err();
    assert!(errors.iter().any(|e| e.code == "UNBALANCED_ENTRY"));
}

#[test]
fn test_explicit_rounding_line_preserved() {
    let strategy = GenericPostingStrategy::new();
    let payload = json!({
        "lines": [
            {"account_code": "5000", "side": "debit", "amount": "100.00", "currency": "USD"},
            {"account_code": "2100", "side": "credit", "amount": "99.99", "currency": "USD"},
            {"account_code": "9999", "side": "credit", "amount": "0.01", "currency": "USD", "is_rounding": true},
        ],
    });
    let entry = propose(&strategy, &event(payload), &reference()).unwrap();
    assert_eq!(entry.lines.iter().filter(|l| l.is_rounding).count(), 1);
    assert!(entry.is_balanced(None));
}

#[test]
fn test_multiple_rounding_lines_rejected() {
    let strategy = GenericPostingStrategy::new();
    let payload = json!({
        "lines": [
            {"account_code": "5000", "side": "debit", "amount": "100.02", "currency": "USD"},
            {"account_code": "2100", "side": "credit", "amount": "100.00", "currency": "USD"},
            {"account_code": "9999", "side": "credit", "amount": "0.01", "currency": "USD", "is_rounding": true},
            {"account_code": "9999", "side": "credit", "amount": "0.01", "currency": "USD", "is_rounding": true},
        ],
    });
    let errors = propose(&strategy, &event(payload), &reference()).unwrap_err();
    assert!(errors.iter().any(|e| e.code == "MULTIPLE_ROUNDING_LINES"));
}

#[test]
fn test_oversized_rounding_line_rejected() {
    let strategy = GenericPostingStrategy::new();
    let payload = json!({
        "lines": [
            {"account_code": "5000", "side": "debit", "amount": "100.50", "currency": "USD"},
            {"account_code": "2100", "side": "credit", "amount": "100.00", "currency": "USD"},
            {"account_code": "9999", "side": "credit", "amount": "0.50", "currency": "USD", "is_rounding": true},
        ],
    });
    let errors = propose(&strategy, &event(payload), &reference()).unwrap_err();
    assert!(errors.iter().any(|e| e.code == "ROUNDING_AMOUNT_EXCEEDED"));
}

#[test]
fn test_unknown_account_rejected() {
    let strategy = GenericPostingStrategy::new();
    let payload = json!({
        "lines": [
            {"account_code": "8888", "side": "debit", "amount": "10.00", "currency": "USD"},
            {"account_code": "2100", "side": "credit", "amount": "10.00", "currency": "USD"},
        ],
    });
    let errors = propose(&strategy, &event(payload), &reference()).unwrap_err();
    assert!(errors.iter().any(|e| e.code == "INVALID_ACCOUNT"));
}

#[test]
fn test_inactive_account_rejected() {
    let strategy = GenericPostingStrategy::new();
    let mut reference = reference();
    reference.active_account_codes.remove("5000");

    let errors = propose(&strategy, &event(lines_payload("10.00", "10.00")), &reference)
        .unwrap_err();
    assert!(errors.iter().any(|e| e.code == "ACCOUNT_INACTIVE"));
}

#[test]
fn test_invalid_currency_rejected() {
    let strategy = GenericPostingStrategy::new();
    let payload = json!({
        "lines": [
            {"account_code": "5000", "side": "debit", "amount": "10.00", "currency": "EUR"},
            {"account_code": "2100", "side": "credit", "amount": "10.00", "currency": "EUR"},
        ],
    });
    let errors = propose(&strategy, &event(payload), &reference()).unwrap_err();
    assert!(errors.iter().any(|e| e.code == "INVALID_CURRENCY"));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Strategy purity: the same event and reference data always produce
    /// an identical proposed entry.
    #[test]
    fn prop_proposal_is_deterministic(cents in 1i64..1_000_000i64) {
        let amount = Decimal::new(cents, 2);
        let strategy = GenericPostingStrategy::new();
        let env = event(lines_payload(&amount.to_string(), &amount.to_string()));
        let reference = reference();

        let first = propose(&strategy, &env, &reference).unwrap();
        let second = propose(&strategy, &env, &reference).unwrap();
        prop_assert_eq!(first, second);
    }

    /// Balanced proposals are accepted for any positive amount.
    #[test]
    fn prop_balanced_accepted(cents in 1i64..1_000_000i64) {
        let amount = Decimal::new(cents, 2);
        let strategy = GenericPostingStrategy::new();
        let env = event(lines_payload(&amount.to_string(), &amount.to_string()));
        let entry = propose(&strategy, &env, &reference()).unwrap();
        prop_assert!(entry.is_balanced(None));
    }
}
