//! Tests for control contracts, tolerances, and the pure reconciler.

use chrono::{NaiveDate, TimeZone, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use quill_shared::types::{Currency, Money};

use super::control::{
    ControlAccountBinding, ReconciliationTiming, ReconciliationTolerance, SubledgerControlContract,
    SubledgerControlRegistry, SubledgerReconciler, SubledgerType, ViolationType,
};

fn usd(amount: Decimal) -> Money {
    Money::of(amount, "USD").unwrap()
}

fn contract(tolerance: ReconciliationTolerance) -> SubledgerControlContract {
    SubledgerControlContract {
        binding: ControlAccountBinding {
            subledger_type: SubledgerType::Ap,
            control_account_role: "AP_CONTROL".to_string(),
            control_account_code: "2100".to_string(),
            is_debit_normal: false,
            currency: Currency::new("USD").unwrap(),
        },
        timing: ReconciliationTiming::RealTime,
        tolerance,
        enforce_on_post: true,
        enforce_on_close: true,
    }
}

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 6, 30).unwrap()
}

fn checked_at() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 6, 30, 18, 0, 0).unwrap()
}

#[test]
fn test_subledger_type_parse_roundtrip() {
    for sl_type in [
        SubledgerType::Ap,
        SubledgerType::Ar,
        SubledgerType::Inventory,
        SubledgerType::Bank,
        SubledgerType::Wip,
    ] {
        assert_eq!(sl_type.as_str().parse::<SubledgerType>().unwrap(), sl_type);
    }
    assert!("GL".parse::<SubledgerType>().is_err());
}

#[test]
fn test_credit_normal_convention() {
    assert!(SubledgerType::Ap.is_credit_normal());
    assert!(SubledgerType::Payroll.is_credit_normal());
    assert!(!SubledgerType::Ar.is_credit_normal());
    assert!(!SubledgerType::Bank.is_credit_normal());
    assert!(!SubledgerType::Inventory.is_credit_normal());
    assert!(!SubledgerType::Wip.is_credit_normal());
}

#[test]
fn test_zero_tolerance_requires_exact() {
    let tolerance = ReconciliationTolerance::zero();
    assert!(tolerance.is_within_tolerance(Decimal::ZERO, dec!(1000)));
    assert!(!tolerance.is_within_tolerance(dec!(0.01), dec!(1000)));
}

#[test]
fn test_absolute_tolerance() {
    let tolerance = ReconciliationTolerance::absolute(dec!(0.05));
    assert!(tolerance.is_within_tolerance(dec!(0.05), dec!(1000)));
    assert!(tolerance.is_within_tolerance(dec!(-0.05), dec!(1000)));
    assert!(!tolerance.is_within_tolerance(dec!(0.06), dec!(1000)));
}

#[test]
fn test_percentage_tolerance_with_cap() {
    // 1% of 1000 = 10, capped at 5.
    let tolerance = ReconciliationTolerance::percent(dec!(1), Some(dec!(5)));
    assert!(tolerance.is_within_tolerance(dec!(5), dec!(1000)));
    assert!(!tolerance.is_within_tolerance(dec!(6), dec!(1000)));

    // Without the cap, 10 is allowed.
    let uncapped = ReconciliationTolerance::percent(dec!(1), None);
    assert!(uncapped.is_within_tolerance(dec!(10), dec!(1000)));
}

#[test]
fn test_registry_lookup() {
    let mut registry = SubledgerControlRegistry::new();
    registry.register(contract(ReconciliationTolerance::zero()));

    assert!(registry.get(SubledgerType::Ap).is_some());
    assert!(registry.get(SubledgerType::Ar).is_none());
    assert!(registry.get_by_control_account("AP_CONTROL").is_some());
    assert!(registry.get_by_control_account("AR_CONTROL").is_none());
    assert_eq!(registry.all().len(), 1);
}

#[test]
fn test_reconcile_computes_variance() {
    let reconciler = SubledgerReconciler::new();
    let check = reconciler
        .reconcile(
            &contract(ReconciliationTolerance::zero()),
            &usd(dec!(999.50)),
            &usd(dec!(1000)),
            date(),
            checked_at(),
            12,
        )
        .unwrap();

    assert_eq!(check.variance.amount, dec!(-0.50));
    assert!(!check.is_reconciled);
    assert!(!check.is_within_tolerance);
    assert_eq!(check.entries_checked, 12);
}

#[test]
fn test_reconcile_currency_mismatch_fails() {
    let reconciler = SubledgerReconciler::new();
    let err = reconciler
        .reconcile(
            &contract(ReconciliationTolerance::zero()),
            &usd(dec!(1)),
            &Money::of(dec!(1), "EUR").unwrap(),
            date(),
            checked_at(),
            0,
        )
        .unwrap_err();
    assert_eq!(err.error_code(), "CURRENCY_MISMATCH");
}

#[test]
fn test_validate_post_blocks_out_of_tolerance() {
    let reconciler = SubledgerReconciler::new();
    let violations = reconciler
        .validate_post(
            &contract(ReconciliationTolerance::zero()),
            &usd(dec!(999.50)),
            &usd(dec!(1000)),
            date(),
            checked_at(),
        )
        .unwrap();

    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].violation_type, ViolationType::OutOfBalance);
    assert!(violations[0].blocking);
}

#[test]
fn test_validate_post_skipped_when_not_enforced() {
    let mut contract = contract(ReconciliationTolerance::zero());
    contract.enforce_on_post = false;

    let reconciler = SubledgerReconciler::new();
    let violations = reconciler
        .validate_post(&contract, &usd(dec!(0)), &usd(dec!(100)), date(), checked_at())
        .unwrap();
    assert!(violations.is_empty());
}

#[test]
fn test_validate_period_close_blocks_and_warns() {
    let reconciler = SubledgerReconciler::new();

    // Out of tolerance: blocking.
    let blocking = reconciler
        .validate_period_close(
            &contract(ReconciliationTolerance::absolute(dec!(0.10))),
            &usd(dec!(999)),
            &usd(dec!(1000)),
            date(),
            checked_at(),
        )
        .unwrap();
    assert_eq!(blocking.len(), 1);
    assert_eq!(blocking[0].violation_type, ViolationType::PeriodCloseBlocked);
    assert!(blocking[0].blocking);

    // Nonzero but within tolerance: non-blocking warning.
    let warning = reconciler
        .validate_period_close(
            &contract(ReconciliationTolerance::absolute(dec!(0.10))),
            &usd(dec!(999.95)),
            &usd(dec!(1000)),
            date(),
            checked_at(),
        )
        .unwrap();
    assert_eq!(warning.len(), 1);
    assert_eq!(warning[0].violation_type, ViolationType::ToleranceWarning);
    assert!(!warning[0].blocking);

    // Exact: nothing.
    let clean = reconciler
        .validate_period_close(
            &contract(ReconciliationTolerance::zero()),
            &usd(dec!(1000)),
            &usd(dec!(1000)),
            date(),
            checked_at(),
        )
        .unwrap();
    assert!(clean.is_empty());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Zero variance always reconciles regardless of tolerance kind.
    #[test]
    fn prop_zero_variance_reconciles(balance_cents in 0i64..1_000_000_000i64) {
        let balance = Decimal::new(balance_cents, 2);
        let reconciler = SubledgerReconciler::new();
        let check = reconciler
            .reconcile(
                &contract(ReconciliationTolerance::zero()),
                &usd(balance),
                &usd(balance),
                date(),
                checked_at(),
                0,
            )
            .unwrap();
        prop_assert!(check.is_reconciled);
        prop_assert!(check.is_within_tolerance);
    }

    /// Variance symmetry: tolerance treats +v and -v identically.
    #[test]
    fn prop_tolerance_is_symmetric(
        variance_cents in 0i64..10_000i64,
        limit_cents in 0i64..10_000i64,
    ) {
        let variance = Decimal::new(variance_cents, 2);
        let tolerance = ReconciliationTolerance::absolute(Decimal::new(limit_cents, 2));
        prop_assert_eq!(
            tolerance.is_within_tolerance(variance, dec!(1000)),
            tolerance.is_within_tolerance(-variance, dec!(1000))
        );
    }
}
