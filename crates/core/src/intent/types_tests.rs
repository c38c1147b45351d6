//! Tests for the accounting intent IR.

use chrono::NaiveDate;
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use quill_shared::types::{EconEventId, EventId, Money};

use super::error::IntentError;
use super::types::{AccountingIntent, IntentLine, IntentSnapshot, LedgerIntent};

fn usd(amount: Decimal) -> Money {
    Money::of(amount, "USD").unwrap()
}

fn eur(amount: Decimal) -> Money {
    Money::of(amount, "EUR").unwrap()
}

fn snapshot() -> IntentSnapshot {
    IntentSnapshot::new(1, 1, 1, 1)
}

fn gl_intent(debit: Decimal, credit: Decimal) -> LedgerIntent {
    LedgerIntent::new(
        "GL",
        vec![
            IntentLine::debit("EXPENSE", usd(debit)).unwrap(),
            IntentLine::credit("AP_CONTROL", usd(credit)).unwrap(),
        ],
    )
    .unwrap()
}

fn intent(ledger_intents: Vec<LedgerIntent>) -> AccountingIntent {
    AccountingIntent::new(
        EconEventId::new(),
        EventId::new(),
        "ap.invoice.v1",
        3,
        NaiveDate::from_ymd_opt(2026, 6, 15).unwrap(),
        ledger_intents,
        snapshot(),
    )
    .unwrap()
}

#[test]
fn test_intent_line_rejects_negative_amount() {
    assert_eq!(
        IntentLine::debit("EXPENSE", usd(dec!(-5))).unwrap_err(),
        IntentError::NegativeAmount(dec!(-5))
    );
}

#[test]
fn test_ledger_intent_requires_lines() {
    assert!(matches!(
        LedgerIntent::new("GL", vec![]).unwrap_err(),
        IntentError::EmptyLedgerIntent(_)
    ));
}

#[test]
fn test_accounting_intent_requires_ledger_intents() {
    let err = AccountingIntent::new(
        EconEventId::new(),
        EventId::new(),
        "p",
        1,
        NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
        vec![],
        snapshot(),
    )
    .unwrap_err();
    assert_eq!(err, IntentError::EmptyIntent);
}

#[test]
fn test_balance_per_currency() {
    let ledger = LedgerIntent::new(
        "GL",
        vec![
            IntentLine::debit("A", usd(dec!(100))).unwrap(),
            IntentLine::credit("B", usd(dec!(100))).unwrap(),
            IntentLine::debit("A", eur(dec!(50))).unwrap(),
            IntentLine::credit("B", eur(dec!(40))).unwrap(),
        ],
    )
    .unwrap();

    assert!(ledger.is_balanced(Some("USD")));
    assert!(!ledger.is_balanced(Some("EUR")));
    assert!(!ledger.is_balanced(None));
    assert_eq!(ledger.total_debits(Some("EUR")), dec!(50));
    assert_eq!(ledger.total_credits(None), dec!(140));
}

#[test]
fn test_idempotency_key_format() {
    let intent = intent(vec![gl_intent(dec!(10), dec!(10))]);
    assert_eq!(
        intent.idempotency_key("GL"),
        format!("{}:GL:3", intent.econ_event_id)
    );
}

#[test]
fn test_all_roles_and_ledger_ids() {
    let ap_lines = vec![IntentLine::credit("AP_CONTROL", usd(dec!(10))).unwrap()];
    let intent = intent(vec![
        gl_intent(dec!(10), dec!(10)),
        LedgerIntent::new("AP", ap_lines).unwrap(),
    ]);

    assert_eq!(intent.ledger_ids().len(), 2);
    assert!(intent.all_roles().contains("EXPENSE"));
    assert!(intent.all_roles().contains("AP_CONTROL"));
    assert!(intent.get_ledger_intent("AP").is_some());
    assert!(intent.get_ledger_intent("AR").is_none());
}

#[test]
fn test_all_balanced() {
    assert!(intent(vec![gl_intent(dec!(10), dec!(10))]).all_balanced());
    assert!(!intent(vec![gl_intent(dec!(10), dec!(9))]).all_balanced());
}

#[test]
fn test_snapshot_from_reference() {
    let reference = crate::journal::ReferenceData {
        coa_version: 5,
        dimension_schema_version: 6,
        rounding_policy_version: 7,
        currency_registry_version: 8,
        ..Default::default()
    };
    let snap = IntentSnapshot::from_reference(&reference);
    assert_eq!(snap.coa_version, 5);
    assert_eq!(snap.dimension_schema_version, 6);
    assert_eq!(snap.rounding_policy_version, 7);
    assert_eq!(snap.currency_registry_version, 8);
    assert!(snap.full_snapshot_id.is_none());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Equal debit and credit totals balance for any positive amount.
    #[test]
    fn prop_mirrored_lines_balance(cents in 1i64..1_000_000i64) {
        let amount = Decimal::new(cents, 2);
        let ledger = gl_intent(amount, amount);
        prop_assert!(ledger.is_balanced(None));
        prop_assert_eq!(ledger.total_debits(None), ledger.total_credits(None));
    }

    /// Unequal totals never balance.
    #[test]
    fn prop_unequal_lines_unbalanced(
        debit in 1i64..1_000_000i64,
        delta in 1i64..1_000i64,
    ) {
        let ledger = gl_intent(Decimal::new(debit, 2), Decimal::new(debit + delta, 2));
        prop_assert!(!ledger.is_balanced(None));
    }
}
