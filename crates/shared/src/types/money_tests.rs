//! Tests for the monetary value objects.

use proptest::prelude::*;
use rstest::rstest;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::money::{Currency, ExchangeRate, Money, MoneyError, Quantity};

fn usd(amount: Decimal) -> Money {
    Money::of(amount, "USD").unwrap()
}

#[test]
fn test_currency_normalizes_to_uppercase() {
    let c = Currency::new(" usd ").unwrap();
    assert_eq!(c.code(), "USD");
}

#[test]
fn test_currency_rejects_unknown_code() {
    let err = Currency::new("ZZZ").unwrap_err();
    assert_eq!(err.error_code(), "INVALID_CURRENCY");
    assert!(matches!(err, MoneyError::InvalidCurrency(_)));
}

#[test]
fn test_currency_rejects_empty_code() {
    assert!(Currency::new("").is_err());
}

#[rstest]
#[case("USD", 2)]
#[case("JPY", 0)]
#[case("KWD", 3)]
#[case("CLF", 4)]
fn test_decimal_places_derived_from_registry(#[case] code: &str, #[case] places: u32) {
    assert_eq!(Currency::new(code).unwrap().decimal_places(), places);
}

#[test]
fn test_money_addition_same_currency() {
    let sum = usd(dec!(100.25)).try_add(&usd(dec!(0.75))).unwrap();
    assert_eq!(sum.amount, dec!(101.00));
    assert_eq!(sum.currency.code(), "USD");
}

#[test]
fn test_money_addition_mixed_currency_fails() {
    let eur = Money::of(dec!(10), "EUR").unwrap();
    let err = usd(dec!(10)).try_add(&eur).unwrap_err();
    assert_eq!(err.error_code(), "CURRENCY_MISMATCH");
}

#[test]
fn test_money_subtraction_mixed_currency_fails() {
    let eur = Money::of(dec!(10), "EUR").unwrap();
    assert!(usd(dec!(10)).try_sub(&eur).is_err());
}

#[test]
fn test_money_round_half_up() {
    // 2.005 at 2dp rounds away from zero to 2.01
    assert_eq!(usd(dec!(2.005)).round().amount, dec!(2.01));
    assert_eq!(usd(dec!(-2.005)).round().amount, dec!(-2.01));
    assert_eq!(usd(dec!(2.004)).round().amount, dec!(2.00));
}

#[test]
fn test_money_round_zero_decimal_currency() {
    let jpy = Money::of(dec!(100.5), "JPY").unwrap();
    assert_eq!(jpy.round().amount, dec!(101));
}

#[test]
fn test_money_ordering_same_currency() {
    assert!(usd(dec!(1)) < usd(dec!(2)));
    assert!(usd(dec!(2)) >= usd(dec!(2)));
}

#[test]
fn test_money_ordering_mixed_currency_is_none() {
    let eur = Money::of(dec!(1), "EUR").unwrap();
    assert_eq!(usd(dec!(1)).partial_cmp(&eur), None);
}

#[test]
fn test_money_neg_abs_scale() {
    let m = usd(dec!(12.50));
    assert_eq!(m.neg().amount, dec!(-12.50));
    assert_eq!(m.neg().abs().amount, dec!(12.50));
    assert_eq!(m.scale(dec!(2)).amount, dec!(25.00));
}

#[test]
fn test_money_division_by_zero_fails() {
    assert_eq!(
        usd(dec!(1)).try_div(Decimal::ZERO).unwrap_err(),
        MoneyError::DivisionByZero
    );
}

#[test]
fn test_quantity_requires_unit() {
    assert!(matches!(
        Quantity::of(dec!(1), "  "),
        Err(MoneyError::MissingUnit)
    ));
}

#[test]
fn test_quantity_mixed_units_fail() {
    let kg = Quantity::of(dec!(5), "kg").unwrap();
    let ea = Quantity::of(dec!(5), "ea").unwrap();
    assert!(matches!(
        kg.try_add(&ea),
        Err(MoneyError::UnitMismatch { .. })
    ));
}

#[test]
fn test_exchange_rate_rejects_non_positive() {
    assert!(ExchangeRate::of("USD", "EUR", Decimal::ZERO).is_err());
    assert!(ExchangeRate::of("USD", "EUR", dec!(-1)).is_err());
}

#[test]
fn test_exchange_rate_convert() {
    let rate = ExchangeRate::of("EUR", "USD", dec!(1.5)).unwrap();
    let converted = rate.convert(&Money::of(dec!(100), "EUR").unwrap()).unwrap();
    assert_eq!(converted.amount, dec!(150.0));
    assert_eq!(converted.currency.code(), "USD");
}

#[test]
fn test_exchange_rate_convert_wrong_currency_fails() {
    let rate = ExchangeRate::of("EUR", "USD", dec!(1.5)).unwrap();
    let err = rate.convert(&usd(dec!(100))).unwrap_err();
    assert_eq!(err.error_code(), "CURRENCY_MISMATCH");
}

#[test]
fn test_exchange_rate_inverse() {
    let rate = ExchangeRate::of("USD", "EUR", dec!(0.8)).unwrap();
    let inverse = rate.inverse();
    assert_eq!(inverse.pair(), ("EUR", "USD"));
    assert_eq!(inverse.rate, dec!(1.25));
}

fn amount_strategy() -> impl Strategy<Value = Decimal> {
    (-1_000_000_000i64..1_000_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Addition then subtraction of the same amount is the identity.
    #[test]
    fn prop_add_sub_roundtrip(a in amount_strategy(), b in amount_strategy()) {
        let result = usd(a).try_add(&usd(b)).unwrap().try_sub(&usd(b)).unwrap();
        prop_assert_eq!(result.amount, a);
    }

    /// Rounding is idempotent.
    #[test]
    fn prop_round_idempotent(a in amount_strategy()) {
        let once = usd(a).round();
        let twice = once.round();
        prop_assert_eq!(once, twice);
    }

    /// A rate and its inverse round-trip within the currency tolerance.
    #[test]
    fn prop_rate_inverse_roundtrip(cents in 1i64..1_000_000i64, rate_bp in 1i64..50_000i64) {
        let rate = ExchangeRate::of("USD", "EUR", Decimal::new(rate_bp, 4)).unwrap();
        let start = usd(Decimal::new(cents, 2));
        let there = rate.convert(&start).unwrap();
        let back = rate.inverse().convert(&there).unwrap().round();
        let tolerance = start.currency.rounding_tolerance();
        prop_assert!((back.amount - start.amount).abs() <= tolerance);
    }
}
