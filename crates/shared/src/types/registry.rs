//! Process-global ISO 4217 currency registry.
//!
//! The registry is the single source of truth for currency decimal places.
//! Quantization and rounding tolerance are always derived from it and never
//! hardcoded at call sites.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use rust_decimal::Decimal;

/// Catalogued information for one ISO 4217 currency.
#[derive(Debug, Clone, Copy)]
pub struct CurrencyInfo {
    /// Number of decimal places for the currency's minor unit.
    pub decimal_places: u32,
    /// Human-readable currency name.
    pub name: &'static str,
}

static CURRENCIES: Lazy<HashMap<&'static str, CurrencyInfo>> = Lazy::new(|| {
    let table: &[(&str, u32, &str)] = &[
        ("AED", 2, "UAE Dirham"),
        ("AUD", 2, "Australian Dollar"),
        ("BHD", 3, "Bahraini Dinar"),
        ("BRL", 2, "Brazilian Real"),
        ("CAD", 2, "Canadian Dollar"),
        ("CHF", 2, "Swiss Franc"),
        ("CLF", 4, "Unidad de Fomento"),
        ("CLP", 0, "Chilean Peso"),
        ("CNY", 2, "Yuan Renminbi"),
        ("CZK", 2, "Czech Koruna"),
        ("DKK", 2, "Danish Krone"),
        ("EUR", 2, "Euro"),
        ("GBP", 2, "Pound Sterling"),
        ("HKD", 2, "Hong Kong Dollar"),
        ("IDR", 2, "Rupiah"),
        ("ILS", 2, "New Israeli Sheqel"),
        ("INR", 2, "Indian Rupee"),
        ("ISK", 0, "Iceland Krona"),
        ("JOD", 3, "Jordanian Dinar"),
        ("JPY", 0, "Yen"),
        ("KRW", 0, "Won"),
        ("KWD", 3, "Kuwaiti Dinar"),
        ("MXN", 2, "Mexican Peso"),
        ("MYR", 2, "Malaysian Ringgit"),
        ("NOK", 2, "Norwegian Krone"),
        ("NZD", 2, "New Zealand Dollar"),
        ("OMR", 3, "Rial Omani"),
        ("PHP", 2, "Philippine Peso"),
        ("PLN", 2, "Zloty"),
        ("SAR", 2, "Saudi Riyal"),
        ("SEK", 2, "Swedish Krona"),
        ("SGD", 2, "Singapore Dollar"),
        ("THB", 2, "Baht"),
        ("TND", 3, "Tunisian Dinar"),
        ("TRY", 2, "Turkish Lira"),
        ("TWD", 2, "New Taiwan Dollar"),
        ("USD", 2, "US Dollar"),
        ("VND", 0, "Dong"),
        ("ZAR", 2, "Rand"),
    ];
    table
        .iter()
        .map(|&(code, decimal_places, name)| {
            (
                code,
                CurrencyInfo {
                    decimal_places,
                    name,
                },
            )
        })
        .collect()
});

/// Immutable, process-global ISO 4217 lookup table.
///
/// Built once at first use and read-only afterwards. Construction-time
/// validation (`Currency::new`) rejects codes missing from the table;
/// lookup sites fall back to 2 decimal places for a valid but uncatalogued
/// code.
pub struct CurrencyRegistry;

impl CurrencyRegistry {
    /// The version identifier recorded in reference snapshots.
    pub const VERSION: u32 = 1;

    /// Returns true if `code` is a catalogued ISO 4217 code.
    #[must_use]
    pub fn is_valid(code: &str) -> bool {
        CURRENCIES.contains_key(code)
    }

    /// Returns catalogued info for a currency code.
    #[must_use]
    pub fn get_info(code: &str) -> Option<CurrencyInfo> {
        CURRENCIES.get(code).copied()
    }

    /// Decimal places for a currency, defaulting to 2 for uncatalogued codes.
    #[must_use]
    pub fn decimal_places(code: &str) -> u32 {
        CURRENCIES.get(code).map_or(2, |info| info.decimal_places)
    }

    /// Rounding tolerance for a currency: one minor unit.
    ///
    /// Derived from the registry's decimal places, e.g. `0.01` for USD and
    /// `1` for JPY.
    #[must_use]
    pub fn rounding_tolerance(code: &str) -> Decimal {
        Decimal::new(1, Self::decimal_places(code))
    }

    /// All catalogued currency codes, sorted.
    #[must_use]
    pub fn codes() -> Vec<&'static str> {
        let mut codes: Vec<_> = CURRENCIES.keys().copied().collect();
        codes.sort_unstable();
        codes
    }
}
