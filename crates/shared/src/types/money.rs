//! Monetary value objects with decimal precision and currency.
//!
//! CRITICAL: Never use floating-point for money calculations. These types
//! wrap `rust_decimal::Decimal` and pair every amount with its currency so
//! the two are never separated. Rounding precision and tolerance derive
//! from the ISO 4217 registry, never from hardcoded constants.

use std::cmp::Ordering;
use std::fmt;

use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::registry::CurrencyRegistry;

/// Errors from value-object construction and arithmetic.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MoneyError {
    /// Currency code is not a valid ISO 4217 code.
    #[error("Invalid ISO 4217 currency code: {0}")]
    InvalidCurrency(String),

    /// Arithmetic or comparison mixed two different currencies.
    #[error("Cannot combine {left} with {right}: currencies differ")]
    CurrencyMismatch {
        /// Currency on the left-hand side.
        left: String,
        /// Currency on the right-hand side.
        right: String,
    },

    /// Exchange rate is zero or negative.
    #[error("Exchange rate must be positive: {0}")]
    InvalidExchangeRate(Decimal),

    /// Money passed to `ExchangeRate::convert` is not in the rate's
    /// source currency.
    #[error("Money currency {money} doesn't match rate from-currency {from}")]
    RateCurrencyMismatch {
        /// Currency of the money being converted.
        money: String,
        /// Source currency of the rate.
        from: String,
    },

    /// Quantity arithmetic mixed two different units.
    #[error("Cannot combine quantity in {left} with quantity in {right}")]
    UnitMismatch {
        /// Unit on the left-hand side.
        left: String,
        /// Unit on the right-hand side.
        right: String,
    },

    /// Quantity unit is empty.
    #[error("Quantity unit is required")]
    MissingUnit,

    /// Division by zero.
    #[error("Cannot divide by zero")]
    DivisionByZero,
}

impl MoneyError {
    /// Returns the machine-readable error code.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidCurrency(_) => "INVALID_CURRENCY",
            Self::CurrencyMismatch { .. } | Self::RateCurrencyMismatch { .. } => {
                "CURRENCY_MISMATCH"
            }
            Self::InvalidExchangeRate(_) => "INVALID_EXCHANGE_RATE",
            Self::UnitMismatch { .. } => "UNIT_MISMATCH",
            Self::MissingUnit => "MISSING_UNIT",
            Self::DivisionByZero => "DIVISION_BY_ZERO",
        }
    }
}

/// ISO 4217 currency code value object.
///
/// Wraps a three-letter code, validated against the [`CurrencyRegistry`]
/// and normalized to uppercase at construction. Invalid codes are rejected
/// immediately, so every `Currency` in the system is known-good.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Currency {
    code: String,
}

impl Currency {
    /// Creates a currency from an ISO 4217 code.
    ///
    /// The code is trimmed and uppercased before validation.
    ///
    /// # Errors
    ///
    /// Returns `MoneyError::InvalidCurrency` if the normalized code is not
    /// in the registry.
    pub fn new(code: &str) -> Result<Self, MoneyError> {
        let normalized = code.trim().to_uppercase();
        if !CurrencyRegistry::is_valid(&normalized) {
            return Err(MoneyError::InvalidCurrency(code.to_string()));
        }
        Ok(Self { code: normalized })
    }

    /// The normalized ISO 4217 code.
    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Decimal places for this currency, from the registry.
    #[must_use]
    pub fn decimal_places(&self) -> u32 {
        CurrencyRegistry::decimal_places(&self.code)
    }

    /// Rounding tolerance (one minor unit), from the registry.
    #[must_use]
    pub fn rounding_tolerance(&self) -> Decimal {
        CurrencyRegistry::rounding_tolerance(&self.code)
    }

    /// Human-readable currency name; empty for an uncatalogued code.
    #[must_use]
    pub fn name(&self) -> &'static str {
        CurrencyRegistry::get_info(&self.code).map_or("", |info| info.name)
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code)
    }
}

impl std::str::FromStr for Currency {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Currency {
    type Error = MoneyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<Currency> for String {
    fn from(value: Currency) -> Self {
        value.code
    }
}

/// Monetary amount value object.
///
/// Pairs a `Decimal` amount with its `Currency` -- they are never
/// separated. Arithmetic enforces the same-currency constraint; there is
/// no silent currency mixing. Amounts are not auto-rounded; callers round
/// explicitly with [`Money::round`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Money {
    /// The decimal amount.
    pub amount: Decimal,
    /// The ISO 4217 currency.
    pub currency: Currency,
}

impl Money {
    /// Creates a `Money` from an amount and a currency code.
    ///
    /// # Errors
    ///
    /// Returns `MoneyError::InvalidCurrency` if the code is not valid.
    pub fn of(amount: Decimal, currency: &str) -> Result<Self, MoneyError> {
        Ok(Self {
            amount,
            currency: Currency::new(currency)?,
        })
    }

    /// Creates a `Money` from an amount and an already-validated currency.
    #[must_use]
    pub const fn new(amount: Decimal, currency: Currency) -> Self {
        Self { amount, currency }
    }

    /// Creates a zero amount in the given currency.
    #[must_use]
    pub fn zero(currency: Currency) -> Self {
        Self {
            amount: Decimal::ZERO,
            currency,
        }
    }

    /// Returns true if the amount is zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    /// Returns true if the amount is strictly positive.
    #[must_use]
    pub fn is_positive(&self) -> bool {
        self.amount > Decimal::ZERO
    }

    /// Returns true if the amount is strictly negative.
    #[must_use]
    pub fn is_negative(&self) -> bool {
        self.amount < Decimal::ZERO
    }

    /// Rounds to the currency's decimal places with half-up rounding.
    ///
    /// Precision is derived from the registry. Returns a new `Money`; the
    /// original is unchanged.
    #[must_use]
    pub fn round(&self) -> Self {
        let rounded = self.amount.round_dp_with_strategy(
            self.currency.decimal_places(),
            RoundingStrategy::MidpointAwayFromZero,
        );
        Self {
            amount: rounded,
            currency: self.currency.clone(),
        }
    }

    /// Adds two amounts in the same currency.
    ///
    /// # Errors
    ///
    /// Returns `MoneyError::CurrencyMismatch` if the currencies differ.
    pub fn try_add(&self, other: &Self) -> Result<Self, MoneyError> {
        self.require_same_currency(other)?;
        Ok(Self {
            amount: self.amount + other.amount,
            currency: self.currency.clone(),
        })
    }

    /// Subtracts two amounts in the same currency.
    ///
    /// # Errors
    ///
    /// Returns `MoneyError::CurrencyMismatch` if the currencies differ.
    pub fn try_sub(&self, other: &Self) -> Result<Self, MoneyError> {
        self.require_same_currency(other)?;
        Ok(Self {
            amount: self.amount - other.amount,
            currency: self.currency.clone(),
        })
    }

    /// Negates the amount.
    #[must_use]
    pub fn neg(&self) -> Self {
        Self {
            amount: -self.amount,
            currency: self.currency.clone(),
        }
    }

    /// Absolute value.
    #[must_use]
    pub fn abs(&self) -> Self {
        Self {
            amount: self.amount.abs(),
            currency: self.currency.clone(),
        }
    }

    /// Multiplies by a scalar.
    #[must_use]
    pub fn scale(&self, factor: Decimal) -> Self {
        Self {
            amount: self.amount * factor,
            currency: self.currency.clone(),
        }
    }

    /// Divides by a scalar.
    ///
    /// # Errors
    ///
    /// Returns `MoneyError::DivisionByZero` if `divisor` is zero.
    pub fn try_div(&self, divisor: Decimal) -> Result<Self, MoneyError> {
        if divisor.is_zero() {
            return Err(MoneyError::DivisionByZero);
        }
        Ok(Self {
            amount: self.amount / divisor,
            currency: self.currency.clone(),
        })
    }

    fn require_same_currency(&self, other: &Self) -> Result<(), MoneyError> {
        if self.currency != other.currency {
            return Err(MoneyError::CurrencyMismatch {
                left: self.currency.code().to_string(),
                right: other.currency.code().to_string(),
            });
        }
        Ok(())
    }
}

impl PartialOrd for Money {
    /// Orders amounts within the same currency; `None` across currencies.
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self.currency != other.currency {
            return None;
        }
        self.amount.partial_cmp(&other.amount)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.currency)
    }
}

/// Numeric quantity with a unit of measure.
///
/// Used for non-monetary quantities like inventory counts, weights, and
/// volumes. Arithmetic enforces the same-unit constraint; there is no unit
/// conversion.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Quantity {
    /// The decimal value.
    pub value: Decimal,
    /// The unit of measure (non-empty).
    pub unit: String,
}

impl Quantity {
    /// Creates a quantity from a value and unit.
    ///
    /// # Errors
    ///
    /// Returns `MoneyError::MissingUnit` if the unit is empty after
    /// trimming.
    pub fn of(value: Decimal, unit: &str) -> Result<Self, MoneyError> {
        let unit = unit.trim();
        if unit.is_empty() {
            return Err(MoneyError::MissingUnit);
        }
        Ok(Self {
            value,
            unit: unit.to_string(),
        })
    }

    /// Creates a zero quantity with the given unit.
    ///
    /// # Errors
    ///
    /// Returns `MoneyError::MissingUnit` if the unit is empty.
    pub fn zero(unit: &str) -> Result<Self, MoneyError> {
        Self::of(Decimal::ZERO, unit)
    }

    /// Returns true if the value is zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.value.is_zero()
    }

    /// Adds two quantities in the same unit.
    ///
    /// # Errors
    ///
    /// Returns `MoneyError::UnitMismatch` if the units differ.
    pub fn try_add(&self, other: &Self) -> Result<Self, MoneyError> {
        self.require_same_unit(other)?;
        Ok(Self {
            value: self.value + other.value,
            unit: self.unit.clone(),
        })
    }

    /// Subtracts two quantities in the same unit.
    ///
    /// # Errors
    ///
    /// Returns `MoneyError::UnitMismatch` if the units differ.
    pub fn try_sub(&self, other: &Self) -> Result<Self, MoneyError> {
        self.require_same_unit(other)?;
        Ok(Self {
            value: self.value - other.value,
            unit: self.unit.clone(),
        })
    }

    /// Multiplies by a scalar.
    #[must_use]
    pub fn scale(&self, factor: Decimal) -> Self {
        Self {
            value: self.value * factor,
            unit: self.unit.clone(),
        }
    }

    fn require_same_unit(&self, other: &Self) -> Result<(), MoneyError> {
        if self.unit != other.unit {
            return Err(MoneyError::UnitMismatch {
                left: self.unit.clone(),
                right: other.unit.clone(),
            });
        }
        Ok(())
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.value, self.unit)
    }
}

/// Exchange rate between two currencies.
///
/// Represents: 1 unit of `from` = `rate` units of `to`. The rate is always
/// a positive decimal; both currencies are validated ISO 4217 codes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeRate {
    /// Source currency.
    pub from: Currency,
    /// Target currency.
    pub to: Currency,
    /// Units of `to` per unit of `from`; strictly positive.
    pub rate: Decimal,
}

impl ExchangeRate {
    /// Creates an exchange rate.
    ///
    /// # Errors
    ///
    /// Returns `MoneyError::InvalidExchangeRate` if `rate` is zero or
    /// negative.
    pub fn new(from: Currency, to: Currency, rate: Decimal) -> Result<Self, MoneyError> {
        if rate <= Decimal::ZERO {
            return Err(MoneyError::InvalidExchangeRate(rate));
        }
        Ok(Self { from, to, rate })
    }

    /// Creates an exchange rate from currency codes.
    ///
    /// # Errors
    ///
    /// Returns `MoneyError::InvalidCurrency` for an invalid code or
    /// `MoneyError::InvalidExchangeRate` for a non-positive rate.
    pub fn of(from: &str, to: &str, rate: Decimal) -> Result<Self, MoneyError> {
        Self::new(Currency::new(from)?, Currency::new(to)?, rate)
    }

    /// Converts money in the source currency to the target currency.
    ///
    /// # Errors
    ///
    /// Returns `MoneyError::RateCurrencyMismatch` if `money` is not in the
    /// rate's source currency.
    pub fn convert(&self, money: &Money) -> Result<Money, MoneyError> {
        if money.currency != self.from {
            return Err(MoneyError::RateCurrencyMismatch {
                money: money.currency.code().to_string(),
                from: self.from.code().to_string(),
            });
        }
        Ok(Money {
            amount: money.amount * self.rate,
            currency: self.to.clone(),
        })
    }

    /// Returns the inverse rate.
    ///
    /// If this rate is USD->EUR at 0.85, the inverse is EUR->USD at 1/0.85.
    #[must_use]
    pub fn inverse(&self) -> Self {
        Self {
            from: self.to.clone(),
            to: self.from.clone(),
            rate: Decimal::ONE / self.rate,
        }
    }

    /// The currency pair as `(from, to)` codes.
    #[must_use]
    pub fn pair(&self) -> (&str, &str) {
        (self.from.code(), self.to.code())
    }
}

impl fmt::Display for ExchangeRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} = {}", self.from, self.to, self.rate)
    }
}
