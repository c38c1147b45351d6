//! Reference data snapshot passed to the pure strategy layer.
//!
//! Strategies have no database access; everything they may look up --
//! accounts, currencies, rounding accounts, exchange rates, dimensions --
//! is snapshotted here with the version identifiers required for
//! deterministic replay.

use std::collections::{BTreeMap, HashMap, HashSet};

use quill_shared::types::{AccountId, Currency, ExchangeRate};

use super::validation::ValidationError;

/// The rounding account for one currency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundingAccount {
    /// Resolved account ID.
    pub account_id: AccountId,
    /// Chart of accounts code.
    pub account_code: String,
}

/// Immutable reference data snapshot for one posting.
#[derive(Debug, Clone, Default)]
pub struct ReferenceData {
    /// Account IDs keyed by chart of accounts code.
    pub account_ids_by_code: HashMap<String, AccountId>,
    /// Codes of accounts that accept posting.
    pub active_account_codes: HashSet<String>,
    /// Currencies valid for posting.
    pub valid_currencies: HashSet<Currency>,
    /// Rounding account per currency code.
    pub rounding_accounts: HashMap<String, RoundingAccount>,
    /// Stored exchange rates.
    pub exchange_rates: Vec<ExchangeRate>,
    /// Dimensions that must be present on every line.
    pub required_dimensions: HashSet<String>,
    /// Active dimension codes.
    pub active_dimensions: HashSet<String>,
    /// Active value codes per dimension.
    pub active_dimension_values: HashMap<String, HashSet<String>>,
    /// Chart of accounts version.
    pub coa_version: u32,
    /// Dimension schema version.
    pub dimension_schema_version: u32,
    /// Rounding policy version.
    pub rounding_policy_version: u32,
    /// Currency registry version.
    pub currency_registry_version: u32,
}

impl ReferenceData {
    /// Account ID for a chart of accounts code.
    #[must_use]
    pub fn get_account_id(&self, code: &str) -> Option<AccountId> {
        self.account_ids_by_code.get(code).copied()
    }

    /// Whether an account accepts posting.
    #[must_use]
    pub fn is_account_active(&self, code: &str) -> bool {
        self.active_account_codes.contains(code)
    }

    /// Whether a currency is valid for posting.
    #[must_use]
    pub fn is_valid_currency(&self, currency: &Currency) -> bool {
        self.valid_currencies.contains(currency)
    }

    /// Rounding account for a currency code, if configured.
    #[must_use]
    pub fn get_rounding_account(&self, currency: &str) -> Option<&RoundingAccount> {
        self.rounding_accounts.get(currency)
    }

    /// Exchange rate between two currencies, if snapshotted.
    #[must_use]
    pub fn get_exchange_rate(&self, from: &str, to: &str) -> Option<&ExchangeRate> {
        self.exchange_rates
            .iter()
            .find(|rate| rate.from.code() == from && rate.to.code() == to)
    }

    /// Exchange rate between two currencies, as a validation error when
    /// absent.
    ///
    /// # Errors
    ///
    /// Returns `EXCHANGE_RATE_NOT_FOUND` if no rate is snapshotted for the
    /// pair.
    pub fn require_exchange_rate(
        &self,
        from: &str,
        to: &str,
    ) -> Result<&ExchangeRate, ValidationError> {
        self.get_exchange_rate(from, to).ok_or_else(|| {
            ValidationError::new(
                "EXCHANGE_RATE_NOT_FOUND",
                format!("No exchange rate snapshotted for {from} to {to}"),
            )
        })
    }

    /// Validates dimension values against the snapshotted schema.
    ///
    /// Returns one error per violation: `MISSING_DIMENSION` for a required
    /// dimension that is absent, `INVALID_DIMENSION_VALUE` for an inactive
    /// dimension or value.
    #[must_use]
    pub fn validate_dimensions(
        &self,
        dimensions: Option<&BTreeMap<String, String>>,
    ) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        let empty = BTreeMap::new();
        let dims = dimensions.unwrap_or(&empty);

        for required in &self.required_dimensions {
            if !dims.contains_key(required) {
                errors.push(
                    ValidationError::new(
                        "MISSING_DIMENSION",
                        format!("Required dimension '{required}' is missing"),
                    )
                    .with_field(required.clone()),
                );
            }
        }

        for (dim_code, value_code) in dims {
            if !self.active_dimensions.contains(dim_code) {
                errors.push(
                    ValidationError::new(
                        "INVALID_DIMENSION_VALUE",
                        format!("Dimension '{dim_code}' is inactive or unknown"),
                    )
                    .with_field(dim_code.clone()),
                );
                continue;
            }
            let active = self
                .active_dimension_values
                .get(dim_code)
                .is_some_and(|values| values.contains(value_code));
            if !active {
                errors.push(
                    ValidationError::new(
                        "INVALID_DIMENSION_VALUE",
                        format!("Dimension value '{value_code}' for '{dim_code}' is inactive"),
                    )
                    .with_field(dim_code.clone()),
                );
            }
        }

        errors
    }
}
