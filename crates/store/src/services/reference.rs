//! Reference data loading.
//!
//! Snapshots the chart of accounts, currencies, rounding accounts,
//! exchange rates, and dimension schema out of the store into the
//! immutable `ReferenceData` handed to the pure strategy layer, stamped
//! with the version identifiers required for deterministic replay.

use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use thiserror::Error;
use tracing::debug;

use quill_core::journal::reference::RoundingAccount;
use quill_core::journal::ReferenceData;
use quill_shared::types::{Currency, CurrencyRegistry};

use crate::memory::Txn;

/// Reference data loading errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReferenceError {
    /// A configured rounding account code is missing from the chart of
    /// accounts.
    #[error("Rounding account '{code}' for {currency} not found in chart of accounts")]
    RoundingAccountNotFound {
        /// The missing account code.
        code: String,
        /// Currency the rounding account was configured for.
        currency: String,
    },

    /// A configured currency code is invalid.
    #[error("Invalid currency configured: {0}")]
    InvalidCurrency(String),
}

impl ReferenceError {
    /// Returns the machine-readable error code.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::RoundingAccountNotFound { .. } => "ROUNDING_ACCOUNT_NOT_FOUND",
            Self::InvalidCurrency(_) => "INVALID_CURRENCY",
        }
    }
}

/// Configuration for one reference data load.
#[derive(Debug, Clone, Default)]
pub struct ReferenceConfig {
    /// Currencies valid for posting.
    pub valid_currencies: Vec<String>,
    /// Rounding account code per currency.
    pub rounding_account_codes: HashMap<String, String>,
    /// Dimensions required on every line.
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
}

/// Loads reference data snapshots out of the store.
pub struct ReferenceDataLoader<'t, 'a> {
    txn: &'t Txn<'a>,
}

impl<'t, 'a> ReferenceDataLoader<'t, 'a> {
    /// Creates a loader over a scope.
    #[must_use]
    pub const fn new(txn: &'t Txn<'a>) -> Self {
        Self { txn }
    }

    /// Loads a reference data snapshot as of a date.
    ///
    /// # Errors
    ///
    /// Returns `ReferenceError::InvalidCurrency` for a bad configured
    /// currency or `ReferenceError::RoundingAccountNotFound` when a
    /// configured rounding account code has no chart entry.
    pub fn load(
        &self,
        config: &ReferenceConfig,
        as_of_date: NaiveDate,
    ) -> Result<ReferenceData, ReferenceError> {
        let mut account_ids_by_code = HashMap::new();
        let mut active_account_codes = HashSet::new();
        for account in self.txn.accounts() {
            account_ids_by_code.insert(account.code.clone(), account.id);
            if account.is_active {
                active_account_codes.insert(account.code);
            }
        }

        let mut valid_currencies = HashSet::new();
        for code in &config.valid_currencies {
            let currency = Currency::new(code)
                .map_err(|_| ReferenceError::InvalidCurrency(code.clone()))?;
            valid_currencies.insert(currency);
        }

        let mut rounding_accounts = HashMap::new();
        for (currency, code) in &config.rounding_account_codes {
            let account_id = account_ids_by_code.get(code).copied().ok_or_else(|| {
                ReferenceError::RoundingAccountNotFound {
                    code: code.clone(),
                    currency: currency.clone(),
                }
            })?;
            rounding_accounts.insert(
                currency.clone(),
                RoundingAccount {
                    account_id,
                    account_code: code.clone(),
                },
            );
        }

        let exchange_rates = self
            .txn
            .exchange_rates_as_of(as_of_date)
            .into_iter()
            .map(|row| row.rate)
            .collect();

        debug!(
            account_count = account_ids_by_code.len(),
            currency_count = valid_currencies.len(),
            as_of_date = %as_of_date,
            "reference_data_loaded"
        );

        Ok(ReferenceData {
            account_ids_by_code,
            active_account_codes,
            valid_currencies,
            rounding_accounts,
            exchange_rates,
            required_dimensions: config.required_dimensions.clone(),
            active_dimensions: config.active_dimensions.clone(),
            active_dimension_values: config.active_dimension_values.clone(),
            coa_version: config.coa_version,
            dimension_schema_version: config.dimension_schema_version,
            rounding_policy_version: config.rounding_policy_version,
            currency_registry_version: CurrencyRegistry::VERSION,
        })
    }
}

#[cfg(test)]
mod tests {
    use quill_core::journal::LineSide;
    use quill_shared::types::AccountId;

    use super::*;
    use crate::entities::AccountRow;
    use crate::memory::Store;

    fn account(code: &str, active: bool) -> AccountRow {
        AccountRow {
            id: AccountId::new(),
            code: code.to_string(),
            name: format!("Account {code}"),
            account_type: "asset".to_string(),
            normal_balance: LineSide::Debit,
            is_active: active,
        }
    }

    fn config() -> ReferenceConfig {
        ReferenceConfig {
            valid_currencies: vec!["USD".to_string()],
            coa_version: 1,
            dimension_schema_version: 1,
            rounding_policy_version: 1,
            ..ReferenceConfig::default()
        }
    }

    #[test]
    fn test_load_snapshots_accounts_and_versions() {
        let store = Store::new();
        let txn = store.begin();
        txn.insert_account(account("1000", true)).unwrap();
        txn.insert_account(account("2000", false)).unwrap();

        let reference = ReferenceDataLoader::new(&txn)
            .load(&config(), NaiveDate::from_ymd_opt(2026, 6, 15).unwrap())
            .unwrap();

        assert!(reference.get_account_id("1000").is_some());
        assert!(reference.is_account_active("1000"));
        assert!(!reference.is_account_active("2000"));
        assert_eq!(reference.currency_registry_version, CurrencyRegistry::VERSION);
    }

    #[test]
    fn test_missing_rounding_account_rejected() {
        let store = Store::new();
        let txn = store.begin();
        txn.insert_account(account("1000", true)).unwrap();

        let mut config = config();
        config
            .rounding_account_codes
            .insert("USD".to_string(), "9999".to_string());

        let err = ReferenceDataLoader::new(&txn)
            .load(&config, NaiveDate::from_ymd_opt(2026, 6, 15).unwrap())
            .unwrap_err();
        assert_eq!(err.error_code(), "ROUNDING_ACCOUNT_NOT_FOUND");
    }

    #[test]
    fn test_invalid_configured_currency_rejected() {
        let store = Store::new();
        let txn = store.begin();
        let mut config = config();
        config.valid_currencies.push("ZZZ".to_string());

        let err = ReferenceDataLoader::new(&txn)
            .load(&config, NaiveDate::from_ymd_opt(2026, 6, 15).unwrap())
            .unwrap_err();
        assert_eq!(err.error_code(), "INVALID_CURRENCY");
    }
}
