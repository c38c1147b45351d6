//! Event-type to posting-strategy dispatch registry.
//!
//! Dispatch is a pure mapping keyed by event type and version. The
//! registry is built at startup and read-only afterwards; tests construct
//! throwaway registries of their own.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use super::error::RegistryError;
use super::types::{PostingStrategy, ReplayPolicy};

/// Registry of posting strategies keyed by `(event_type, version)`.
#[derive(Default)]
pub struct StrategyRegistry {
    strategies: HashMap<String, BTreeMap<u32, Arc<dyn PostingStrategy>>>,
}

impl StrategyRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a strategy, validating its lifecycle metadata.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::Lifecycle` for invalid metadata or
    /// `RegistryError::AlreadyRegistered` for a duplicate
    /// `(event_type, version)`.
    pub fn register(&mut self, strategy: Arc<dyn PostingStrategy>) -> Result<(), RegistryError> {
        Self::validate_lifecycle(strategy.as_ref())?;

        let event_type = strategy.event_type().to_string();
        let version = strategy.version();
        let versions = self.strategies.entry(event_type.clone()).or_default();

        if versions.contains_key(&version) {
            return Err(RegistryError::AlreadyRegistered {
                event_type,
                version,
            });
        }

        versions.insert(version, strategy);
        Ok(())
    }

    fn validate_lifecycle(strategy: &dyn PostingStrategy) -> Result<(), RegistryError> {
        let event_type = strategy.event_type().to_string();
        let version = strategy.version();

        if version < 1 {
            return Err(RegistryError::Lifecycle {
                event_type,
                version,
                reason: format!("strategy version must be >= 1, got {version}"),
            });
        }

        if strategy.supported_from_version() < 1 {
            return Err(RegistryError::Lifecycle {
                event_type,
                version,
                reason: format!(
                    "supported_from_version must be >= 1, got {}",
                    strategy.supported_from_version()
                ),
            });
        }

        if let Some(to) = strategy.supported_to_version() {
            if to < strategy.supported_from_version() {
                return Err(RegistryError::Lifecycle {
                    event_type,
                    version,
                    reason: format!(
                        "supported_to_version ({to}) must be >= supported_from_version ({})",
                        strategy.supported_from_version()
                    ),
                });
            }
        }

        Ok(())
    }

    /// Looks up a strategy, the latest version when `version` is `None`.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::NotFound` for an unknown event type or
    /// `RegistryError::VersionNotFound` for a known type without the
    /// requested version.
    pub fn get(
        &self,
        event_type: &str,
        version: Option<u32>,
    ) -> Result<Arc<dyn PostingStrategy>, RegistryError> {
        let versions = self
            .strategies
            .get(event_type)
            .filter(|versions| !versions.is_empty())
            .ok_or_else(|| RegistryError::NotFound {
                event_type: event_type.to_string(),
            })?;

        match version {
            None => {
                let (_, strategy) = versions
                    .last_key_value()
                    .expect("non-empty version map has a maximum");
                Ok(Arc::clone(strategy))
            }
            Some(v) => versions.get(&v).map(Arc::clone).ok_or_else(|| {
                RegistryError::VersionNotFound {
                    event_type: event_type.to_string(),
                    version: v,
                    available: versions.keys().copied().collect(),
                }
            }),
        }
    }

    /// The latest registered version for an event type.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::NotFound` for an unknown event type.
    pub fn latest_version(&self, event_type: &str) -> Result<u32, RegistryError> {
        self.get(event_type, None).map(|s| s.version())
    }

    /// All registered versions for an event type, sorted ascending.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::NotFound` for an unknown event type.
    pub fn all_versions(&self, event_type: &str) -> Result<Vec<u32>, RegistryError> {
        self.strategies
            .get(event_type)
            .map(|versions| versions.keys().copied().collect())
            .ok_or_else(|| RegistryError::NotFound {
                event_type: event_type.to_string(),
            })
    }

    /// All registered event types, sorted.
    #[must_use]
    pub fn event_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.strategies.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    /// Whether any strategy is registered for this event type.
    #[must_use]
    pub fn has_strategy(&self, event_type: &str) -> bool {
        self.strategies
            .get(event_type)
            .is_some_and(|versions| !versions.is_empty())
    }

    /// Looks up the strategy for replaying an event that was originally
    /// posted with `original_version`.
    ///
    /// The original version must still be compatible with the current
    /// system version. Strict replay always returns the exact original
    /// version; permissive replay may select a newer compatible version
    /// but this implementation deliberately still returns the original.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::Incompatible` when the original version's
    /// supported range excludes `system_version`, or the lookup errors for
    /// an unknown type or version.
    pub fn get_for_replay(
        &self,
        event_type: &str,
        original_version: u32,
        system_version: u32,
    ) -> Result<Arc<dyn PostingStrategy>, RegistryError> {
        let strategy = self.get(event_type, Some(original_version))?;

        if !strategy.is_compatible_with_system_version(system_version) {
            return Err(RegistryError::Incompatible {
                event_type: event_type.to_string(),
                strategy_version: original_version,
                system_version,
                supported_from: strategy.supported_from_version(),
                supported_to: strategy.supported_to_version(),
            });
        }

        match strategy.replay_policy() {
            ReplayPolicy::Strict | ReplayPolicy::Permissive => Ok(strategy),
        }
    }

    /// All strategies for an event type compatible with a system version,
    /// sorted by version.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::NotFound` for an unknown event type.
    pub fn compatible_strategies(
        &self,
        event_type: &str,
        system_version: u32,
    ) -> Result<Vec<Arc<dyn PostingStrategy>>, RegistryError> {
        let versions = self.strategies.get(event_type).ok_or_else(|| {
            RegistryError::NotFound {
                event_type: event_type.to_string(),
            }
        })?;

        Ok(versions
            .values()
            .filter(|s| s.is_compatible_with_system_version(system_version))
            .map(Arc::clone)
            .collect())
    }
}

impl std::fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut entries: Vec<(&str, Vec<u32>)> = self
            .strategies
            .iter()
            .map(|(event_type, versions)| {
                (event_type.as_str(), versions.keys().copied().collect())
            })
            .collect();
        entries.sort();
        f.debug_struct("StrategyRegistry")
            .field("strategies", &entries)
            .finish()
    }
}
