//! Strategy and registry error types.

use thiserror::Error;

/// Failure inside a posting strategy.
///
/// Strategies are pure; the only way they fail is by rejecting their
/// input. The bookkeeper converts these into validation failures rather
/// than letting them propagate.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StrategyError {
    /// The strategy could not derive line specs from the event.
    #[error("Strategy execution failed: {0}")]
    Execution(String),
}

impl StrategyError {
    /// Returns the machine-readable error code.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Execution(_) => "STRATEGY_ERROR",
        }
    }
}

/// Failure in strategy registration or lookup.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// No strategy registered for the event type.
    #[error("No strategy found for event type: {event_type}")]
    NotFound {
        /// The event type that was looked up.
        event_type: String,
    },

    /// The event type is known but the requested version is not.
    #[error(
        "Strategy version {version} not found for {event_type}. Available versions: {available:?}"
    )]
    VersionNotFound {
        /// The event type that was looked up.
        event_type: String,
        /// The version that was requested.
        version: u32,
        /// Registered versions, sorted ascending.
        available: Vec<u32>,
    },

    /// Lifecycle metadata failed validation at registration.
    #[error("Strategy lifecycle error for {event_type} v{version}: {reason}")]
    Lifecycle {
        /// Event type of the rejected strategy.
        event_type: String,
        /// Version of the rejected strategy.
        version: u32,
        /// Why the metadata was rejected.
        reason: String,
    },

    /// The strategy's supported range excludes the current system version.
    #[error(
        "Strategy {event_type} v{strategy_version} is incompatible with system version \
         {system_version}. Supported range: [{supported_from}, {supported_to:?}]"
    )]
    Incompatible {
        /// Event type of the strategy.
        event_type: String,
        /// Version of the strategy.
        strategy_version: u32,
        /// Current system version.
        system_version: u32,
        /// Lower bound of the supported range.
        supported_from: u32,
        /// Upper bound of the supported range; `None` means open-ended.
        supported_to: Option<u32>,
    },

    /// A strategy is already registered for this `(event_type, version)`.
    #[error("Strategy already registered for {event_type} v{version}")]
    AlreadyRegistered {
        /// Event type of the duplicate.
        event_type: String,
        /// Version of the duplicate.
        version: u32,
    },
}

impl RegistryError {
    /// Returns the machine-readable error code.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "STRATEGY_NOT_FOUND",
            Self::VersionNotFound { .. } => "STRATEGY_VERSION_NOT_FOUND",
            Self::Lifecycle { .. } => "STRATEGY_LIFECYCLE_ERROR",
            Self::Incompatible { .. } => "STRATEGY_INCOMPATIBLE",
            Self::AlreadyRegistered { .. } => "STRATEGY_ALREADY_REGISTERED",
        }
    }
}
