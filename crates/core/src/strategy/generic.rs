//! Generic posting strategy reading line specs from the event payload.
//!
//! Handles events whose payload carries pre-computed line specifications:
//!
//! ```json
//! {
//!     "lines": [
//!         {
//!             "account_code": "1000",
//!             "side": "debit",
//!             "amount": "100.00",
//!             "currency": "USD",
//!             "memo": "optional",
//!             "dimensions": {"project": "P001"},
//!             "is_rounding": false
//!         }
//!     ],
//!     "description": "optional description",
//!     "metadata": {}
//! }
//! ```

use std::collections::BTreeMap;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde_json::Value;

use quill_shared::types::Money;

use super::error::StrategyError;
use super::types::PostingStrategy;
use crate::event::EventEnvelope;
use crate::journal::{LineSide, LineSpec, ReferenceData};

/// Strategy that reads line specs directly from the payload.
///
/// Constructible for any event type, which makes it useful for events
/// pre-computed by external systems and for tests.
#[derive(Debug, Clone)]
pub struct GenericPostingStrategy {
    event_type: String,
    version: u32,
}

impl GenericPostingStrategy {
    /// Creates a generic strategy for `generic.posting` version 1.
    #[must_use]
    pub fn new() -> Self {
        Self::for_event_type("generic.posting", 1)
    }

    /// Creates a generic strategy for an arbitrary event type and version.
    #[must_use]
    pub fn for_event_type(event_type: impl Into<String>, version: u32) -> Self {
        Self {
            event_type: event_type.into(),
            version,
        }
    }

    fn parse_line(line: &Value) -> Result<LineSpec, StrategyError> {
        let side = match line.get("side").and_then(Value::as_str) {
            Some("debit") => LineSide::Debit,
            Some("credit") => LineSide::Credit,
            other => {
                return Err(StrategyError::Execution(format!(
                    "Invalid line side: {other:?}"
                )));
            }
        };

        let amount_str = line
            .get("amount")
            .and_then(Value::as_str)
            .ok_or_else(|| StrategyError::Execution("Line must have 'amount'".to_string()))?;
        let amount = Decimal::from_str(amount_str)
            .map_err(|e| StrategyError::Execution(format!("Invalid amount '{amount_str}': {e}")))?;

        let account_code = line
            .get("account_code")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                StrategyError::Execution("Line must have 'account_code'".to_string())
            })?;

        let currency = line
            .get("currency")
            .and_then(Value::as_str)
            .ok_or_else(|| StrategyError::Execution("Line must have 'currency'".to_string()))?;
        let money = Money::of(amount, currency)
            .map_err(|e| StrategyError::Execution(e.to_string()))?;

        let mut spec = LineSpec::new(account_code, side, money)
            .map_err(|e| StrategyError::Execution(e.to_string()))?;

        if let Some(memo) = line.get("memo").and_then(Value::as_str) {
            spec = spec.with_memo(memo);
        }
        if let Some(dimensions) = line.get("dimensions").and_then(Value::as_object) {
            let dims: BTreeMap<String, String> = dimensions
                .iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect();
            spec = spec.with_dimensions(dims);
        }
        if line.get("is_rounding").and_then(Value::as_bool) == Some(true) {
            spec = spec.as_rounding();
        }

        Ok(spec)
    }
}

impl Default for GenericPostingStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl PostingStrategy for GenericPostingStrategy {
    fn event_type(&self) -> &str {
        &self.event_type
    }

    fn version(&self) -> u32 {
        self.version
    }

    fn compute_line_specs(
        &self,
        event: &EventEnvelope,
        _reference: &ReferenceData,
    ) -> Result<Vec<LineSpec>, StrategyError> {
        let lines = event
            .payload
            .get("lines")
            .and_then(Value::as_array)
            .filter(|lines| !lines.is_empty())
            .ok_or_else(|| {
                StrategyError::Execution("Payload must contain 'lines' array".to_string())
            })?;

        lines.iter().map(Self::parse_line).collect()
    }

    fn description(&self, event: &EventEnvelope) -> Option<String> {
        event
            .payload
            .get("description")
            .and_then(Value::as_str)
            .map(ToString::to_string)
    }

    fn metadata(&self, event: &EventEnvelope) -> Option<Value> {
        event.payload.get("metadata").cloned()
    }
}
