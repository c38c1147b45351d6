//! Fiscal period lifecycle.
//!
//! Periods move `open -> closed`, never back. Once closed, the period's
//! boundary dates, status, and adjustment flag are fixed -- enforced both
//! here and by the store's guarded period updates.

use chrono::NaiveDate;
use serde_json::json;
use thiserror::Error;
use tracing::info;

use quill_core::clock::Clock;
use quill_shared::types::ActorId;

use super::auditor::AuditorService;
use crate::entities::{FiscalPeriodRow, PeriodStatus};
use crate::error::StoreError;
use crate::memory::Txn;

/// Fiscal period errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PeriodError {
    /// No period covers the date, or no period has the code.
    #[error("No fiscal period found for {0}")]
    PeriodNotFound(String),

    /// The period is already closed.
    #[error("Period '{0}' is already closed")]
    PeriodAlreadyClosed(String),

    /// The new period's date range overlaps an existing period.
    #[error("Period '{code}' overlaps existing period '{existing}'")]
    PeriodOverlap {
        /// Code of the rejected period.
        code: String,
        /// Code of the period it overlaps.
        existing: String,
    },

    /// A closed period's structural fields are fixed.
    #[error("Period '{0}' is closed and immutable")]
    PeriodImmutable(String),

    /// Posting into a closed period without an allowed adjustment.
    #[error("Period '{0}' is closed")]
    ClosedPeriod(String),

    /// An adjustment was attempted on a closed period that does not allow
    /// adjustments.
    #[error("Period '{0}' does not allow adjustments")]
    AdjustmentsNotAllowed(String),

    /// The period's start date is after its end date.
    #[error("Period '{code}' has start {start} after end {end}")]
    InvalidDateRange {
        /// Code of the rejected period.
        code: String,
        /// Proposed start date.
        start: NaiveDate,
        /// Proposed end date.
        end: NaiveDate,
    },

    /// A period with this code already exists.
    #[error("Period code '{0}' already exists")]
    DuplicateCode(String),
}

impl PeriodError {
    /// Returns the machine-readable error code.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::PeriodNotFound(_) => "PERIOD_NOT_FOUND",
            Self::PeriodAlreadyClosed(_) => "PERIOD_ALREADY_CLOSED",
            Self::PeriodOverlap { .. } => "PERIOD_OVERLAP",
            Self::PeriodImmutable(_) => "PERIOD_IMMUTABLE",
            Self::ClosedPeriod(_) => "CLOSED_PERIOD",
            Self::AdjustmentsNotAllowed(_) => "ADJUSTMENTS_NOT_ALLOWED",
            Self::InvalidDateRange { .. } => "INVALID_PERIOD_RANGE",
            Self::DuplicateCode(_) => "PERIOD_CODE_EXISTS",
        }
    }
}

impl From<StoreError> for PeriodError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::PeriodImmutable { period_code } => Self::PeriodImmutable(period_code),
            StoreError::NotFound { key, .. } => Self::PeriodNotFound(key),
            other => Self::PeriodNotFound(other.to_string()),
        }
    }
}

/// Manages the fiscal period lifecycle.
pub struct PeriodService<'t, 'a> {
    txn: &'t Txn<'a>,
    clock: &'a dyn Clock,
    auditor: AuditorService<'t, 'a>,
}

impl<'t, 'a> PeriodService<'t, 'a> {
    /// Creates a period service over a scope.
    #[must_use]
    pub fn new(txn: &'t Txn<'a>, clock: &'a dyn Clock) -> Self {
        Self {
            txn,
            clock,
            auditor: AuditorService::new(txn, clock),
        }
    }

    /// Creates an open fiscal period.
    ///
    /// # Errors
    ///
    /// Returns `PeriodError::InvalidDateRange` when `start > end`,
    /// `PeriodError::DuplicateCode` for a reused code, or
    /// `PeriodError::PeriodOverlap` when the range intersects an existing
    /// period.
    pub fn create_period(
        &self,
        period_code: &str,
        name: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
        actor_id: ActorId,
    ) -> Result<FiscalPeriodRow, PeriodError> {
        if start_date > end_date {
            return Err(PeriodError::InvalidDateRange {
                code: period_code.to_string(),
                start: start_date,
                end: end_date,
            });
        }
        if self.txn.get_period(period_code).is_some() {
            return Err(PeriodError::DuplicateCode(period_code.to_string()));
        }
        if let Some(existing) = self
            .txn
            .fiscal_periods()
            .into_iter()
            .find(|p| start_date <= p.end_date && p.start_date <= end_date)
        {
            return Err(PeriodError::PeriodOverlap {
                code: period_code.to_string(),
                existing: existing.period_code,
            });
        }

        let period = FiscalPeriodRow {
            period_code: period_code.to_string(),
            name: name.to_string(),
            start_date,
            end_date,
            status: PeriodStatus::Open,
            allows_adjustments: false,
            closed_at: None,
            closed_by_id: None,
        };
        self.txn
            .insert_period(period.clone())
            .expect("uniqueness checked under the scope lock");

        self.auditor.record(
            "fiscal_period",
            period_code,
            "created",
            &json!({
                "start_date": start_date.to_string(),
                "end_date": end_date.to_string(),
                "actor_id": actor_id.to_string(),
            }),
        );
        info!(period_code = period_code, "fiscal_period_created");
        Ok(period)
    }

    /// The unique period containing `date`.
    ///
    /// # Errors
    ///
    /// Returns `PeriodError::PeriodNotFound` when no period covers the
    /// date.
    pub fn get_period_for_date(&self, date: NaiveDate) -> Result<FiscalPeriodRow, PeriodError> {
        self.txn
            .period_for_date(date)
            .ok_or_else(|| PeriodError::PeriodNotFound(date.to_string()))
    }

    /// Looks up a period by code.
    ///
    /// # Errors
    ///
    /// Returns `PeriodError::PeriodNotFound` for an unknown code.
    pub fn get_period(&self, period_code: &str) -> Result<FiscalPeriodRow, PeriodError> {
        self.txn
            .get_period(period_code)
            .ok_or_else(|| PeriodError::PeriodNotFound(period_code.to_string()))
    }

    /// Validates that an entry may post on `effective_date`.
    ///
    /// Open periods accept everything. A closed period accepts only an
    /// adjustment, and only when the period allows adjustments.
    ///
    /// # Errors
    ///
    /// Returns `PeriodError::PeriodNotFound`, `PeriodError::ClosedPeriod`,
    /// or `PeriodError::AdjustmentsNotAllowed`.
    pub fn validate_posting(
        &self,
        effective_date: NaiveDate,
        is_adjustment: bool,
    ) -> Result<FiscalPeriodRow, PeriodError> {
        let period = self.get_period_for_date(effective_date)?;
        match period.status {
            PeriodStatus::Open => Ok(period),
            PeriodStatus::Closed if is_adjustment && period.allows_adjustments => Ok(period),
            PeriodStatus::Closed if is_adjustment => {
                Err(PeriodError::AdjustmentsNotAllowed(period.period_code))
            }
            PeriodStatus::Closed => Err(PeriodError::ClosedPeriod(period.period_code)),
        }
    }

    /// Transitions a period `open -> closed`.
    ///
    /// # Errors
    ///
    /// Returns `PeriodError::PeriodNotFound` or
    /// `PeriodError::PeriodAlreadyClosed`.
    pub fn close_period(
        &self,
        period_code: &str,
        actor_id: ActorId,
    ) -> Result<FiscalPeriodRow, PeriodError> {
        let period = self.get_period(period_code)?;
        if period.status == PeriodStatus::Closed {
            return Err(PeriodError::PeriodAlreadyClosed(period_code.to_string()));
        }

        let now = self.clock.now();
        let closed = self.txn.update_period(period_code, |p| {
            p.status = PeriodStatus::Closed;
            p.closed_at = Some(now);
            p.closed_by_id = Some(actor_id);
        })?;

        self.auditor.record(
            "fiscal_period",
            period_code,
            "closed",
            &json!({
                "closed_at": now.to_rfc3339(),
                "closed_by_id": actor_id.to_string(),
            }),
        );
        info!(period_code = period_code, "fiscal_period_closed");
        Ok(closed)
    }

    /// Allows adjustment entries in the period after close.
    ///
    /// Only an open period's flag may change.
    ///
    /// # Errors
    ///
    /// Returns `PeriodError::PeriodNotFound` or
    /// `PeriodError::PeriodImmutable` when the period is closed.
    pub fn enable_adjustments(
        &self,
        period_code: &str,
        actor_id: ActorId,
    ) -> Result<FiscalPeriodRow, PeriodError> {
        self.set_adjustments(period_code, actor_id, true)
    }

    /// Disallows adjustment entries in the period after close.
    ///
    /// # Errors
    ///
    /// Returns `PeriodError::PeriodNotFound` or
    /// `PeriodError::PeriodImmutable` when the period is closed.
    pub fn disable_adjustments(
        &self,
        period_code: &str,
        actor_id: ActorId,
    ) -> Result<FiscalPeriodRow, PeriodError> {
        self.set_adjustments(period_code, actor_id, false)
    }

    fn set_adjustments(
        &self,
        period_code: &str,
        actor_id: ActorId,
        allows_adjustments: bool,
    ) -> Result<FiscalPeriodRow, PeriodError> {
        let period = self.get_period(period_code)?;
        if period.status == PeriodStatus::Closed {
            return Err(PeriodError::PeriodImmutable(period_code.to_string()));
        }

        let updated = self
            .txn
            .update_period(period_code, |p| p.allows_adjustments = allows_adjustments)?;
        self.auditor.record(
            "fiscal_period",
            period_code,
            if allows_adjustments {
                "adjustments_enabled"
            } else {
                "adjustments_disabled"
            },
            &json!({"actor_id": actor_id.to_string()}),
        );
        Ok(updated)
    }

    /// Reopening is forbidden: closed periods stay closed.
    ///
    /// # Errors
    ///
    /// Always returns `PeriodError::PeriodImmutable` for an existing
    /// period, `PeriodError::PeriodNotFound` otherwise.
    pub fn reopen_period(
        &self,
        period_code: &str,
        _actor_id: ActorId,
    ) -> Result<FiscalPeriodRow, PeriodError> {
        let _ = self.get_period(period_code)?;
        Err(PeriodError::PeriodImmutable(period_code.to_string()))
    }
}
