//! Subledger period close with close-time reconciliation enforcement.
//!
//! Closing a subledger period compares the subledger aggregate balance
//! against the GL control account balance at period end. A blocking
//! variance leaves the period open and persists a failure report for
//! audit; a within-tolerance variance warns and closes.

use chrono::NaiveDate;
use serde_json::json;
use tracing::{info, warn};

use quill_core::clock::Clock;
use quill_core::subledger::{SubledgerControlRegistry, SubledgerReconciler, SubledgerType};
use quill_shared::types::{ActorId, Money, ReportId};

use super::auditor::AuditorService;
use super::journal_writer::RoleResolver;
use crate::entities::{
    ReconciliationFailureReportRow, SubledgerPeriodState, SubledgerPeriodStatusRow,
};
use crate::memory::Txn;

/// Orchestrates subledger period close.
pub struct SubledgerPeriodService<'t, 'a> {
    txn: &'t Txn<'a>,
    clock: &'a dyn Clock,
    registry: SubledgerControlRegistry,
    role_resolver: RoleResolver,
    reconciler: SubledgerReconciler,
    auditor: AuditorService<'t, 'a>,
}

impl<'t, 'a> SubledgerPeriodService<'t, 'a> {
    /// Creates a subledger period service over a scope.
    #[must_use]
    pub fn new(
        txn: &'t Txn<'a>,
        clock: &'a dyn Clock,
        registry: SubledgerControlRegistry,
        role_resolver: RoleResolver,
    ) -> Self {
        Self {
            txn,
            clock,
            registry,
            role_resolver,
            reconciler: SubledgerReconciler::new(),
            auditor: AuditorService::new(txn, clock),
        }
    }

    /// Closes one subledger's period with reconciliation enforcement.
    ///
    /// Idempotent: closing an already-closed period returns the existing
    /// status row. With no contract or `enforce_on_close` unset, the
    /// period closes immediately. A blocking reconciliation violation
    /// leaves the period open and persists a
    /// [`ReconciliationFailureReportRow`] carrying GL balance, SL
    /// balance, delta, currency, and check time.
    pub fn close_subledger_period(
        &self,
        subledger_type: SubledgerType,
        period_code: &str,
        period_end_date: NaiveDate,
        actor_id: ActorId,
    ) -> SubledgerPeriodStatusRow {
        let now = self.clock.now();
        let mut status = self
            .txn
            .get_subledger_period_status(subledger_type, period_code)
            .unwrap_or(SubledgerPeriodStatusRow {
                subledger_type,
                period_code: period_code.to_string(),
                status: SubledgerPeriodState::Open,
                closed_at: None,
                closed_by: None,
                reconciliation_report_id: None,
            });

        if status.status == SubledgerPeriodState::Closed {
            info!(
                subledger_type = %subledger_type,
                period_code = period_code,
                "subledger_period_already_closed"
            );
            return status;
        }

        status.status = SubledgerPeriodState::Reconciling;
        self.txn.upsert_subledger_period_status(status.clone());

        let Some(contract) = self
            .registry
            .get(subledger_type)
            .filter(|c| c.enforce_on_close)
        else {
            return self.close_without_enforcement(status, actor_id, "skipped");
        };

        // An unresolvable control account role cannot be enforced; the
        // close proceeds and the gap is logged for audit follow-up.
        let Some((control_account_id, _)) =
            self.role_resolver.resolve(contract.control_account_role())
        else {
            warn!(
                subledger_type = %subledger_type,
                period_code = period_code,
                role = contract.control_account_role(),
                "subledger_period_close_role_unresolvable"
            );
            return self.close_without_enforcement(status, actor_id, "role_unresolvable");
        };

        let currency = contract.binding.currency.code().to_string();
        let raw_gl_balance =
            self.txn
                .account_balance(control_account_id, period_end_date, &currency, Some("GL"));
        let gl_economic = if contract.binding.is_debit_normal {
            raw_gl_balance
        } else {
            -raw_gl_balance
        };
        let gl_balance =
            Money::of(gl_economic, &currency).expect("contract currency is validated");

        let sl_balance = self.aggregate_balance(subledger_type, period_end_date, &currency);

        let violations = match self.reconciler.validate_period_close(
            contract,
            &sl_balance,
            &gl_balance,
            period_end_date,
            self.clock.now(),
        ) {
            Ok(violations) => violations,
            Err(e) => {
                warn!(
                    subledger_type = %subledger_type,
                    period_code = period_code,
                    error = %e,
                    "subledger_period_close_check_failed"
                );
                return self.close_without_enforcement(status, actor_id, "check_failed");
            }
        };

        let blocking: Vec<&_> = violations.iter().filter(|v| v.blocking).collect();
        if !blocking.is_empty() {
            let delta = sl_balance.amount - gl_balance.amount;
            let report = ReconciliationFailureReportRow {
                id: ReportId::new(),
                subledger_type,
                period_code: period_code.to_string(),
                gl_control_balance: gl_balance.amount,
                sl_aggregate_balance: sl_balance.amount,
                delta_amount: delta,
                currency: currency.clone(),
                checked_at: now,
            };
            self.txn.insert_failure_report(report.clone());

            status.status = SubledgerPeriodState::Open;
            status.reconciliation_report_id = Some(report.id);
            self.txn.upsert_subledger_period_status(status.clone());

            self.auditor.record(
                "subledger_period",
                &format!("{subledger_type}:{period_code}"),
                "close_blocked",
                &json!({
                    "gl_balance": gl_balance.amount.to_string(),
                    "sl_balance": sl_balance.amount.to_string(),
                    "delta": delta.to_string(),
                    "currency": currency,
                    "report_id": report.id.to_string(),
                }),
            );
            warn!(
                subledger_type = %subledger_type,
                period_code = period_code,
                gl_balance = %gl_balance.amount,
                sl_balance = %sl_balance.amount,
                delta = %delta,
                report_id = %report.id,
                violation_count = blocking.len(),
                "subledger_period_close_blocked"
            );
            return status;
        }

        for violation in &violations {
            info!(
                subledger_type = %subledger_type,
                period_code = period_code,
                message = violation.message,
                "subledger_period_close_warning"
            );
        }

        status.status = SubledgerPeriodState::Closed;
        status.closed_at = Some(now);
        status.closed_by = Some(actor_id);
        self.txn.upsert_subledger_period_status(status.clone());

        self.auditor.record(
            "subledger_period",
            &format!("{subledger_type}:{period_code}"),
            "closed",
            &json!({
                "gl_balance": gl_balance.amount.to_string(),
                "sl_balance": sl_balance.amount.to_string(),
                "currency": currency,
            }),
        );
        info!(
            subledger_type = %subledger_type,
            period_code = period_code,
            gl_balance = %gl_balance.amount,
            sl_balance = %sl_balance.amount,
            enforcement = "passed",
            "subledger_period_closed"
        );
        status
    }

    /// Whether one subledger's period is closed.
    #[must_use]
    pub fn is_subledger_closed(&self, subledger_type: SubledgerType, period_code: &str) -> bool {
        self.txn
            .get_subledger_period_status(subledger_type, period_code)
            .is_some_and(|row| row.status == SubledgerPeriodState::Closed)
    }

    /// Whether every contract with close-time enforcement has a closed
    /// status row for the period.
    #[must_use]
    pub fn are_all_subledgers_closed(&self, period_code: &str) -> bool {
        self.registry
            .all()
            .into_iter()
            .filter(|contract| contract.enforce_on_close)
            .all(|contract| self.is_subledger_closed(contract.subledger_type(), period_code))
    }

    /// Close status per subledger type for a period.
    #[must_use]
    pub fn get_close_status(&self, period_code: &str) -> Vec<(SubledgerType, SubledgerPeriodState)> {
        self.registry
            .all()
            .into_iter()
            .map(|contract| {
                let state = self
                    .txn
                    .get_subledger_period_status(contract.subledger_type(), period_code)
                    .map_or(SubledgerPeriodState::Open, |row| row.status);
                (contract.subledger_type(), state)
            })
            .collect()
    }

    fn close_without_enforcement(
        &self,
        mut status: SubledgerPeriodStatusRow,
        actor_id: ActorId,
        enforcement: &str,
    ) -> SubledgerPeriodStatusRow {
        status.status = SubledgerPeriodState::Closed;
        status.closed_at = Some(self.clock.now());
        status.closed_by = Some(actor_id);
        self.txn.upsert_subledger_period_status(status.clone());
        info!(
            subledger_type = %status.subledger_type,
            period_code = status.period_code,
            enforcement = enforcement,
            "subledger_period_closed"
        );
        status
    }

    fn aggregate_balance(
        &self,
        subledger_type: SubledgerType,
        as_of_date: NaiveDate,
        currency: &str,
    ) -> Money {
        let mut debit_total = rust_decimal::Decimal::ZERO;
        let mut credit_total = rust_decimal::Decimal::ZERO;
        for entry in self.txn.subledger_entries(subledger_type, None) {
            if entry.effective_date > as_of_date || entry.currency() != currency {
                continue;
            }
            if let Some(debit) = &entry.debit {
                debit_total += debit.amount;
            }
            if let Some(credit) = &entry.credit {
                credit_total += credit.amount;
            }
        }
        let amount = if subledger_type.is_credit_normal() {
            credit_total - debit_total
        } else {
            debit_total - credit_total
        };
        Money::of(amount, currency).expect("contract currency is validated")
    }
}
