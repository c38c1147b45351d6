//! Shared proposal assembly for posting strategies.
//!
//! Strategies only derive line specifications; this module performs the
//! common validation and resolution that every strategy output goes
//! through: account, currency, and dimension checks, the rounding
//! discipline, the balance check, and account-code resolution into a
//! `ProposedJournalEntry` stamped with the reference snapshot versions.

use rust_decimal::Decimal;
use tracing::debug;

use quill_shared::types::Money;

use super::types::PostingStrategy;
use crate::event::EventEnvelope;
use crate::journal::{
    LineSide, LineSpec, ProposedJournalEntry, ProposedLine, ReferenceData, ValidationError,
};

/// Runs a strategy and assembles its output into a proposed entry.
///
/// # Errors
///
/// Returns the collected validation errors when the strategy fails or its
/// output violates an invariant. Error codes: `STRATEGY_ERROR`,
/// `INVALID_ACCOUNT`, `ACCOUNT_INACTIVE`, `INVALID_CURRENCY`,
/// `MISSING_DIMENSION`, `INVALID_DIMENSION_VALUE`,
/// `MULTIPLE_ROUNDING_LINES`, `ROUNDING_AMOUNT_EXCEEDED`,
/// `NO_ROUNDING_ACCOUNT`, `UNBALANCED_ENTRY`.
pub fn propose(
    strategy: &dyn PostingStrategy,
    event: &EventEnvelope,
    reference: &ReferenceData,
) -> Result<ProposedJournalEntry, Vec<ValidationError>> {
    let mut specs = strategy
        .compute_line_specs(event, reference)
        .map_err(|e| {
            vec![ValidationError::new(e.error_code(), e.to_string())]
        })?;

    if specs.is_empty() {
        return Err(vec![ValidationError::new(
            "STRATEGY_ERROR",
            "Strategy produced no lines",
        )]);
    }

    let mut errors = validate_specs(&specs, reference);
    errors.extend(validate_rounding_discipline(&specs));
    errors.extend(balance_with_rounding(&mut specs, reference));

    if !errors.is_empty() {
        return Err(errors);
    }

    let lines = resolve_lines(&specs, reference);
    let mut entry = ProposedJournalEntry::new(event.clone(), lines)
        .map_err(|e| vec![ValidationError::new(e.error_code(), e.to_string())])?;
    entry.description = strategy.description(event);
    entry.metadata = strategy.metadata(event);
    entry.posting_rule_version = strategy.version();
    entry.coa_version = reference.coa_version;
    entry.dimension_schema_version = reference.dimension_schema_version;
    entry.rounding_policy_version = reference.rounding_policy_version;
    entry.currency_registry_version = reference.currency_registry_version;

    debug!(
        event_type = %event.event_type,
        line_count = entry.lines.len(),
        strategy_version = strategy.version(),
        "proposal_assembled"
    );

    Ok(entry)
}

/// Maximum rounding amount for an entry with `non_rounding_lines` regular
/// lines: `max(0.01, 0.01 * non_rounding_lines)`.
#[must_use]
pub fn rounding_threshold(non_rounding_lines: usize) -> Decimal {
    let per_line = Decimal::new(1, 2);
    let scaled = per_line * Decimal::from(non_rounding_lines);
    scaled.max(per_line)
}

fn validate_specs(specs: &[LineSpec], reference: &ReferenceData) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    for spec in specs {
        if !reference.is_valid_currency(&spec.money.currency) {
            errors.push(
                ValidationError::new(
                    "INVALID_CURRENCY",
                    format!(
                        "Currency '{}' is not valid for posting",
                        spec.money.currency
                    ),
                )
                .with_field("currency"),
            );
        }

        if reference.get_account_id(&spec.account_code).is_none() {
            errors.push(
                ValidationError::new(
                    "INVALID_ACCOUNT",
                    format!("Unknown account code '{}'", spec.account_code),
                )
                .with_field("account_code"),
            );
        } else if !reference.is_account_active(&spec.account_code) {
            errors.push(
                ValidationError::new(
                    "ACCOUNT_INACTIVE",
                    format!("Account '{}' does not accept posting", spec.account_code),
                )
                .with_field("account_code"),
            );
        }

        errors.extend(reference.validate_dimensions(spec.dimensions.as_ref()));
    }

    errors
}

fn validate_rounding_discipline(specs: &[LineSpec]) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let rounding: Vec<&LineSpec> = specs.iter().filter(|s| s.is_rounding).collect();
    let non_rounding_count = specs.len() - rounding.len();

    if rounding.len() > 1 {
        errors.push(ValidationError::new(
            "MULTIPLE_ROUNDING_LINES",
            format!("Entry has {} rounding lines; at most one allowed", rounding.len()),
        ));
    }

    if let Some(line) = rounding.first() {
        let threshold = rounding_threshold(non_rounding_count);
        if line.money.amount > threshold {
            errors.push(ValidationError::new(
                "ROUNDING_AMOUNT_EXCEEDED",
                format!(
                    "Rounding amount {} exceeds threshold {} for {}",
                    line.money.amount, threshold, line.money.currency
                ),
            ));
        }
    }

    errors
}

/// Balances each currency, appending one rounding line when the residual
/// is within the rounding threshold and a rounding account is configured.
///
/// There is no silent correction: any imbalance outside the rounding
/// discipline fails hard, and an auto-appended line is explicitly marked
/// `is_rounding` and routed through the currency's rounding account.
fn balance_with_rounding(
    specs: &mut Vec<LineSpec>,
    reference: &ReferenceData,
) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let currencies: Vec<String> = {
        let mut codes: Vec<String> = specs
            .iter()
            .map(|s| s.money.currency.code().to_string())
            .collect();
        codes.sort();
        codes.dedup();
        codes
    };
    // At most one rounding line per entry: an explicit one blocks
    // auto-correction entirely, and only the first residual currency may
    // receive an auto-appended line.
    let mut has_rounding_line = specs.iter().any(|s| s.is_rounding);

    for currency in currencies {
        let imbalance: Decimal = specs
            .iter()
            .filter(|s| s.money.currency.code() == currency)
            .map(|s| match s.side {
                LineSide::Debit => s.money.amount,
                LineSide::Credit => -s.money.amount,
            })
            .sum();

        if imbalance.is_zero() {
            continue;
        }

        let threshold = rounding_threshold(specs.iter().filter(|s| !s.is_rounding).count());
        if imbalance.abs() > threshold || has_rounding_line {
            errors.push(ValidationError::new(
                "UNBALANCED_ENTRY",
                format!("Entry is unbalanced for {currency}: imbalance = {imbalance}"),
            ));
            continue;
        }

        let Some(rounding_account) = reference.get_rounding_account(&currency) else {
            errors.push(ValidationError::new(
                "NO_ROUNDING_ACCOUNT",
                format!("No rounding account configured for {currency}"),
            ));
            continue;
        };

        // Residual debits need a balancing credit and vice versa.
        let side = if imbalance > Decimal::ZERO {
            LineSide::Credit
        } else {
            LineSide::Debit
        };
        let money = Money::of(imbalance.abs(), &currency)
            .expect("currency already validated");
        let line = LineSpec::new(rounding_account.account_code.clone(), side, money)
            .expect("absolute imbalance is non-negative")
            .as_rounding();

        debug!(
            currency = %currency,
            amount = %line.money.amount,
            side = %line.side,
            "rounding_line_appended"
        );
        specs.push(line);
        has_rounding_line = true;
    }

    errors
}

fn resolve_lines(specs: &[LineSpec], reference: &ReferenceData) -> Vec<ProposedLine> {
    specs
        .iter()
        .enumerate()
        .map(|(i, spec)| ProposedLine {
            account_id: reference
                .get_account_id(&spec.account_code)
                .expect("account codes validated before resolution"),
            account_code: spec.account_code.clone(),
            side: spec.side,
            money: spec.money.clone(),
            dimensions: spec.dimensions.clone(),
            memo: spec.memo.clone(),
            is_rounding: spec.is_rounding,
            exchange_rate_id: None,
            line_seq: u32::try_from(i).expect("line count fits in u32"),
        })
        .collect()
}
