//! Cross-field consistency checks
//!
//! Each check recomputes a value from other fields and, on mismatch, emits
//! an error whose suggested fix is the recomputed value.

use crate::payload::{money, Payload};
use crate::types::{ErrorKind, Findings, Severity, ValidationContext, ValidationError};
use serde_json::Value;

const PRICE_TOLERANCE: f64 = 0.01;

fn inconsistency(
    severity: Severity,
    field: impl Into<String>,
    message: impl Into<String>,
    confidence: f64,
    source: &str,
) -> ValidationError {
    ValidationError::new(ErrorKind::Consistency, severity, field, message)
        .with_confidence(confidence)
        .with_source(source)
}

pub fn validate_consistency(payload: &Payload<'_>, _context: &ValidationContext) -> Findings {
    let mut findings = Findings::default();
    check_nights_span(payload, &mut findings);
    check_price_vs_base(payload, &mut findings);
    check_guest_breakdown(payload, &mut findings);
    check_availability_status(payload, &mut findings);
    check_currency(payload, &mut findings);
    findings
}

/// `nights` must equal the number of days between check-in and check-out
fn check_nights_span(payload: &Payload<'_>, findings: &mut Findings) {
    let (Some(check_in), Some(check_out), Some(nights)) = (
        payload.datetime("checkIn"),
        payload.datetime("checkOut"),
        payload.number("nights"),
    ) else {
        return;
    };
    if check_out <= check_in {
        return;
    }
    findings.rules_applied += 1;

    let span = (check_out - check_in).num_days();
    if nights != span as f64 {
        findings.error(
            inconsistency(
                Severity::Major,
                "nights",
                format!(
                    "nights ({}) does not match the {} nights between checkIn and checkOut",
                    nights, span
                ),
                0.97,
                "consistency.nights_span",
            )
            .with_fix(span),
        );
    }
}

/// Top-level price must agree with `pricing.basePrice`
fn check_price_vs_base(payload: &Payload<'_>, findings: &mut Findings) {
    let base = payload.number("pricing.basePrice");
    let (Some(price), Some(base)) = (payload.number("price"), base) else {
        return;
    };
    findings.rules_applied += 1;
    if (price - base).abs() > PRICE_TOLERANCE {
        findings.error(
            inconsistency(
                Severity::Minor,
                "price",
                format!("price ({}) differs from pricing.basePrice ({})", price, base),
                0.85,
                "consistency.price_vs_base",
            )
            .with_fix(money(base)),
        );
    }
}

/// `guests` must equal adults + children when the breakdown is given
fn check_guest_breakdown(payload: &Payload<'_>, findings: &mut Findings) {
    let (Some(guests), Some(adults)) = (payload.number("guests"), payload.number("adults")) else {
        return;
    };
    findings.rules_applied += 1;
    let children = payload.number("children").unwrap_or(0.0);
    let total = adults + children;
    if guests != total {
        findings.error(
            inconsistency(
                Severity::Major,
                "guests",
                format!("guests ({}) does not equal adults + children ({})", guests, total),
                0.97,
                "consistency.guest_breakdown",
            )
            .with_fix(total.round() as i64),
        );
    }
}

/// An unavailable listing cannot carry a confirmed booking
fn check_availability_status(payload: &Payload<'_>, findings: &mut Findings) {
    let (Some(available), Some(status)) = (
        payload.get("available").and_then(Value::as_bool),
        payload.str("status"),
    ) else {
        return;
    };
    findings.rules_applied += 1;
    if !available && status.eq_ignore_ascii_case("confirmed") {
        findings.error(inconsistency(
            Severity::Major,
            "status",
            "Booking is confirmed but the property is marked unavailable",
            0.9,
            "consistency.availability_status",
        ));
    }
}

/// Top-level currency must agree with `pricing.currency`
fn check_currency(payload: &Payload<'_>, findings: &mut Findings) {
    let nested = payload.str("pricing.currency");
    let (Some(currency), Some(nested)) = (payload.str("currency"), nested) else {
        return;
    };
    findings.rules_applied += 1;
    if !currency.trim().eq_ignore_ascii_case(nested.trim()) {
        findings.error(
            inconsistency(
                Severity::Minor,
                "currency",
                format!("currency ({}) differs from pricing.currency ({})", currency, nested),
                0.85,
                "consistency.currency",
            )
            .with_fix(nested.trim().to_ascii_uppercase()),
        );
    }
}
