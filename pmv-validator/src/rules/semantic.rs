//! Semantic plausibility checks
//!
//! Contextual checks that flag values which are legal but unusual. These
//! only ever produce `minor` errors or warnings.

use super::business::nightly_rate;
use crate::payload::Payload;
use crate::types::{
    ErrorKind, Findings, Impact, Severity, ValidationContext, ValidationError, ValidationWarning,
    WarningKind,
};

/// Guests per bedroom above which occupancy looks implausible
pub const MAX_GUESTS_PER_BEDROOM: f64 = 4.0;

/// Minimum description length before a best-practice warning
pub const MIN_DESCRIPTION_CHARS: usize = 50;

/// Typical nightly price band per property type
pub const PRICE_BANDS: &[(&str, f64, f64)] = &[
    ("apartment", 50.0, 300.0),
    ("house", 80.0, 600.0),
    ("villa", 200.0, 2000.0),
    ("cabin", 60.0, 400.0),
    ("studio", 40.0, 200.0),
    ("condo", 60.0, 400.0),
    ("cottage", 70.0, 400.0),
    ("loft", 60.0, 350.0),
];

pub fn price_band(property_type: &str) -> Option<(f64, f64)> {
    let wanted = property_type.trim().to_ascii_lowercase();
    PRICE_BANDS
        .iter()
        .find(|(name, _, _)| *name == wanted)
        .map(|(_, min, max)| (*min, *max))
}

/// Property type from the context, else from the response
fn property_type<'a>(payload: &Payload<'a>, context: &'a ValidationContext) -> Option<&'a str> {
    context
        .property_type
        .as_deref()
        .or_else(|| payload.str("propertyType"))
}

pub fn validate_semantics(payload: &Payload<'_>, context: &ValidationContext) -> Findings {
    let mut findings = Findings::default();
    check_occupancy_ratio(payload, &mut findings);
    check_price_for_type(payload, context, &mut findings);
    check_description(payload, &mut findings);
    check_rating_without_reviews(payload, &mut findings);
    findings
}

fn check_occupancy_ratio(payload: &Payload<'_>, findings: &mut Findings) {
    let Some((guest_field, guests)) = payload.first_number(&["maxGuests", "guests"]) else {
        return;
    };
    let Some(bedrooms) = payload.number("bedrooms") else {
        return;
    };
    findings.rules_applied += 1;

    // Studios count as one sleeping area
    let rooms = bedrooms.max(1.0);
    if guests / rooms > MAX_GUESTS_PER_BEDROOM {
        findings.error(
            ValidationError::new(
                ErrorKind::Semantic,
                Severity::Minor,
                guest_field,
                format!(
                    "{} guests for {} bedroom(s) is more than {} per bedroom",
                    guests, bedrooms, MAX_GUESTS_PER_BEDROOM
                ),
            )
            .with_confidence(0.7)
            .with_source("semantic.occupancy_ratio"),
        );
    }
}

fn check_price_for_type(
    payload: &Payload<'_>,
    context: &ValidationContext,
    findings: &mut Findings,
) {
    let Some(kind) = property_type(payload, context) else {
        return;
    };
    let (Some((min, max)), Some((field, rate))) = (price_band(kind), nightly_rate(payload)) else {
        return;
    };
    findings.rules_applied += 1;
    if rate <= 0.0 || (min..=max).contains(&rate) {
        return;
    }
    let message = format!(
        "Nightly rate {} is outside the typical range {}-{} for a {}",
        rate, min, max, kind
    );

    if rate >= min / 2.0 && rate <= max * 2.0 {
        findings.warn(ValidationWarning::new(
            WarningKind::PotentialIssue,
            field,
            message,
            Impact::Medium,
        ));
    } else {
        findings.error(
            ValidationError::new(ErrorKind::Semantic, Severity::Minor, field, message)
                .with_confidence(0.6)
                .with_source("semantic.price_for_type"),
        );
    }
}

fn check_description(payload: &Payload<'_>, findings: &mut Findings) {
    let Some(description) = payload.str("description") else {
        return;
    };
    findings.rules_applied += 1;
    if description.trim().chars().count() < MIN_DESCRIPTION_CHARS {
        findings.warn(ValidationWarning::new(
            WarningKind::BestPractice,
            "description",
            format!("Description is shorter than {} characters", MIN_DESCRIPTION_CHARS),
            Impact::Low,
        ));
    }
}

fn check_rating_without_reviews(payload: &Payload<'_>, findings: &mut Findings) {
    let rating = payload.number("rating");
    let (Some(rating), Some(count)) = (rating, payload.number("reviewCount")) else {
        return;
    };
    findings.rules_applied += 1;
    if count == 0.0 && rating > 0.0 {
        findings.warn(ValidationWarning::new(
            WarningKind::PotentialIssue,
            "rating",
            "Rating is set but there are no reviews",
            Impact::Medium,
        ));
    }
}
