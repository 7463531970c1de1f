//! Business rules
//!
//! Each rule is an independent, side-effect-free predicate tagged with a
//! stable id and a category. Rules return `Err` when they cannot evaluate;
//! the engine logs and skips those without aborting the remaining rules.

use super::patterns::{is_clock_time, FormatPattern};
use crate::error::ValidatorResult;
use crate::payload::{money, round2, Payload};
use crate::types::{ErrorKind, ResponseType, Severity, ValidationContext, ValidationError};
use chrono::Duration;
use serde::Serialize;
use serde_json::Value;

/// Rule category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleCategory {
    Property,
    Booking,
    Pricing,
    Policy,
    Location,
    Media,
    Reviews,
    Host,
}

/// A pluggable business rule
pub trait BusinessRule: Send + Sync {
    /// Stable rule id, e.g. `pricing.total_matches_components`
    fn id(&self) -> &str;

    fn category(&self) -> RuleCategory;

    /// Evaluate the rule; an empty vector means the rule passed
    fn evaluate(&self, payload: &Payload<'_>, context: &ValidationContext) -> RuleResult;
}

/// Findings of one rule, or its internal failure
pub type RuleResult = ValidatorResult<Vec<ValidationError>>;

type RuleFn = fn(&Payload<'_>, &ValidationContext) -> RuleResult;

/// Built-in rule backed by a plain function
pub struct BuiltinRule {
    id: &'static str,
    category: RuleCategory,
    check: RuleFn,
}

impl BusinessRule for BuiltinRule {
    fn id(&self) -> &str {
        self.id
    }

    fn category(&self) -> RuleCategory {
        self.category
    }

    fn evaluate(&self, payload: &Payload<'_>, context: &ValidationContext) -> RuleResult {
        (self.check)(payload, context)
    }
}

macro_rules! rule {
    ($id:literal, $category:ident, $check:path) => {
        Box::new(BuiltinRule {
            id: $id,
            category: RuleCategory::$category,
            check: $check,
        }) as Box<dyn BusinessRule>
    };
}

/// The built-in rule catalogue
pub fn builtin_rules() -> Vec<Box<dyn BusinessRule>> {
    vec![
        rule!("property.nightly_price_range", Property, nightly_price_range),
        rule!("property.guest_capacity", Property, guest_capacity),
        rule!("property.bedroom_count", Property, bedroom_count),
        rule!("property.bathroom_count", Property, bathroom_count),
        rule!("property.name_length", Property, name_length),
        rule!("property.amenity_conflicts", Property, amenity_conflicts),
        rule!("booking.checkin_lead_time", Booking, checkin_lead_time),
        rule!("booking.stay_length", Booking, stay_length),
        rule!("booking.guests_within_capacity", Booking, guests_within_capacity),
        rule!("booking.minimum_stay", Booking, minimum_stay),
        rule!("pricing.cleaning_fee_ratio", Pricing, cleaning_fee_ratio),
        rule!("pricing.security_deposit_cap", Pricing, security_deposit_cap),
        rule!("pricing.non_negative_components", Pricing, non_negative_components),
        rule!("pricing.total_matches_components", Pricing, total_matches_components),
        rule!("pricing.service_fee_ratio", Pricing, service_fee_ratio),
        rule!("pricing.discount_range", Pricing, discount_range),
        rule!("policy.cancellation_policy", Policy, cancellation_policy),
        rule!("policy.check_times", Policy, check_times),
        rule!("location.address_complete", Location, address_complete),
        rule!("location.coordinates_range", Location, coordinates_range),
        rule!("media.photo_count", Media, photo_count),
        rule!("media.photo_urls", Media, photo_urls),
        rule!("reviews.rating_range", Reviews, rating_range),
        rule!("reviews.review_count", Reviews, review_count),
        rule!("host.contact_reachable", Host, contact_reachable),
        rule!("host.response_rate", Host, response_rate),
    ]
}

// ============================================================================
// Constants
// ============================================================================

pub const MAX_NIGHTLY_PRICE: f64 = 50_000.0;
pub const MAX_SECURITY_DEPOSIT: f64 = 5_000.0;
pub const MAX_CLEANING_FEE_RATIO: f64 = 0.5;
pub const MAX_SERVICE_FEE_RATIO: f64 = 0.2;
pub const TOTAL_TOLERANCE: f64 = 0.01;
pub const MAX_STAY_NIGHTS: i64 = 365;

pub const CANCELLATION_POLICIES: &[&str] = &[
    "flexible",
    "moderate",
    "strict",
    "super_strict_30",
    "super_strict_60",
    "non_refundable",
];

pub const CONFLICTING_AMENITIES: &[(&str, &str)] = &[
    ("petFriendly", "noPets"),
    ("smokingAllowed", "nonSmoking"),
    ("freeParking", "noParking"),
    ("wifi", "noInternet"),
    ("wheelchairAccessible", "stairsOnly"),
];

const PRICE_FIELDS: &[&str] = &["price", "pricePerNight", "nightlyRate"];
const ADDRESS_COMPONENTS: &[&str] = &["street", "city", "postalCode", "country"];
const CONTACT_GROUPS: &[&str] = &["host", "contact", "owner"];

// ============================================================================
// Helpers
// ============================================================================

fn violation(
    rule: &str,
    severity: Severity,
    field: impl Into<String>,
    message: impl Into<String>,
    confidence: f64,
) -> ValidationError {
    ValidationError::new(ErrorKind::Business, severity, field, message)
        .with_confidence(confidence)
        .with_source(rule)
}

/// Pricing component, looked up under `pricing.` first, then at the root
pub fn pricing_component(payload: &Payload<'_>, key: &str) -> Option<(String, f64)> {
    let nested = format!("pricing.{}", key);
    payload.first_number(&[nested.as_str(), key])
}

/// Nightly rate and the path it was read from: an explicit price field,
/// else `pricing.basePrice`
pub fn nightly_rate(payload: &Payload<'_>) -> Option<(String, f64)> {
    payload
        .first_number(PRICE_FIELDS)
        .or_else(|| pricing_component(payload, "basePrice"))
}

fn clamp_int(value: f64, min: i64, max: i64) -> Value {
    Value::from((value.round() as i64).clamp(min, max))
}

fn clamp_num(value: f64, min: f64, max: f64) -> Value {
    money(value.clamp(min, max))
}

// ============================================================================
// Property
// ============================================================================

fn nightly_price_range(p: &Payload<'_>, _: &ValidationContext) -> RuleResult {
    const ID: &str = "property.nightly_price_range";
    let mut out = Vec::new();
    if let Some((field, price)) = p.first_number(PRICE_FIELDS) {
        if price <= 0.0 {
            out.push(violation(
                ID,
                Severity::Critical,
                field,
                format!("Nightly price must be greater than 0 (got {})", price),
                0.99,
            ));
        } else if price > MAX_NIGHTLY_PRICE {
            out.push(violation(
                ID,
                Severity::Critical,
                field,
                format!("Nightly price {} exceeds maximum of {}", price, MAX_NIGHTLY_PRICE),
                0.95,
            ));
        }
    }
    Ok(out)
}

fn guest_capacity(p: &Payload<'_>, _: &ValidationContext) -> RuleResult {
    let mut out = Vec::new();
    if let Some(max_guests) = p.number("maxGuests") {
        if !(1.0..=50.0).contains(&max_guests) {
            out.push(
                violation(
                    "property.guest_capacity",
                    Severity::Major,
                    "maxGuests",
                    format!("Guest capacity {} must be between 1 and 50", max_guests),
                    0.9,
                )
                .with_fix(clamp_int(max_guests, 1, 20)),
            );
        }
    }
    Ok(out)
}

fn bedroom_count(p: &Payload<'_>, _: &ValidationContext) -> RuleResult {
    let mut out = Vec::new();
    if let Some(bedrooms) = p.number("bedrooms") {
        if !(0.0..=50.0).contains(&bedrooms) {
            out.push(
                violation(
                    "property.bedroom_count",
                    Severity::Major,
                    "bedrooms",
                    format!("Bedroom count {} must be between 0 and 50", bedrooms),
                    0.85,
                )
                .with_fix(clamp_int(bedrooms, 0, 50)),
            );
        }
    }
    Ok(out)
}

fn bathroom_count(p: &Payload<'_>, _: &ValidationContext) -> RuleResult {
    let mut out = Vec::new();
    if let Some(bathrooms) = p.number("bathrooms") {
        if !(0.0..=50.0).contains(&bathrooms) {
            out.push(
                violation(
                    "property.bathroom_count",
                    Severity::Major,
                    "bathrooms",
                    format!("Bathroom count {} must be between 0 and 50", bathrooms),
                    0.85,
                )
                .with_fix(clamp_num(bathrooms, 0.0, 50.0)),
            );
        }
    }
    Ok(out)
}

fn name_length(p: &Payload<'_>, _: &ValidationContext) -> RuleResult {
    let mut out = Vec::new();
    if let Some(name) = p.str("name") {
        let len = name.trim().chars().count();
        if len < 3 {
            out.push(violation(
                "property.name_length",
                Severity::Minor,
                "name",
                "Listing name is too short (minimum 3 characters)",
                0.8,
            ));
        } else if len > 200 {
            out.push(violation(
                "property.name_length",
                Severity::Minor,
                "name",
                format!("Listing name is too long ({} characters, maximum 200)", len),
                0.8,
            ));
        }
    }
    Ok(out)
}

fn amenity_conflicts(p: &Payload<'_>, _: &ValidationContext) -> RuleResult {
    let amenities: Vec<String> = p
        .string_list("amenities")
        .into_iter()
        .map(str::to_ascii_lowercase)
        .collect();
    let has = |name: &str| amenities.iter().any(|a| a == &name.to_ascii_lowercase());

    Ok(CONFLICTING_AMENITIES
        .iter()
        .filter(|(a, b)| has(a) && has(b))
        .map(|(a, b)| {
            violation(
                "property.amenity_conflicts",
                Severity::Major,
                "amenities",
                format!("Conflicting amenities: {} and {}", a, b),
                0.95,
            )
        })
        .collect())
}

// ============================================================================
// Booking
// ============================================================================

fn checkin_lead_time(p: &Payload<'_>, ctx: &ValidationContext) -> RuleResult {
    const ID: &str = "booking.checkin_lead_time";
    let mut out = Vec::new();
    if let Some(check_in) = p.datetime("checkIn") {
        if check_in <= ctx.created_at {
            out.push(violation(
                ID,
                Severity::Critical,
                "checkIn",
                "Check-in date must be in the future",
                0.98,
            ));
        } else if check_in < ctx.created_at + Duration::hours(24) {
            out.push(violation(
                ID,
                Severity::Major,
                "checkIn",
                "Check-in requires at least 24 hours notice",
                0.9,
            ));
        }
    }
    Ok(out)
}

fn stay_length(p: &Payload<'_>, _: &ValidationContext) -> RuleResult {
    const ID: &str = "booking.stay_length";
    let mut out = Vec::new();

    if let (Some(check_in), Some(check_out)) = (p.datetime("checkIn"), p.datetime("checkOut")) {
        let nights = (check_out - check_in).num_days();
        if check_out <= check_in {
            out.push(violation(
                ID,
                Severity::Critical,
                "checkOut",
                "Check-out date must be after check-in date",
                0.98,
            ));
        } else if nights > MAX_STAY_NIGHTS {
            out.push(violation(
                ID,
                Severity::Major,
                "checkOut",
                format!("Stay of {} nights exceeds maximum of {}", nights, MAX_STAY_NIGHTS),
                0.95,
            ));
        }
        return Ok(out);
    }

    if let Some(nights) = p.number("nights") {
        if nights < 1.0 || nights > MAX_STAY_NIGHTS as f64 {
            out.push(
                violation(
                    ID,
                    Severity::Major,
                    "nights",
                    format!(
                        "Stay length {} must be between 1 and {} nights",
                        nights, MAX_STAY_NIGHTS
                    ),
                    0.8,
                )
                .with_fix(clamp_int(nights, 1, MAX_STAY_NIGHTS)),
            );
        }
    }
    Ok(out)
}

fn guests_within_capacity(p: &Payload<'_>, _: &ValidationContext) -> RuleResult {
    const ID: &str = "booking.guests_within_capacity";
    let mut out = Vec::new();
    let Some(guests) = p.number("guests") else {
        return Ok(out);
    };
    if guests < 1.0 {
        out.push(
            violation(ID, Severity::Major, "guests", "A booking needs at least 1 guest", 0.9)
                .with_fix(1),
        );
    } else if let Some(max_guests) = p.number("maxGuests") {
        if guests > max_guests {
            out.push(violation(
                ID,
                Severity::Major,
                "guests",
                format!("{} guests exceeds the property capacity of {}", guests, max_guests),
                0.95,
            ));
        }
    }
    Ok(out)
}

fn minimum_stay(p: &Payload<'_>, _: &ValidationContext) -> RuleResult {
    let mut out = Vec::new();
    let Some(minimum) = p.number("minimumStay") else {
        return Ok(out);
    };
    let nights = match (p.datetime("checkIn"), p.datetime("checkOut")) {
        (Some(ci), Some(co)) if co > ci => Some((co - ci).num_days() as f64),
        _ => p.number("nights"),
    };
    if let Some(nights) = nights {
        if nights < minimum {
            out.push(violation(
                "booking.minimum_stay",
                Severity::Major,
                "nights",
                format!("Stay of {} nights is below the minimum stay of {}", nights, minimum),
                0.9,
            ));
        }
    }
    Ok(out)
}

// ============================================================================
// Pricing
// ============================================================================

fn cleaning_fee_ratio(p: &Payload<'_>, _: &ValidationContext) -> RuleResult {
    let mut out = Vec::new();
    let fee = pricing_component(p, "cleaningFee");
    if let (Some((field, fee)), Some((_, rate))) = (fee, nightly_rate(p)) {
        let cap = rate * MAX_CLEANING_FEE_RATIO;
        if rate > 0.0 && fee > cap {
            out.push(
                violation(
                    "pricing.cleaning_fee_ratio",
                    Severity::Major,
                    field,
                    format!("Cleaning fee {} exceeds 50% of the nightly rate ({})", fee, rate),
                    0.85,
                )
                .with_fix(money(cap)),
            );
        }
    }
    Ok(out)
}

fn security_deposit_cap(p: &Payload<'_>, _: &ValidationContext) -> RuleResult {
    const ID: &str = "pricing.security_deposit_cap";
    let mut out = Vec::new();
    if let Some((field, deposit)) = pricing_component(p, "securityDeposit") {
        if deposit > MAX_SECURITY_DEPOSIT {
            out.push(
                violation(
                    ID,
                    Severity::Major,
                    field,
                    format!(
                        "Security deposit {} exceeds maximum of {}",
                        deposit, MAX_SECURITY_DEPOSIT
                    ),
                    0.85,
                )
                .with_fix(money(MAX_SECURITY_DEPOSIT)),
            );
        } else if deposit < 0.0 {
            out.push(
                violation(ID, Severity::Major, field, "Security deposit cannot be negative", 0.9)
                    .with_fix(money(0.0)),
            );
        }
    }
    Ok(out)
}

fn non_negative_components(p: &Payload<'_>, _: &ValidationContext) -> RuleResult {
    Ok(["basePrice", "cleaningFee", "serviceFee", "taxes"]
        .iter()
        .filter_map(|key| pricing_component(p, key))
        .filter(|(_, value)| *value < 0.0)
        .map(|(field, value)| {
            violation(
                "pricing.non_negative_components",
                Severity::Critical,
                field.clone(),
                format!("Price component '{}' cannot be negative (got {})", field, value),
                0.99,
            )
        })
        .collect())
}

/// basePrice + cleaningFee + serviceFee + taxes, when a base price exists
pub fn recomputed_total(p: &Payload<'_>) -> Option<f64> {
    let (_, base) = pricing_component(p, "basePrice")?;
    let component = |key: &str| pricing_component(p, key).map(|(_, v)| v).unwrap_or(0.0);
    Some(round2(base + component("cleaningFee") + component("serviceFee") + component("taxes")))
}

fn total_matches_components(p: &Payload<'_>, _: &ValidationContext) -> RuleResult {
    let mut out = Vec::new();
    let total = pricing_component(p, "total");
    if let (Some((field, total)), Some(expected)) = (total, recomputed_total(p)) {
        if (total - expected).abs() > TOTAL_TOLERANCE {
            out.push(
                violation(
                    "pricing.total_matches_components",
                    Severity::Critical,
                    field,
                    format!(
                        "Total price {} does not match basePrice + cleaningFee + serviceFee \
                         + taxes = {}",
                        total, expected
                    ),
                    0.98,
                )
                .with_fix(money(expected)),
            );
        }
    }
    Ok(out)
}

fn service_fee_ratio(p: &Payload<'_>, _: &ValidationContext) -> RuleResult {
    let mut out = Vec::new();
    if let (Some((field, fee)), Some((_, base))) =
        (pricing_component(p, "serviceFee"), pricing_component(p, "basePrice"))
    {
        if base > 0.0 && fee > base * MAX_SERVICE_FEE_RATIO {
            out.push(violation(
                "pricing.service_fee_ratio",
                Severity::Minor,
                field,
                format!("Service fee {} is more than 20% of the base price {}", fee, base),
                0.7,
            ));
        }
    }
    Ok(out)
}

fn discount_range(p: &Payload<'_>, _: &ValidationContext) -> RuleResult {
    let mut out = Vec::new();
    if let Some((field, discount)) = pricing_component(p, "discountPercent") {
        if !(0.0..=100.0).contains(&discount) {
            out.push(
                violation(
                    "pricing.discount_range",
                    Severity::Major,
                    field,
                    format!("Discount {}% must be between 0 and 100", discount),
                    0.9,
                )
                .with_fix(clamp_num(discount, 0.0, 100.0)),
            );
        }
    }
    Ok(out)
}

// ============================================================================
// Policy
// ============================================================================

fn normalize_policy(raw: &str) -> String {
    raw.trim().to_ascii_lowercase().replace(['-', ' '], "_")
}

fn cancellation_policy(p: &Payload<'_>, _: &ValidationContext) -> RuleResult {
    const ID: &str = "policy.cancellation_policy";
    let mut out = Vec::new();
    let Some(value) = p.get("cancellationPolicy") else {
        return Ok(out);
    };
    let Some(policy) = value.as_str() else {
        out.push(violation(
            ID,
            Severity::Major,
            "cancellationPolicy",
            "Cancellation policy must be a string",
            0.95,
        ));
        return Ok(out);
    };
    if CANCELLATION_POLICIES.contains(&policy) {
        return Ok(out);
    }

    let normalized = normalize_policy(policy);
    let message = format!(
        "Unknown cancellation policy '{}' (expected one of: {})",
        policy,
        CANCELLATION_POLICIES.join(", ")
    );
    if CANCELLATION_POLICIES.contains(&normalized.as_str()) {
        out.push(
            violation(ID, Severity::Major, "cancellationPolicy", message, 0.97)
                .with_fix(normalized),
        );
    } else {
        out.push(violation(ID, Severity::Major, "cancellationPolicy", message, 0.95));
    }
    Ok(out)
}

fn check_times(p: &Payload<'_>, _: &ValidationContext) -> RuleResult {
    Ok(["checkInTime", "checkOutTime"]
        .iter()
        .filter_map(|field| p.str(field).map(|v| (*field, v)))
        .filter(|(_, value)| !is_clock_time(value))
        .map(|(field, value)| {
            violation(
                "policy.check_times",
                Severity::Minor,
                field,
                format!("'{}' is not a valid HH:MM time", value),
                0.85,
            )
        })
        .collect())
}

// ============================================================================
// Location
// ============================================================================

fn address_complete(p: &Payload<'_>, _: &ValidationContext) -> RuleResult {
    const ID: &str = "location.address_complete";
    let mut out = Vec::new();
    match p.get("address") {
        Some(Value::Object(address)) => {
            for component in ADDRESS_COMPONENTS {
                let present = address
                    .get(*component)
                    .and_then(Value::as_str)
                    .map(|s| !s.trim().is_empty())
                    .unwrap_or(false);
                if !present {
                    out.push(violation(
                        ID,
                        Severity::Major,
                        format!("address.{}", component),
                        format!("Address is missing '{}'", component),
                        0.9,
                    ));
                }
            }
        }
        Some(Value::String(_)) => out.push(violation(
            ID,
            Severity::Minor,
            "address",
            "Address should be structured (street, city, postalCode, country)",
            0.6,
        )),
        _ => {}
    }
    Ok(out)
}

/// Coordinates as (lat field, lat, lng field, lng), from any supported layout
pub fn coordinates(p: &Payload<'_>) -> Option<(String, f64, String, f64)> {
    const LAYOUTS: &[(&str, &str)] = &[
        ("coordinates.lat", "coordinates.lng"),
        ("coordinates.latitude", "coordinates.longitude"),
        ("location.lat", "location.lng"),
        ("location.latitude", "location.longitude"),
        ("latitude", "longitude"),
    ];
    LAYOUTS.iter().find_map(|(lat_path, lng_path)| {
        let lat = p.number(lat_path)?;
        let lng = p.number(lng_path)?;
        Some((lat_path.to_string(), lat, lng_path.to_string(), lng))
    })
}

fn coordinates_range(p: &Payload<'_>, _: &ValidationContext) -> RuleResult {
    const ID: &str = "location.coordinates_range";
    let mut out = Vec::new();
    if let Some((lat_field, lat, lng_field, lng)) = coordinates(p) {
        if !(-90.0..=90.0).contains(&lat) {
            out.push(violation(
                ID,
                Severity::Critical,
                lat_field,
                format!("Latitude {} is outside [-90, 90]", lat),
                0.99,
            ));
        }
        if !(-180.0..=180.0).contains(&lng) {
            out.push(violation(
                ID,
                Severity::Critical,
                lng_field,
                format!("Longitude {} is outside [-180, 180]", lng),
                0.99,
            ));
        }
    }
    Ok(out)
}

// ============================================================================
// Media
// ============================================================================

fn photo_count(p: &Payload<'_>, ctx: &ValidationContext) -> RuleResult {
    const ID: &str = "media.photo_count";
    let mut out = Vec::new();
    match p.get("photos") {
        Some(Value::Array(photos)) if photos.len() > 100 => out.push(violation(
            ID,
            Severity::Minor,
            "photos",
            format!("Listing has {} photos (maximum 100)", photos.len()),
            0.8,
        )),
        Some(Value::Array(photos))
            if photos.is_empty() && ctx.response_type == ResponseType::PropertyInfo =>
        {
            out.push(violation(ID, Severity::Minor, "photos", "Listing has no photos", 0.6))
        }
        Some(Value::Array(_)) | None => {}
        Some(_) => out.push(violation(ID, Severity::Minor, "photos", "Photos must be a list", 0.9)),
    }
    Ok(out)
}

fn photo_urls(p: &Payload<'_>, _: &ValidationContext) -> RuleResult {
    let mut out = Vec::new();
    let Some(Value::Array(photos)) = p.get("photos") else {
        return Ok(out);
    };
    for (idx, photo) in photos.iter().enumerate() {
        let (field, url) = match photo {
            Value::String(url) => (format!("photos.{}", idx), url.as_str()),
            Value::Object(obj) => match obj.get("url").and_then(Value::as_str) {
                Some(url) => (format!("photos.{}.url", idx), url),
                None => continue,
            },
            _ => continue,
        };
        if url.starts_with("https://") {
            continue;
        }
        let mut error = violation(
            "media.photo_urls",
            Severity::Minor,
            field,
            format!("Photo URL '{}' should use https", url),
            0.8,
        );
        if let Some(rest) = url.strip_prefix("http://") {
            error = error.with_fix(format!("https://{}", rest)).with_confidence(0.85);
        }
        out.push(error);
    }
    Ok(out)
}

// ============================================================================
// Reviews
// ============================================================================

fn rating_range(p: &Payload<'_>, _: &ValidationContext) -> RuleResult {
    let mut out = Vec::new();
    if let Some(rating) = p.number("rating") {
        if !(0.0..=5.0).contains(&rating) {
            out.push(
                violation(
                    "reviews.rating_range",
                    Severity::Major,
                    "rating",
                    format!("Rating {} must be between 0 and 5", rating),
                    0.9,
                )
                .with_fix(clamp_num(rating, 0.0, 5.0)),
            );
        }
    }
    Ok(out)
}

fn review_count(p: &Payload<'_>, _: &ValidationContext) -> RuleResult {
    let mut out = Vec::new();
    if let Some(count) = p.number("reviewCount") {
        if count < 0.0 {
            out.push(
                violation(
                    "reviews.review_count",
                    Severity::Major,
                    "reviewCount",
                    "Review count cannot be negative",
                    0.95,
                )
                .with_fix(0),
            );
        }
    }
    Ok(out)
}

// ============================================================================
// Host
// ============================================================================

fn contact_reachable(p: &Payload<'_>, _: &ValidationContext) -> RuleResult {
    let mut out = Vec::new();
    for group in CONTACT_GROUPS {
        let Some(contact) = p.object(group) else {
            continue;
        };
        let valid = |key: &str, pattern: FormatPattern| {
            contact
                .get(key)
                .and_then(Value::as_str)
                .map(|v| pattern.matches(v))
                .unwrap_or(false)
        };
        if !valid("email", FormatPattern::Email) && !valid("phone", FormatPattern::Phone) {
            out.push(violation(
                "host.contact_reachable",
                Severity::Major,
                *group,
                format!("'{}' has no valid email or phone number", group),
                0.85,
            ));
        }
    }
    Ok(out)
}

fn response_rate(p: &Payload<'_>, _: &ValidationContext) -> RuleResult {
    let mut out = Vec::new();
    if let Some((field, rate)) = p.first_number(&["host.responseRate", "responseRate"]) {
        if !(0.0..=100.0).contains(&rate) {
            out.push(
                violation(
                    "host.response_rate",
                    Severity::Major,
                    field,
                    format!("Response rate {}% must be between 0 and 100", rate),
                    0.9,
                )
                .with_fix(clamp_num(rate, 0.0, 100.0)),
            );
        }
    }
    Ok(out)
}
