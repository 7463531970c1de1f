//! Data-type and format checks (syntax layer)
//!
//! - Required fields per response type → `critical` when missing
//! - Type mismatches on known numeric/integer/boolean fields → `major`
//! - Regex format checks on every string field whose name implies a pattern

use super::patterns::FormatPattern;
use crate::payload::{leaf_name, parse_datetime, Payload};
use crate::types::{ErrorKind, Findings, ResponseType, Severity, ValidationContext, ValidationError};
use serde_json::Value;

/// Expected JSON type of a known field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectedType {
    Number,
    Integer,
    Boolean,
}

impl ExpectedType {
    fn name(&self) -> &'static str {
        match self {
            ExpectedType::Number => "number",
            ExpectedType::Integer => "integer",
            ExpectedType::Boolean => "boolean",
        }
    }
}

const NUMBER_FIELDS: &[&str] = &[
    "price",
    "pricePerNight",
    "nightlyRate",
    "basePrice",
    "cleaningFee",
    "serviceFee",
    "taxes",
    "total",
    "securityDeposit",
    "bathrooms",
    "rating",
    "latitude",
    "longitude",
    "lat",
    "lng",
    "responseRate",
    "discountPercent",
    "seasonalMultiplier",
];

const INTEGER_FIELDS: &[&str] = &[
    "maxGuests",
    "guests",
    "adults",
    "children",
    "bedrooms",
    "beds",
    "nights",
    "minimumStay",
    "reviewCount",
];

const BOOLEAN_FIELDS: &[&str] = &["available", "instantBook", "smokingAllowed", "isSuperhost"];

const DATE_FIELDS: &[&str] = &["checkIn", "checkOut"];

/// Fields that must be present for a response type
pub fn required_fields(response_type: ResponseType) -> &'static [&'static str] {
    match response_type {
        ResponseType::PropertyInfo => &["name", "propertyType"],
        ResponseType::BookingResponse => &["checkIn", "checkOut", "guests"],
        ResponseType::Pricing => &["basePrice", "cleaningFee", "serviceFee", "total"],
        ResponseType::Availability => &["available"],
        ResponseType::HostInfo => &["name"],
        ResponseType::Review => &["rating"],
        ResponseType::General => &[],
    }
}

/// Expected type for a field leaf name
pub fn expected_type(leaf: &str) -> Option<ExpectedType> {
    if NUMBER_FIELDS.contains(&leaf) {
        Some(ExpectedType::Number)
    } else if INTEGER_FIELDS.contains(&leaf) {
        Some(ExpectedType::Integer)
    } else if BOOLEAN_FIELDS.contains(&leaf) {
        Some(ExpectedType::Boolean)
    } else {
        None
    }
}

/// Required-field presence and type checks
pub fn validate_data_types(payload: &Payload<'_>, context: &ValidationContext) -> Findings {
    let mut findings = Findings::default();

    for field in required_fields(context.response_type) {
        findings.rules_applied += 1;
        let nested = format!("pricing.{}", field);
        if !payload.has(field) && !payload.has(&nested) {
            findings.error(
                ValidationError::new(
                    ErrorKind::Syntax,
                    Severity::Critical,
                    *field,
                    format!(
                        "Missing required field '{}' for {} response",
                        field,
                        context.response_type.as_str()
                    ),
                )
                .with_confidence(0.95)
                .with_source("required_fields"),
            );
        }
    }

    for (path, value) in payload.leaves() {
        let Some(expected) = expected_type(leaf_name(&path)) else {
            continue;
        };
        if value.is_null() {
            continue;
        }
        findings.rules_applied += 1;
        if let Some(error) = check_type(&path, value, expected) {
            findings.error(error);
        }
    }

    findings
}

fn check_type(path: &str, value: &Value, expected: ExpectedType) -> Option<ValidationError> {
    let mismatch = |fix: Option<Value>, confidence: f64| {
        let mut error = ValidationError::new(
            ErrorKind::Syntax,
            Severity::Major,
            path,
            format!("Field '{}' should be a {}, got {}", path, expected.name(), type_name(value)),
        )
        .with_confidence(confidence)
        .with_source("data_type");
        if let Some(fix) = fix {
            error = error.with_fix(fix);
        }
        Some(error)
    };

    match expected {
        ExpectedType::Number => match value {
            Value::Number(_) => None,
            Value::String(s) => match s.trim().parse::<f64>() {
                Ok(n) if n.is_finite() => {
                    mismatch(serde_json::Number::from_f64(n).map(Value::Number), 0.9)
                }
                _ => mismatch(None, 0.95),
            },
            _ => mismatch(None, 0.95),
        },
        ExpectedType::Integer => match value {
            Value::Number(n) if n.is_i64() || n.is_u64() => None,
            Value::Number(n) => {
                let f = n.as_f64().unwrap_or_default();
                if f.fract() == 0.0 {
                    None
                } else {
                    mismatch(Some(Value::from(f.round() as i64)), 0.85)
                }
            }
            Value::String(s) => match s.trim().parse::<i64>() {
                Ok(n) => mismatch(Some(Value::from(n)), 0.9),
                Err(_) => mismatch(None, 0.95),
            },
            _ => mismatch(None, 0.95),
        },
        ExpectedType::Boolean => match value {
            Value::Bool(_) => None,
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" => mismatch(Some(Value::Bool(true)), 0.9),
                "false" | "no" => mismatch(Some(Value::Bool(false)), 0.9),
                _ => mismatch(None, 0.95),
            },
            _ => mismatch(None, 0.95),
        },
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Regex format checks over every string field, plus date parsing
pub fn validate_formats(payload: &Payload<'_>, _context: &ValidationContext) -> Findings {
    let mut findings = Findings::default();

    for (path, value) in payload.string_fields() {
        let leaf = leaf_name(&path);

        if DATE_FIELDS.contains(&leaf) {
            findings.rules_applied += 1;
            if parse_datetime(value).is_none() {
                findings.error(
                    ValidationError::new(
                        ErrorKind::Syntax,
                        Severity::Major,
                        path.as_str(),
                        format!("Unparseable date '{}' (expected YYYY-MM-DD)", value),
                    )
                    .with_confidence(0.95)
                    .with_source("format:date"),
                );
            }
            continue;
        }

        let Some(pattern) = FormatPattern::for_field(leaf) else {
            continue;
        };
        findings.rules_applied += 1;
        if pattern.matches(value) {
            continue;
        }

        let severity = match pattern {
            FormatPattern::Email | FormatPattern::Phone => Severity::Major,
            _ => Severity::Minor,
        };
        let mut error = ValidationError::new(
            ErrorKind::Syntax,
            severity,
            path.as_str(),
            format!("Invalid {} format: '{}'", pattern.name(), value),
        )
        .with_confidence(0.9)
        .with_source(format!("format:{}", pattern.name()));

        // Lower-case currency codes are unambiguous
        if pattern == FormatPattern::Currency {
            let upper = value.trim().to_ascii_uppercase();
            if pattern.matches(&upper) {
                error = error.with_fix(upper).with_confidence(0.97);
            }
        }
        findings.error(error);
    }

    findings
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx(rt: ResponseType) -> ValidationContext {
        ValidationContext::new("req", "sess", rt)
    }

    #[test]
    fn test_missing_required_fields_are_critical() {
        let doc = json!({"basePrice": 100, "pricing": {"total": 150}});
        let findings = validate_data_types(&Payload::new(&doc), &ctx(ResponseType::Pricing));
        let fields: Vec<_> = findings.errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["cleaningFee", "serviceFee"]);
        assert!(findings.errors.iter().all(|e| e.severity == Severity::Critical));
    }

    #[test]
    fn test_type_mismatch_with_parsable_string_suggests_fix() {
        let doc = json!({"maxGuests": "4", "available": "yes", "price": "abc"});
        let findings = validate_data_types(&Payload::new(&doc), &ctx(ResponseType::General));
        let guests = findings.errors.iter().find(|e| e.field == "maxGuests").unwrap();
        assert_eq!(guests.severity, Severity::Major);
        assert_eq!(guests.suggested_fix, Some(json!(4)));
        let available = findings.errors.iter().find(|e| e.field == "available").unwrap();
        assert_eq!(available.suggested_fix, Some(json!(true)));
        let price = findings.errors.iter().find(|e| e.field == "price").unwrap();
        assert!(price.suggested_fix.is_none());
    }

    #[test]
    fn test_whole_float_counts_as_integer() {
        let doc = json!({"guests": 3.0, "bedrooms": 2.5});
        let findings = validate_data_types(&Payload::new(&doc), &ctx(ResponseType::General));
        assert_eq!(findings.errors.len(), 1);
        assert_eq!(findings.errors[0].field, "bedrooms");
        assert_eq!(findings.errors[0].suggested_fix, Some(json!(3)));
    }

    #[test]
    fn test_formats_apply_recursively() {
        let doc = json!({
            "host": {"email": "nobody", "phone": "+33 6 12 34 56 78"},
            "address": {"postalCode": "!!"},
            "pricing": {"currency": "eur"},
            "checkIn": "next tuesday"
        });
        let findings = validate_formats(&Payload::new(&doc), &ctx(ResponseType::General));
        let email = findings.errors.iter().find(|e| e.field == "host.email").unwrap();
        assert_eq!(email.severity, Severity::Major);
        assert!(findings.errors.iter().all(|e| e.field != "host.phone"));
        assert!(findings.errors.iter().any(|e| e.field == "address.postalCode"));
        let currency = findings.errors.iter().find(|e| e.field == "pricing.currency").unwrap();
        assert_eq!(currency.suggested_fix, Some(json!("EUR")));
        assert!(findings.errors.iter().any(|e| e.field == "checkIn"));
        assert_eq!(findings.rules_applied, 5);
    }
}
