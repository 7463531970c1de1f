//! External verification sources
//!
//! Each verifier covers one field group and is individually replaceable.
//! The built-in verifiers are deterministic and offline; networked sources
//! (geocoding, FX rates, weather) plug in behind the same trait.

use super::store::{country_record, season_for_month, CountryRecord};
use crate::error::{ValidatorError, ValidatorResult};
use crate::payload::Payload;
use crate::rules::business::coordinates;
use crate::types::{ErrorKind, Season, Severity, ValidationContext, ValidationError};
use async_trait::async_trait;
use chrono::Datelike;
use serde::Serialize;
use serde_json::{json, Value};

/// Group of related fields a verifier checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldGroup {
    Location,
    Currency,
    Season,
}

impl FieldGroup {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldGroup::Location => "location",
            FieldGroup::Currency => "currency",
            FieldGroup::Season => "season",
        }
    }

    /// True when the response carries the fields this group needs
    pub fn is_present(&self, payload: &Payload<'_>, context: &ValidationContext) -> bool {
        match self {
            FieldGroup::Location => {
                coordinates(payload).is_some() && claimed_country(payload).is_some()
            }
            FieldGroup::Currency => {
                claimed_currency(payload).is_some() && claimed_country(payload).is_some()
            }
            FieldGroup::Season => {
                claimed_season(payload, context).is_some() && payload.datetime("checkIn").is_some()
            }
        }
    }
}

/// Discrepancy between a claimed value and a reference value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FactConflict {
    pub field: String,
    pub claimed: Value,
    pub actual: Value,
    pub source: String,
    pub confidence: f64,
    pub message: String,
    /// `actual` is a drop-in replacement for `claimed`
    #[serde(skip)]
    pub correctable: bool,
}

impl FactConflict {
    /// Factual-layer error for this conflict
    pub fn to_error(&self) -> ValidationError {
        let mut error = ValidationError::new(
            ErrorKind::Factual,
            Severity::Major,
            self.field.as_str(),
            self.message.as_str(),
        )
        .with_confidence(self.confidence)
        .with_source(self.source.as_str());
        if self.correctable {
            error = error.with_fix(self.actual.clone());
        }
        error
    }
}

/// A claim a source confirmed
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedFact {
    pub field: String,
    pub value: Value,
    pub source: String,
    pub confidence: f64,
}

/// Output of one verifier
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifierReport {
    pub conflicts: Vec<FactConflict>,
    pub verified: Vec<VerifiedFact>,
}

/// Injectable verification source
#[async_trait]
pub trait ExternalVerifier: Send + Sync {
    fn name(&self) -> &str;

    fn field_group(&self) -> FieldGroup;

    async fn verify(
        &self,
        response: &Value,
        context: &ValidationContext,
    ) -> ValidatorResult<VerifierReport>;
}

/// Built-in reference verifiers
pub fn builtin_verifiers() -> Vec<std::sync::Arc<dyn ExternalVerifier>> {
    vec![
        std::sync::Arc::new(GeographicBoundsVerifier),
        std::sync::Arc::new(CurrencyVerifier),
        std::sync::Arc::new(SeasonVerifier),
    ]
}

// ============================================================================
// Claim extraction
// ============================================================================

/// (field path, raw value) of the claimed country
pub fn claimed_country<'a>(payload: &Payload<'a>) -> Option<(&'static str, &'a str)> {
    ["address.country", "country", "location.country"]
        .into_iter()
        .find_map(|path| payload.str(path).map(|v| (path, v)))
}

pub fn claimed_currency<'a>(payload: &Payload<'a>) -> Option<(&'static str, &'a str)> {
    ["pricing.currency", "currency"]
        .into_iter()
        .find_map(|path| payload.str(path).map(|v| (path, v)))
}

/// Season claimed by the response, else by the context
pub fn claimed_season(payload: &Payload<'_>, context: &ValidationContext) -> Option<Season> {
    payload.str("season").and_then(Season::parse).or(context.season)
}

fn resolve_country(
    payload: &Payload<'_>,
    verifier: &str,
) -> ValidatorResult<(&'static str, &'static CountryRecord)> {
    let (path, raw) = claimed_country(payload)
        .ok_or_else(|| ValidatorError::verifier(verifier, "no country in response"))?;
    let record = country_record(raw).ok_or_else(|| {
        ValidatorError::verifier(verifier, format!("no reference data for country '{}'", raw))
    })?;
    Ok((path, record))
}

// ============================================================================
// Geographic bounds
// ============================================================================

/// Checks that coordinates fall inside the claimed country
pub struct GeographicBoundsVerifier;

#[async_trait]
impl ExternalVerifier for GeographicBoundsVerifier {
    fn name(&self) -> &str {
        "geo_bounds"
    }

    fn field_group(&self) -> FieldGroup {
        FieldGroup::Location
    }

    async fn verify(
        &self,
        response: &Value,
        _context: &ValidationContext,
    ) -> ValidatorResult<VerifierReport> {
        let payload = Payload::new(response);
        let (country_path, country) = resolve_country(&payload, self.name())?;
        let (_, lat, _, lng) = coordinates(&payload)
            .ok_or_else(|| ValidatorError::verifier(self.name(), "no coordinates"))?;

        let mut report = VerifierReport::default();
        if country.contains(lat, lng) {
            report.verified.push(VerifiedFact {
                field: country_path.to_string(),
                value: json!(country.code),
                source: self.name().to_string(),
                confidence: 0.9,
            });
        } else {
            report.conflicts.push(FactConflict {
                field: country_path.to_string(),
                claimed: json!(country.name),
                actual: json!({"lat": lat, "lng": lng}),
                source: self.name().to_string(),
                confidence: 0.8,
                message: format!("Coordinates ({}, {}) are not inside {}", lat, lng, country.name),
                correctable: false,
            });
        }
        Ok(report)
    }
}

// ============================================================================
// Currency
// ============================================================================

/// Checks the quoted currency against the country's currency
pub struct CurrencyVerifier;

#[async_trait]
impl ExternalVerifier for CurrencyVerifier {
    fn name(&self) -> &str {
        "currency_reference"
    }

    fn field_group(&self) -> FieldGroup {
        FieldGroup::Currency
    }

    async fn verify(
        &self,
        response: &Value,
        _context: &ValidationContext,
    ) -> ValidatorResult<VerifierReport> {
        let payload = Payload::new(response);
        let (_, country) = resolve_country(&payload, self.name())?;
        let (path, currency) = claimed_currency(&payload)
            .ok_or_else(|| ValidatorError::verifier(self.name(), "no currency"))?;

        let mut report = VerifierReport::default();
        if currency.trim().eq_ignore_ascii_case(country.currency) {
            report.verified.push(VerifiedFact {
                field: path.to_string(),
                value: json!(country.currency),
                source: self.name().to_string(),
                confidence: 0.95,
            });
        } else {
            report.conflicts.push(FactConflict {
                field: path.to_string(),
                claimed: json!(currency),
                actual: json!(country.currency),
                source: self.name().to_string(),
                confidence: 0.85,
                message: format!(
                    "Currency {} does not match {} (expected {})",
                    currency, country.name, country.currency
                ),
                correctable: true,
            });
        }
        Ok(report)
    }
}

// ============================================================================
// Season
// ============================================================================

/// Checks the claimed season against the check-in month, hemisphere-aware
pub struct SeasonVerifier;

#[async_trait]
impl ExternalVerifier for SeasonVerifier {
    fn name(&self) -> &str {
        "season_calendar"
    }

    fn field_group(&self) -> FieldGroup {
        FieldGroup::Season
    }

    async fn verify(
        &self,
        response: &Value,
        context: &ValidationContext,
    ) -> ValidatorResult<VerifierReport> {
        let payload = Payload::new(response);
        let claimed = claimed_season(&payload, context)
            .ok_or_else(|| ValidatorError::verifier(self.name(), "no season"))?;
        let check_in = payload
            .datetime("checkIn")
            .ok_or_else(|| ValidatorError::verifier(self.name(), "no check-in date"))?;

        let southern = match coordinates(&payload) {
            Some((_, lat, _, _)) => lat < 0.0,
            None => claimed_country(&payload)
                .and_then(|(_, raw)| country_record(raw))
                .map(|c| c.is_southern())
                .unwrap_or(false),
        };
        let northern = season_for_month(check_in.month());
        let expected = if southern { northern.opposite() } else { northern };

        let mut report = VerifierReport::default();
        if claimed == expected {
            report.verified.push(VerifiedFact {
                field: "season".to_string(),
                value: json!(expected.as_str()),
                source: self.name().to_string(),
                confidence: 0.9,
            });
        } else {
            report.conflicts.push(FactConflict {
                field: "season".to_string(),
                claimed: json!(claimed.as_str()),
                actual: json!(expected.as_str()),
                source: self.name().to_string(),
                confidence: 0.75,
                message: format!(
                    "Check-in on {} falls in {}, not {}",
                    check_in.format("%Y-%m-%d"),
                    expected.as_str(),
                    claimed.as_str()
                ),
                correctable: payload.has("season"),
            });
        }
        Ok(report)
    }
}
