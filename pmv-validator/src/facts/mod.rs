//! Fact store
//!
//! Curated fact checks plus cross-checks against pluggable external
//! verifiers. Unknown values are reported as "unusual" (low severity, low
//! confidence), never as hard failures.

pub mod store;
pub mod verifiers;

pub use store::{Fact, FactDatabase};
pub use verifiers::{
    builtin_verifiers, ExternalVerifier, FactConflict, FieldGroup, VerifiedFact, VerifierReport,
};

use crate::error::ValidatorError;
use crate::payload::Payload;
use crate::rules::business::nightly_rate;
use crate::types::{ErrorKind, Findings, Severity, ValidationContext, ValidationError};
use chrono::Datelike;
use futures::future::join_all;
use futures::FutureExt;
use serde::Serialize;
use serde_json::Value;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Default per-verifier timeout
pub const DEFAULT_VERIFIER_TIMEOUT_MS: u64 = 3000;
pub const MIN_VERIFIER_TIMEOUT_MS: u64 = 2000;
pub const MAX_VERIFIER_TIMEOUT_MS: u64 = 5000;

/// Confidence before any conflict is counted
const BASE_EXTERNAL_CONFIDENCE: f64 = 0.9;
const CONFLICT_PENALTY: f64 = 0.1;
const MIN_EXTERNAL_CONFIDENCE: f64 = 0.3;

/// Confidence attached to "unknown value" findings
const UNUSUAL_CONFIDENCE: f64 = 0.5;

/// Aggregate result of external verification
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalVerification {
    pub conflicts: Vec<FactConflict>,
    pub verified_facts: Vec<VerifiedFact>,
    /// Verifiers that answered
    pub sources_used: Vec<String>,
    /// Verifiers that were invoked (answered, failed or timed out)
    pub sources_attempted: usize,
    /// Why each skipped verifier contributed nothing
    pub failures: Vec<String>,
    pub confidence: f64,
}

impl ExternalVerification {
    /// Nothing applicable was checked
    pub fn empty() -> Self {
        Self {
            conflicts: Vec::new(),
            verified_facts: Vec::new(),
            sources_used: Vec::new(),
            sources_attempted: 0,
            failures: Vec::new(),
            confidence: 1.0,
        }
    }

    /// Share of invoked verifiers that answered (1.0 when none were invoked)
    pub fn reliability(&self) -> f64 {
        if self.sources_attempted == 0 {
            1.0
        } else {
            self.sources_used.len() as f64 / self.sources_attempted as f64
        }
    }

    pub fn conflict_errors(&self) -> Vec<ValidationError> {
        self.conflicts.iter().map(FactConflict::to_error).collect()
    }
}

/// max(0.3, 0.9 - 0.1 * conflicts)
pub fn external_confidence(conflicts: usize) -> f64 {
    (BASE_EXTERNAL_CONFIDENCE - CONFLICT_PENALTY * conflicts as f64).max(MIN_EXTERNAL_CONFIDENCE)
}

pub struct FactStore {
    facts: FactDatabase,
    verifiers: Vec<Arc<dyn ExternalVerifier>>,
    timeout: Duration,
}

impl Default for FactStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FactStore {
    /// Curated facts with the built-in verifiers
    pub fn new() -> Self {
        Self {
            facts: FactDatabase::curated(),
            verifiers: builtin_verifiers(),
            timeout: Duration::from_millis(DEFAULT_VERIFIER_TIMEOUT_MS),
        }
    }

    /// Replace the verifier set
    pub fn with_verifiers(mut self, verifiers: Vec<Arc<dyn ExternalVerifier>>) -> Self {
        self.verifiers = verifiers;
        self
    }

    /// Per-verifier timeout, clamped into 2-5 seconds
    pub fn with_timeout_ms(mut self, millis: u64) -> Self {
        let millis = millis.clamp(MIN_VERIFIER_TIMEOUT_MS, MAX_VERIFIER_TIMEOUT_MS);
        self.timeout = pmv_common::time::millis_to_duration(millis);
        self
    }

    pub fn register_verifier(&mut self, verifier: Arc<dyn ExternalVerifier>) {
        self.verifiers.push(verifier);
    }

    pub fn facts(&self) -> &FactDatabase {
        &self.facts
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn verifier_names(&self) -> Vec<String> {
        self.verifiers.iter().map(|v| v.name().to_string()).collect()
    }

    // ========================================================================
    // Curated fact checks
    // ========================================================================

    pub fn validate_facts(&self, payload: &Payload<'_>, context: &ValidationContext) -> Findings {
        let mut findings = Findings::default();
        self.check_price_bounds(payload, &mut findings);
        self.check_property_type(payload, context, &mut findings);
        self.check_location(payload, &mut findings);
        self.check_seasonal_multiplier(payload, context, &mut findings);
        self.check_amenities(payload, &mut findings);
        self.check_occupancy(payload, &mut findings);
        self.check_city_rate(payload, &mut findings);
        findings
    }

    fn unusual(
        field: impl Into<String>,
        message: impl Into<String>,
        source: &str,
    ) -> ValidationError {
        ValidationError::new(ErrorKind::Factual, Severity::Minor, field, message)
            .with_confidence(UNUSUAL_CONFIDENCE)
            .with_source(source)
    }

    fn check_price_bounds(&self, payload: &Payload<'_>, findings: &mut Findings) {
        let Some((field, rate)) = nightly_rate(payload) else {
            return;
        };
        findings.rules_applied += 1;
        let fact = &self.facts.price_bounds;
        let (min, max) = fact.value;
        // Non-positive prices are a business-rule violation, not a fact question
        if rate > 0.0 && (rate < min || rate > max) {
            findings.error(
                ValidationError::new(
                    ErrorKind::Factual,
                    Severity::Minor,
                    field,
                    format!(
                        "Nightly rate {} is outside the observed market range {}-{}",
                        rate, min, max
                    ),
                )
                .with_confidence(0.6_f64.min(fact.confidence))
                .with_source(fact.source.as_str()),
            );
        }
    }

    fn check_property_type(
        &self,
        payload: &Payload<'_>,
        context: &ValidationContext,
        findings: &mut Findings,
    ) {
        let (field, kind) = match payload.str("propertyType") {
            Some(kind) => ("propertyType", kind),
            None => match context.property_type.as_deref() {
                Some(kind) => ("context.propertyType", kind),
                None => return,
            },
        };
        findings.rules_applied += 1;
        if !self.facts.is_known_property_type(kind) {
            findings.error(Self::unusual(
                field,
                format!("Unusual property type '{}'", kind),
                &self.facts.property_types.source,
            ));
        }
    }

    fn check_location(&self, payload: &Payload<'_>, findings: &mut Findings) {
        let country = verifiers::claimed_country(payload);
        if let Some((path, raw)) = country {
            findings.rules_applied += 1;
            if store::country_record(raw).is_none() {
                let message = format!("Unrecognised country '{}'", raw);
                findings.error(Self::unusual(path, message, "geo_reference"));
            }
        }

        let city = ["address.city", "city", "location.city"]
            .into_iter()
            .find_map(|path| payload.str(path).map(|v| (path, v)));
        let Some((city_path, city)) = city else {
            return;
        };
        findings.rules_applied += 1;
        match self.facts.city_country(city) {
            None => findings.error(Self::unusual(
                city_path,
                format!("Unrecognised city '{}'", city),
                &self.facts.cities.source,
            )),
            Some(code) => {
                let claimed = country.and_then(|(_, raw)| store::country_record(raw));
                if let Some(claimed) = claimed {
                    if claimed.code != code {
                        findings.error(
                            ValidationError::new(
                                ErrorKind::Factual,
                                Severity::Major,
                                city_path,
                                format!("{} is not in {}", city, claimed.name),
                            )
                            .with_confidence(0.8)
                            .with_source(self.facts.cities.source.as_str()),
                        );
                    }
                }
            }
        }
    }

    fn check_seasonal_multiplier(
        &self,
        payload: &Payload<'_>,
        context: &ValidationContext,
        findings: &mut Findings,
    ) {
        let paths = ["pricing.seasonalMultiplier", "seasonalMultiplier"];
        let Some(multiplier) = payload.first_number(&paths) else {
            return;
        };
        let season = verifiers::claimed_season(payload, context).or_else(|| {
            payload
                .datetime("checkIn")
                .map(|d| store::season_for_month(d.month()))
        });
        let Some(profile) = season.and_then(|s| self.facts.season_profile(s)) else {
            return;
        };
        findings.rules_applied += 1;
        let (field, value) = multiplier;
        if value < profile.min_multiplier || value > profile.max_multiplier {
            findings.error(
                ValidationError::new(
                    ErrorKind::Factual,
                    Severity::Minor,
                    field,
                    format!(
                        "Seasonal multiplier {} is outside the usual {}-{} range",
                        value, profile.min_multiplier, profile.max_multiplier
                    ),
                )
                .with_confidence(0.6)
                .with_source(self.facts.seasons.source.as_str()),
            );
        }
    }

    fn check_amenities(&self, payload: &Payload<'_>, findings: &mut Findings) {
        for (idx, amenity) in payload.string_list("amenities").into_iter().enumerate() {
            findings.rules_applied += 1;
            if !self.facts.is_known_amenity(amenity) {
                findings.error(Self::unusual(
                    format!("amenities.{}", idx),
                    format!("Unrecognised amenity '{}'", amenity),
                    &self.facts.amenities.source,
                ));
            }
        }
    }

    fn check_occupancy(&self, payload: &Payload<'_>, findings: &mut Findings) {
        let max_guests = payload.number("maxGuests");
        let (Some(max_guests), Some(bedrooms)) = (max_guests, payload.number("bedrooms")) else {
            return;
        };
        findings.rules_applied += 1;
        let fact = &self.facts.occupancy;
        let limit = fact.value.limit(bedrooms);
        if max_guests > limit {
            findings.error(
                ValidationError::new(
                    ErrorKind::Factual,
                    Severity::Major,
                    "maxGuests",
                    format!(
                        "{} guests exceeds the occupancy limit of {} for {} bedroom(s)",
                        max_guests, limit, bedrooms
                    ),
                )
                .with_confidence(0.8)
                .with_source(fact.source.as_str()),
            );
        }
    }

    fn check_city_rate(&self, payload: &Payload<'_>, findings: &mut Findings) {
        let city = ["address.city", "city", "location.city"]
            .into_iter()
            .find_map(|path| payload.str(path));
        let (Some(city), Some((field, rate))) = (city, nightly_rate(payload)) else {
            return;
        };
        let Some((min, max)) = self.facts.city_rate(city) else {
            return;
        };
        findings.rules_applied += 1;
        if rate > 0.0 && (rate < min || rate > max) {
            findings.error(
                ValidationError::new(
                    ErrorKind::Factual,
                    Severity::Minor,
                    field,
                    format!(
                        "Nightly rate {} is unusual for {} (typical {}-{})",
                        rate, city, min, max
                    ),
                )
                .with_confidence(0.6)
                .with_source(self.facts.city_rates.source.as_str()),
            );
        }
    }

    // ========================================================================
    // External verification
    // ========================================================================

    /// Run every applicable verifier concurrently, each under its own timeout
    ///
    /// Verifier errors and timeouts are logged and contribute nothing.
    pub async fn verify_with_external_sources(
        &self,
        response: &Value,
        context: &ValidationContext,
    ) -> ExternalVerification {
        let payload = Payload::new(response);
        let applicable: Vec<_> = self
            .verifiers
            .iter()
            .filter(|v| v.field_group().is_present(&payload, context))
            .collect();

        if applicable.is_empty() {
            return ExternalVerification::empty();
        }

        let timeout = self.timeout;
        let calls = applicable.iter().map(|verifier| async move {
            let call = AssertUnwindSafe(verifier.verify(response, context)).catch_unwind();
            let outcome = match tokio::time::timeout(timeout, call).await {
                Ok(Ok(answer)) => answer,
                Ok(Err(panic)) => Err(ValidatorError::verifier(
                    verifier.name(),
                    format!("panicked: {}", panic_text(panic.as_ref())),
                )),
                Err(_) => Err(ValidatorError::Timeout {
                    verifier: verifier.name().to_string(),
                    after_ms: timeout.as_millis() as u64,
                }),
            };
            (verifier.name().to_string(), outcome)
        });
        let outcomes = join_all(calls).await;

        let mut result = ExternalVerification::empty();
        result.sources_attempted = applicable.len();
        for (name, outcome) in outcomes {
            match outcome {
                Ok(report) => {
                    result.conflicts.extend(report.conflicts);
                    result.verified_facts.extend(report.verified);
                    result.sources_used.push(name);
                }
                Err(e) => {
                    warn!(
                        verifier = %name,
                        request_id = %context.request_id,
                        error = %e,
                        "Verifier skipped"
                    );
                    result.failures.push(e.to_string());
                }
            }
        }

        result.confidence = if result.sources_used.is_empty() {
            // Nothing answered: no evidence either way
            1.0
        } else {
            external_confidence(result.conflicts.len())
        };

        debug!(
            request_id = %context.request_id,
            sources = ?result.sources_used,
            conflicts = result.conflicts.len(),
            confidence = result.confidence,
            "External verification complete"
        );
        result
    }
}

fn panic_text(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}
