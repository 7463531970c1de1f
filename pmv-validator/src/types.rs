//! Core types for the validation pipeline
//!
//! Defines the request side (context, options), the finding types produced by
//! the five layers (errors, warnings), and the result side (corrections, audit
//! entries, the final `ValidationResult`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

// ============================================================================
// Request Types
// ============================================================================

/// Declared kind of AI response being validated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseType {
    PropertyInfo,
    BookingResponse,
    Pricing,
    Availability,
    HostInfo,
    Review,
    #[serde(other)]
    General,
}

impl ResponseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseType::PropertyInfo => "property_info",
            ResponseType::BookingResponse => "booking_response",
            ResponseType::Pricing => "pricing",
            ResponseType::Availability => "availability",
            ResponseType::HostInfo => "host_info",
            ResponseType::Review => "review",
            ResponseType::General => "general",
        }
    }
}

/// Domain tag of the request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    PropertyManagement,
    #[serde(other)]
    General,
}

/// Role of the user the response is addressed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Admin,
    Manager,
    Owner,
    Guest,
}

/// Calendar season (northern-hemisphere naming)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Season {
    Spring,
    Summer,
    Autumn,
    Winter,
}

impl Season {
    pub fn as_str(&self) -> &'static str {
        match self {
            Season::Spring => "spring",
            Season::Summer => "summer",
            Season::Autumn => "autumn",
            Season::Winter => "winter",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "spring" => Some(Season::Spring),
            "summer" => Some(Season::Summer),
            "autumn" | "fall" => Some(Season::Autumn),
            "winter" => Some(Season::Winter),
            _ => None,
        }
    }

    /// The season six months away (used for southern-hemisphere flips)
    pub fn opposite(&self) -> Self {
        match self {
            Season::Spring => Season::Autumn,
            Season::Summer => Season::Winter,
            Season::Autumn => Season::Spring,
            Season::Winter => Season::Summer,
        }
    }
}

/// Identifies one validation request
///
/// Immutable once created; the pipeline only ever borrows it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationContext {
    pub request_id: String,
    pub session_id: String,
    pub response_type: ResponseType,
    pub domain: Domain,
    #[serde(default)]
    pub user_role: Option<UserRole>,
    #[serde(default)]
    pub property_type: Option<String>,
    #[serde(default)]
    pub season: Option<Season>,
    /// Creation time; also the reference "now" for date rules
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl ValidationContext {
    pub fn new(
        request_id: impl Into<String>,
        session_id: impl Into<String>,
        response_type: ResponseType,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            session_id: session_id.into(),
            response_type,
            domain: Domain::PropertyManagement,
            user_role: None,
            property_type: None,
            season: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_domain(mut self, domain: Domain) -> Self {
        self.domain = domain;
        self
    }

    pub fn with_role(mut self, role: UserRole) -> Self {
        self.user_role = Some(role);
        self
    }

    pub fn with_property_type(mut self, property_type: impl Into<String>) -> Self {
        self.property_type = Some(property_type.into());
        self
    }

    pub fn with_season(mut self, season: Season) -> Self {
        self.season = Some(season);
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }
}

/// Per-call configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ValidationOptions {
    /// Allow high-confidence corrections to be written back into the response
    pub auto_correct: bool,
    /// Minimum confidence to accept; below it a warning is attached
    pub min_confidence: f64,
    /// Layers not to run for this call
    pub skip_layers: HashSet<LayerKind>,
    /// Push the result to real-time subscribers
    pub realtime: bool,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            auto_correct: true,
            min_confidence: 0.7,
            skip_layers: HashSet::new(),
            realtime: true,
        }
    }
}

// ============================================================================
// Findings
// ============================================================================

/// The five validation layers, in pipeline order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerKind {
    Syntax,
    Semantic,
    Business,
    Factual,
    Consistency,
}

impl LayerKind {
    pub const ALL: [LayerKind; 5] = [
        LayerKind::Syntax,
        LayerKind::Semantic,
        LayerKind::Business,
        LayerKind::Factual,
        LayerKind::Consistency,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LayerKind::Syntax => "syntax",
            LayerKind::Semantic => "semantic",
            LayerKind::Business => "business",
            LayerKind::Factual => "factual",
            LayerKind::Consistency => "consistency",
        }
    }

    /// Error kind emitted by this layer
    pub fn error_kind(&self) -> ErrorKind {
        match self {
            LayerKind::Syntax => ErrorKind::Syntax,
            LayerKind::Semantic => ErrorKind::Semantic,
            LayerKind::Business => ErrorKind::Business,
            LayerKind::Factual => ErrorKind::Factual,
            LayerKind::Consistency => ErrorKind::Consistency,
        }
    }
}

/// Category of a validation error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Syntax,
    Semantic,
    Business,
    Factual,
    Consistency,
    /// Pipeline failure, only ever produced by the orchestrator
    System,
}

/// Error severity; any `Critical` error makes the response invalid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Minor,
    Major,
    Critical,
}

impl Severity {
    /// Weight used when folding errors into a layer confidence
    pub fn weight(&self) -> f64 {
        match self {
            Severity::Critical => 1.0,
            Severity::Major => 0.7,
            Severity::Minor => 0.3,
        }
    }
}

/// One defect found in the response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationError {
    #[serde(rename = "type")]
    pub kind: ErrorKind,
    pub severity: Severity,
    /// Dotted field path
    pub field: String,
    pub message: String,
    pub suggested_fix: Option<Value>,
    /// Confidence that this error is real (0.0-1.0)
    pub confidence: f64,
    /// Rule or source that produced the error
    pub source: String,
}

impl ValidationError {
    pub fn new(
        kind: ErrorKind,
        severity: Severity,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            severity,
            field: field.into(),
            message: message.into(),
            suggested_fix: None,
            confidence: 0.9,
            source: String::new(),
        }
    }

    pub fn with_fix(mut self, fix: impl Into<Value>) -> Self {
        self.suggested_fix = Some(fix.into());
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn is_critical(&self) -> bool {
        self.severity == Severity::Critical
    }
}

/// Warning category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    PotentialIssue,
    BestPractice,
    Performance,
}

/// Warning impact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Impact {
    Low,
    Medium,
    High,
}

/// Non-blocking observation; never affects validity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationWarning {
    #[serde(rename = "type")]
    pub kind: WarningKind,
    pub field: String,
    pub message: String,
    pub impact: Impact,
}

impl ValidationWarning {
    pub fn new(
        kind: WarningKind,
        field: impl Into<String>,
        message: impl Into<String>,
        impact: Impact,
    ) -> Self {
        Self {
            kind,
            field: field.into(),
            message: message.into(),
            impact,
        }
    }
}

/// Errors and warnings produced by one check family
#[derive(Debug, Clone, Default)]
pub struct Findings {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
    /// Number of checks that were evaluated
    pub rules_applied: usize,
}

impl Findings {
    pub fn error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn warn(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }

    pub fn merge(&mut self, other: Findings) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
        self.rules_applied += other.rules_applied;
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty() && self.warnings.is_empty()
    }
}

// ============================================================================
// Result Types
// ============================================================================

/// Proposed replacement for a flagged field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationCorrection {
    pub field: String,
    pub original_value: Value,
    pub corrected_value: Value,
    pub confidence: f64,
    pub reason: String,
    /// True only when the correction was written back into the response
    pub auto_applied: bool,
}

/// One pipeline stage's record in the audit trail
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub layer: String,
    pub output: Value,
    pub confidence: f64,
    pub source: String,
}

impl AuditEntry {
    pub fn new(
        layer: impl Into<String>,
        output: Value,
        confidence: f64,
        source: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            layer: layer.into(),
            output,
            confidence,
            source: source.into(),
        }
    }
}

/// Summary data attached to every result
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationMetadata {
    pub request_id: String,
    pub session_id: String,
    /// Completion time; also the key for later feedback
    pub timestamp: DateTime<Utc>,
    pub processing_time_ms: f64,
    pub layers_run: Vec<LayerKind>,
    pub sources_consulted: Vec<String>,
    pub rule_count: usize,
    pub confidence: f64,
}

/// Outcome of one validation call
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub is_valid: bool,
    pub confidence: f64,
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
    pub corrections: Vec<ValidationCorrection>,
    pub metadata: ValidationMetadata,
    pub audit_trail: Vec<AuditEntry>,
}

impl ValidationResult {
    pub fn critical_count(&self) -> usize {
        self.errors.iter().filter(|e| e.is_critical()).count()
    }

    pub fn auto_applied_count(&self) -> usize {
        self.corrections.iter().filter(|c| c.auto_applied).count()
    }

    pub fn errors_for(&self, field: &str) -> impl Iterator<Item = &ValidationError> {
        let field = field.to_string();
        self.errors.iter().filter(move |e| e.field == field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unknown_response_type_maps_to_general() {
        let rt: ResponseType = serde_json::from_value(json!("weather_report")).unwrap();
        assert_eq!(rt, ResponseType::General);
        let rt: ResponseType = serde_json::from_value(json!("booking_response")).unwrap();
        assert_eq!(rt, ResponseType::BookingResponse);
    }

    #[test]
    fn test_context_deserializes_with_defaults() {
        let ctx: ValidationContext = serde_json::from_value(json!({
            "requestId": "r1",
            "sessionId": "s1",
            "responseType": "pricing",
            "domain": "property_management"
        }))
        .unwrap();
        assert_eq!(ctx.response_type, ResponseType::Pricing);
        assert!(ctx.user_role.is_none());
    }

    #[test]
    fn test_options_defaults() {
        let opts = ValidationOptions::default();
        assert!(opts.auto_correct);
        assert!(opts.realtime);
        assert_eq!(opts.min_confidence, 0.7);
        assert!(opts.skip_layers.is_empty());

        let parsed: ValidationOptions =
            serde_json::from_value(json!({"skipLayers": ["factual"]})).unwrap();
        assert!(parsed.skip_layers.contains(&LayerKind::Factual));
        assert!(parsed.auto_correct);
    }

    #[test]
    fn test_error_serializes_type_field() {
        let err = ValidationError::new(ErrorKind::Business, Severity::Critical, "price", "bad")
            .with_confidence(1.7);
        assert_eq!(err.confidence, 1.0);
        let value = serde_json::to_value(&err).unwrap();
        assert_eq!(value["type"], "business");
        assert_eq!(value["severity"], "critical");
        assert!(value["suggestedFix"].is_null());
    }

    #[test]
    fn test_severity_weights_and_order() {
        assert_eq!(Severity::Critical.weight(), 1.0);
        assert_eq!(Severity::Major.weight(), 0.7);
        assert_eq!(Severity::Minor.weight(), 0.3);
        assert!(Severity::Critical > Severity::Major);
    }

    #[test]
    fn test_season_parse_and_opposite() {
        assert_eq!(Season::parse("Fall"), Some(Season::Autumn));
        assert_eq!(Season::Summer.opposite(), Season::Winter);
        assert_eq!(Season::parse("monsoon"), None);
    }
}
