//! Confidence factors: the calibrator's 8-value input vector

use crate::types::{ErrorKind, ValidationCorrection, ValidationError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfidenceFactors {
    pub syntax: f64,
    pub semantic: f64,
    pub business_rule: f64,
    pub factual: f64,
    pub consistency: f64,
    pub historical_pattern: f64,
    pub external_source: f64,
    pub correction: f64,
}

impl ConfidenceFactors {
    pub const LEN: usize = 8;

    /// Every factor at 1.0
    pub fn perfect() -> Self {
        Self {
            syntax: 1.0,
            semantic: 1.0,
            business_rule: 1.0,
            factual: 1.0,
            consistency: 1.0,
            historical_pattern: 1.0,
            external_source: 1.0,
            correction: 1.0,
        }
    }

    /// Derive factors from aggregated findings
    ///
    /// `historical` is the session accuracy (1.0 without history) and
    /// `external` the external-verification confidence.
    pub fn derive(
        errors: &[ValidationError],
        historical: f64,
        external: f64,
        corrections: &[ValidationCorrection],
    ) -> Self {
        let layer = |kind: ErrorKind| layer_factor(errors.iter().filter(|e| e.kind == kind));

        let correction = if corrections.is_empty() {
            1.0
        } else {
            corrections.iter().map(|c| c.confidence).sum::<f64>() / corrections.len() as f64
        };

        Self {
            syntax: layer(ErrorKind::Syntax),
            semantic: layer(ErrorKind::Semantic),
            business_rule: layer(ErrorKind::Business),
            factual: layer(ErrorKind::Factual),
            consistency: layer(ErrorKind::Consistency),
            historical_pattern: historical.clamp(0.0, 1.0),
            external_source: external.clamp(0.0, 1.0),
            correction: correction.clamp(0.0, 1.0),
        }
    }

    pub fn to_array(&self) -> [f64; Self::LEN] {
        [
            self.syntax,
            self.semantic,
            self.business_rule,
            self.factual,
            self.consistency,
            self.historical_pattern,
            self.external_source,
            self.correction,
        ]
    }
}

/// Product of `1 - weight * (1 - confidence)` over a layer's errors
///
/// No errors gives 1.0.
pub fn layer_factor<'a>(errors: impl Iterator<Item = &'a ValidationError>) -> f64 {
    errors
        .map(|e| 1.0 - e.severity.weight() * (1.0 - e.confidence))
        .product::<f64>()
        .clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Severity;
    use serde_json::json;

    fn error(kind: ErrorKind, severity: Severity, confidence: f64) -> ValidationError {
        ValidationError::new(kind, severity, "f", "m").with_confidence(confidence)
    }

    #[test]
    fn test_no_errors_gives_perfect_layers() {
        let factors = ConfidenceFactors::derive(&[], 1.0, 1.0, &[]);
        assert_eq!(factors, ConfidenceFactors::perfect());
    }

    #[test]
    fn test_layer_factor_is_severity_weighted() {
        let errors = vec![
            error(ErrorKind::Business, Severity::Critical, 0.5),
            error(ErrorKind::Business, Severity::Minor, 0.5),
            error(ErrorKind::Syntax, Severity::Major, 0.0),
        ];
        let factors = ConfidenceFactors::derive(&errors, 0.8, 0.7, &[]);
        // (1 - 1.0*0.5) * (1 - 0.3*0.5)
        assert!((factors.business_rule - 0.425).abs() < 1e-9);
        assert!((factors.syntax - 0.3).abs() < 1e-9);
        assert_eq!(factors.semantic, 1.0);
        assert_eq!(factors.historical_pattern, 0.8);
        assert_eq!(factors.external_source, 0.7);
    }

    #[test]
    fn test_correction_factor_is_mean_confidence() {
        let corrections = vec![
            ValidationCorrection {
                field: "a".into(),
                original_value: json!(1),
                corrected_value: json!(2),
                confidence: 0.9,
                reason: "r".into(),
                auto_applied: false,
            },
            ValidationCorrection {
                field: "b".into(),
                original_value: json!(1),
                corrected_value: json!(2),
                confidence: 0.98,
                reason: "r".into(),
                auto_applied: true,
            },
        ];
        let factors = ConfidenceFactors::derive(&[], 1.0, 1.0, &corrections);
        assert!((factors.correction - 0.94).abs() < 1e-9);
        assert_eq!(factors.to_array()[7], factors.correction);
    }
}
