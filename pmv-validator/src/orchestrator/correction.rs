//! Progressive correction
//!
//! Fixes proposed with enough confidence become corrections; the most
//! confident ones are written back into the response before calibration.

use crate::payload::{set_path, Payload};
use crate::types::{ValidationCorrection, ValidationError};
use serde_json::Value;
use std::collections::HashMap;
use tracing::warn;

/// Correction thresholds for one call
#[derive(Debug, Clone, Copy)]
pub struct CorrectionPolicy {
    /// Error confidence above which a fix becomes a correction
    pub min_confidence: f64,
    /// Error confidence above which the correction is applied
    pub auto_apply_threshold: f64,
    /// Caller allows writing corrections back
    pub auto_correct: bool,
}

fn has_fix(error: &ValidationError) -> Option<&Value> {
    match &error.suggested_fix {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.is_empty() => None,
        Some(fix) => Some(fix),
    }
}

/// Build corrections for `errors`, applying eligible ones to `response`
///
/// At most one correction per field: the most confident fix wins. A fix
/// equal to the current value is not a correction.
pub fn apply_corrections(
    errors: &[ValidationError],
    response: &mut Value,
    policy: CorrectionPolicy,
) -> Vec<ValidationCorrection> {
    let mut best: HashMap<&str, usize> = HashMap::new();
    for (idx, error) in errors.iter().enumerate() {
        if error.confidence <= policy.min_confidence || has_fix(error).is_none() {
            continue;
        }
        best.entry(error.field.as_str())
            .and_modify(|current| {
                if error.confidence > errors[*current].confidence {
                    *current = idx;
                }
            })
            .or_insert(idx);
    }

    let mut chosen: Vec<usize> = best.into_values().collect();
    chosen.sort_unstable();

    let mut corrections = Vec::with_capacity(chosen.len());
    for idx in chosen {
        let error = &errors[idx];
        let Some(fix) = has_fix(error) else {
            continue;
        };
        let original = Payload::new(response)
            .get(&error.field)
            .cloned()
            .unwrap_or(Value::Null);
        if &original == fix {
            continue;
        }

        let mut auto_applied = false;
        if policy.auto_correct && error.confidence > policy.auto_apply_threshold {
            match set_path(response, &error.field, fix.clone()) {
                Ok(_) => auto_applied = true,
                Err(e) => warn!(field = %error.field, error = %e, "Could not apply correction"),
            }
        }

        corrections.push(ValidationCorrection {
            field: error.field.clone(),
            original_value: original,
            corrected_value: fix.clone(),
            confidence: error.confidence,
            reason: error.message.clone(),
            auto_applied,
        });
    }
    corrections
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ErrorKind, Severity};
    use serde_json::json;

    fn policy() -> CorrectionPolicy {
        CorrectionPolicy {
            min_confidence: 0.8,
            auto_apply_threshold: 0.95,
            auto_correct: true,
        }
    }

    fn error(field: &str, fix: Value, confidence: f64) -> ValidationError {
        ValidationError::new(ErrorKind::Business, Severity::Major, field, "fix me")
            .with_fix(fix)
            .with_confidence(confidence)
    }

    #[test]
    fn test_threshold_bands() {
        let mut doc = json!({"a": 1, "b": 1, "c": 1});
        let errors = vec![
            error("a", json!(2), 0.97),
            error("b", json!(2), 0.85),
            error("c", json!(2), 0.8),
        ];
        let corrections = apply_corrections(&errors, &mut doc, policy());
        assert_eq!(corrections.len(), 2);
        assert!(corrections[0].auto_applied);
        assert!(!corrections[1].auto_applied);
        assert_eq!(doc, json!({"a": 2, "b": 1, "c": 1}));
    }

    #[test]
    fn test_one_correction_per_field() {
        let mut doc = json!({"guests": 5});
        let errors = vec![error("guests", json!(3), 0.9), error("guests", json!(4), 0.97)];
        let corrections = apply_corrections(&errors, &mut doc, policy());
        assert_eq!(corrections.len(), 1);
        assert_eq!(corrections[0].corrected_value, json!(4));
        assert_eq!(doc["guests"], json!(4));
    }

    #[test]
    fn test_auto_correct_disabled_only_proposes() {
        let mut doc = json!({"a": 1});
        let errors = vec![error("a", json!(2), 0.99)];
        let corrections = apply_corrections(
            &errors,
            &mut doc,
            CorrectionPolicy {
                auto_correct: false,
                ..policy()
            },
        );
        assert!(!corrections[0].auto_applied);
        assert_eq!(doc["a"], json!(1));
    }

    #[test]
    fn test_fix_equal_to_current_value_is_skipped() {
        let mut doc = json!({"a": 2});
        let errors = vec![error("a", json!(2), 0.99), error("b", Value::Null, 0.99)];
        assert!(apply_corrections(&errors, &mut doc, policy()).is_empty());
    }
}
