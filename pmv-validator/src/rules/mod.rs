//! Rules engine
//!
//! Stateless check library behind four of the five validation layers:
//! syntax (data types and formats), semantic plausibility, business rules
//! and cross-field consistency. Every entry point is a pure function of
//! (payload, context) and reports how many checks it evaluated.

pub mod business;
pub mod consistency;
pub mod format;
pub mod patterns;
pub mod semantic;

pub use business::{builtin_rules, BuiltinRule, BusinessRule, RuleCategory, RuleResult};

use crate::payload::Payload;
use crate::types::{Findings, ValidationContext};
use serde::Serialize;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{debug, warn};

/// Catalogue entry for one registered business rule
#[derive(Debug, Clone, Serialize)]
pub struct RuleInfo {
    pub id: String,
    pub category: RuleCategory,
}

/// Business rule registry plus the built-in check families
pub struct RulesEngine {
    rules: Vec<Box<dyn BusinessRule>>,
}

impl Default for RulesEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl RulesEngine {
    /// Engine with the built-in rule catalogue
    pub fn new() -> Self {
        Self {
            rules: builtin_rules(),
        }
    }

    /// Engine with no business rules registered
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Register an additional business rule
    pub fn register(&mut self, rule: impl BusinessRule + 'static) {
        self.rules.push(Box::new(rule));
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    pub fn catalog(&self) -> Vec<RuleInfo> {
        self.rules
            .iter()
            .map(|r| RuleInfo {
                id: r.id().to_string(),
                category: r.category(),
            })
            .collect()
    }

    /// Evaluate every business rule
    ///
    /// A rule that returns `Err` or panics is logged and skipped; it never
    /// stops the remaining rules.
    pub fn apply_business_rules(
        &self,
        payload: &Payload<'_>,
        context: &ValidationContext,
    ) -> Findings {
        let mut findings = Findings::default();

        for rule in &self.rules {
            let outcome = catch_unwind(AssertUnwindSafe(|| rule.evaluate(payload, context)));
            match outcome {
                Ok(Ok(errors)) => {
                    findings.rules_applied += 1;
                    findings.errors.extend(errors);
                }
                Ok(Err(e)) => {
                    warn!(
                        rule = rule.id(),
                        request_id = %context.request_id,
                        error = %e,
                        "Business rule failed; skipping"
                    );
                }
                Err(_) => {
                    warn!(
                        rule = rule.id(),
                        request_id = %context.request_id,
                        "Business rule panicked; skipping"
                    );
                }
            }
        }

        debug!(
            request_id = %context.request_id,
            rules = findings.rules_applied,
            violations = findings.errors.len(),
            "Business rules evaluated"
        );
        findings
    }

    pub fn validate_data_types(
        &self,
        payload: &Payload<'_>,
        context: &ValidationContext,
    ) -> Findings {
        format::validate_data_types(payload, context)
    }

    pub fn validate_formats(&self, payload: &Payload<'_>, context: &ValidationContext) -> Findings {
        format::validate_formats(payload, context)
    }

    /// Data types and formats together, as the syntax layer runs them
    pub fn validate_syntax(&self, payload: &Payload<'_>, context: &ValidationContext) -> Findings {
        let mut findings = self.validate_data_types(payload, context);
        findings.merge(self.validate_formats(payload, context));
        findings
    }

    pub fn validate_semantics(
        &self,
        payload: &Payload<'_>,
        context: &ValidationContext,
    ) -> Findings {
        semantic::validate_semantics(payload, context)
    }

    pub fn validate_consistency(
        &self,
        payload: &Payload<'_>,
        context: &ValidationContext,
    ) -> Findings {
        consistency::validate_consistency(payload, context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidatorError;
    use crate::types::{ErrorKind, ResponseType, Severity, ValidationError};
    use serde_json::json;

    struct FailingRule;

    impl BusinessRule for FailingRule {
        fn id(&self) -> &str {
            "test.failing"
        }
        fn category(&self) -> RuleCategory {
            RuleCategory::Property
        }
        fn evaluate(&self, _: &Payload<'_>, _: &ValidationContext) -> RuleResult {
            Err(ValidatorError::rule("test.failing", "lookup table unavailable"))
        }
    }

    struct PanickingRule;

    impl BusinessRule for PanickingRule {
        fn id(&self) -> &str {
            "test.panicking"
        }
        fn category(&self) -> RuleCategory {
            RuleCategory::Host
        }
        fn evaluate(&self, _: &Payload<'_>, _: &ValidationContext) -> RuleResult {
            panic!("rule bug")
        }
    }

    struct AlwaysFlags;

    impl BusinessRule for AlwaysFlags {
        fn id(&self) -> &str {
            "test.always"
        }
        fn category(&self) -> RuleCategory {
            RuleCategory::Media
        }
        fn evaluate(&self, _: &Payload<'_>, _: &ValidationContext) -> RuleResult {
            let error = ValidationError::new(ErrorKind::Business, Severity::Minor, "x", "flagged");
            Ok(vec![error])
        }
    }

    fn ctx() -> ValidationContext {
        ValidationContext::new("req", "sess", ResponseType::General)
    }

    #[test]
    fn test_failing_rules_do_not_abort_others() {
        let mut engine = RulesEngine::empty();
        engine.register(FailingRule);
        engine.register(PanickingRule);
        engine.register(AlwaysFlags);

        let doc = json!({});
        let findings = engine.apply_business_rules(&Payload::new(&doc), &ctx());
        assert_eq!(findings.errors.len(), 1);
        assert_eq!(findings.errors[0].field, "x");
        assert_eq!(findings.rules_applied, 1);
    }

    #[test]
    fn test_catalog_lists_registered_rules() {
        let mut engine = RulesEngine::new();
        let builtin = engine.rule_count();
        engine.register(AlwaysFlags);
        let catalog = engine.catalog();
        assert_eq!(catalog.len(), builtin + 1);
        assert_eq!(catalog.last().unwrap().id, "test.always");
    }

    #[test]
    fn test_price_example_yields_single_critical() {
        let engine = RulesEngine::new();
        let doc = json!({"price": -10});
        let findings = engine.apply_business_rules(&Payload::new(&doc), &ctx());
        let price: Vec<_> = findings.errors.iter().filter(|e| e.field == "price").collect();
        assert_eq!(price.len(), 1);
        assert_eq!(price[0].severity, Severity::Critical);
        assert_eq!(findings.rules_applied, engine.rule_count());
    }

    #[test]
    fn test_counters_are_per_call() {
        let engine = RulesEngine::new();
        let doc = json!({"checkIn": "2024-06-15", "checkOut": "2024-06-20", "nights": 3});
        let a = engine.validate_consistency(&Payload::new(&doc), &ctx());
        let b = engine.validate_consistency(&Payload::new(&doc), &ctx());
        assert_eq!(a.rules_applied, b.rules_applied);
    }
}
