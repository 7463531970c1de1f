//! The five validation layers
//!
//! Layers are independent: each reads the same response snapshot and none
//! consumes another's output, so the orchestrator runs them concurrently.

use crate::calibration::factors::layer_factor;
use crate::facts::{ExternalVerification, FactStore};
use crate::payload::Payload;
use crate::rules::RulesEngine;
use crate::types::{AuditEntry, Findings, LayerKind, ValidationContext};
use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::{json, Value};
use std::time::Instant;
use tracing::debug;

/// Output of one layer
#[derive(Debug, Clone)]
pub struct LayerOutcome {
    pub layer: LayerKind,
    pub findings: Findings,
    /// Severity-weighted confidence of this layer's errors
    pub confidence: f64,
    /// Set by the factual layer only
    pub external: Option<ExternalVerification>,
    pub elapsed_ms: f64,
}

impl LayerOutcome {
    fn new(
        layer: LayerKind,
        findings: Findings,
        external: Option<ExternalVerification>,
        started: Instant,
    ) -> Self {
        let confidence = layer_factor(findings.errors.iter());
        Self {
            layer,
            findings,
            confidence,
            external,
            elapsed_ms: pmv_common::time::elapsed_ms(started),
        }
    }

    /// Component that produced this layer's findings
    pub fn source(&self) -> &'static str {
        match self.layer {
            LayerKind::Factual => "fact_store",
            _ => "rules_engine",
        }
    }

    pub fn audit_entry(&self) -> AuditEntry {
        let mut output = json!({
            "errors": self.findings.errors,
            "warnings": self.findings.warnings,
            "rulesApplied": self.findings.rules_applied,
            "durationMs": self.elapsed_ms,
        });
        if let Some(external) = &self.external {
            output["sourcesUsed"] = json!(external.sources_used);
            output["conflicts"] = json!(external.conflicts.len());
            output["sourcesFailed"] = json!(external.failures);
        }
        AuditEntry::new(self.layer.as_str(), output, self.confidence, self.source())
    }
}

/// Future running one layer against `response`
pub fn run_layer<'a>(
    layer: LayerKind,
    rules: &'a RulesEngine,
    facts: &'a FactStore,
    response: &'a Value,
    context: &'a ValidationContext,
) -> BoxFuture<'a, LayerOutcome> {
    async move {
        let started = Instant::now();
        let payload = Payload::new(response);
        let outcome = match layer {
            LayerKind::Syntax => {
                let findings = rules.validate_syntax(&payload, context);
                LayerOutcome::new(layer, findings, None, started)
            }
            LayerKind::Semantic => {
                let findings = rules.validate_semantics(&payload, context);
                LayerOutcome::new(layer, findings, None, started)
            }
            LayerKind::Business => {
                let findings = rules.apply_business_rules(&payload, context);
                LayerOutcome::new(layer, findings, None, started)
            }
            LayerKind::Consistency => {
                let findings = rules.validate_consistency(&payload, context);
                LayerOutcome::new(layer, findings, None, started)
            }
            LayerKind::Factual => {
                let mut findings = facts.validate_facts(&payload, context);
                let external = facts.verify_with_external_sources(response, context).await;
                findings.errors.extend(external.conflict_errors());
                findings.rules_applied += external.sources_used.len();
                LayerOutcome::new(layer, findings, Some(external), started)
            }
        };

        debug!(
            request_id = %context.request_id,
            layer = layer.as_str(),
            errors = outcome.findings.errors.len(),
            warnings = outcome.findings.warnings.len(),
            confidence = outcome.confidence,
            "Layer complete"
        );
        outcome
    }
    .boxed()
}
