//! Validation orchestrator
//!
//! `ValidationService` owns every piece of mutable state (history, metrics,
//! calibrator, sinks) and runs the per-call pipeline:
//!
//! Syntax/Semantic/Business/Factual/Consistency (concurrently) → Aggregate →
//! Correct → Calibrate → Finalize
//!
//! Each stage appends one audit entry. Any panic escaping the pipeline is
//! caught here and turned into a zero-confidence invalid result; callers
//! always get a structured result back.

pub mod batch;
pub mod correction;
pub mod history;
pub mod layers;
pub mod metrics;

pub use batch::{BatchItem, BatchRequest, BatchResponse, BatchSummary};
pub use correction::CorrectionPolicy;
pub use history::{HistoryPage, ValidationHistory};
pub use metrics::{MetricsCounters, ValidationMetrics};

use crate::calibration::{AggregatedResults, ConfidenceCalibrator, Outcome, TrainingMetrics};
use crate::config::ValidatorConfig;
use crate::error::{ValidatorError, ValidatorResult};
use crate::facts::{ExternalVerification, FactStore};
use crate::notify::{EventSink, Notifier};
use crate::payload::Payload;
use crate::rules::RulesEngine;
use crate::types::{
    AuditEntry, ErrorKind, Impact, LayerKind, Severity, ValidationContext, ValidationError,
    ValidationMetadata, ValidationOptions, ValidationResult, ValidationWarning, WarningKind,
};
use chrono::{DateTime, Utc};
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use pmv_common::events::{EventBus, EventKind, RealtimeMessage};
use serde_json::{json, Value};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{error, info};
use uuid::Uuid;

pub struct ValidationService {
    config: ValidatorConfig,
    rules: RulesEngine,
    facts: FactStore,
    calibrator: ConfidenceCalibrator,
    history: Mutex<ValidationHistory>,
    metrics: Mutex<MetricsCounters>,
    notifier: Notifier,
}

impl ValidationService {
    /// Service with the built-in rules and verifiers
    pub fn new(config: ValidatorConfig) -> Self {
        let facts = FactStore::new().with_timeout_ms(config.facts.verifier_timeout_ms);
        Self::with_components(config, RulesEngine::new(), facts)
    }

    /// Service with caller-supplied rules engine and fact store
    pub fn with_components(config: ValidatorConfig, rules: RulesEngine, facts: FactStore) -> Self {
        let calibrator = ConfidenceCalibrator::new(
            config.calibration.clone(),
            config.pipeline.auto_correct_threshold,
            config.pipeline.complexity_normalizer,
        );
        Self {
            history: Mutex::new(ValidationHistory::new(
                config.pipeline.history_limit,
                config.pipeline.max_sessions,
            )),
            metrics: Mutex::new(MetricsCounters::default()),
            notifier: Notifier::new(config.pipeline.event_capacity),
            calibrator,
            rules,
            facts,
            config,
        }
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    pub fn rules(&self) -> &RulesEngine {
        &self.rules
    }

    pub fn calibrator(&self) -> &ConfidenceCalibrator {
        &self.calibrator
    }

    // ========================================================================
    // Validation
    // ========================================================================

    /// Validate one response
    ///
    /// Returns `Err` only for malformed input (rejected before any layer
    /// runs). Pipeline failures come back as an invalid result.
    /// Auto-applied corrections are written into `response`.
    pub async fn validate(
        &self,
        response: &mut Value,
        context: &ValidationContext,
        options: &ValidationOptions,
    ) -> ValidatorResult<ValidationResult> {
        check_input(response, context, options)?;

        let started = Instant::now();
        let mut trail = Vec::new();
        let pipeline = self.run_pipeline(response, context, options, started, &mut trail);
        let outcome = AssertUnwindSafe(pipeline).catch_unwind().await;

        let result = match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => self.failure_result(context, started, trail, e),
            Err(panic) => {
                let reason = ValidatorError::Pipeline(panic_message(panic));
                self.failure_result(context, started, trail, reason)
            }
        };

        self.metrics.lock().await.record(&result);
        self.history.lock().await.push(result.clone());

        if options.realtime {
            let event = if result.errors.iter().any(|e| e.kind == ErrorKind::System) {
                EventKind::ValidationError
            } else {
                EventKind::ValidationUpdate
            };
            self.notifier
                .notify(RealtimeMessage::new(
                    event,
                    json!({
                        "requestId": context.request_id,
                        "sessionId": context.session_id,
                        "result": result,
                    }),
                ))
                .await;
        }

        info!(
            request_id = %context.request_id,
            session_id = %context.session_id,
            valid = result.is_valid,
            confidence = result.confidence,
            errors = result.errors.len(),
            corrections = result.corrections.len(),
            elapsed_ms = result.metadata.processing_time_ms,
            "Validation complete"
        );
        Ok(result)
    }

    async fn run_pipeline(
        &self,
        response: &mut Value,
        context: &ValidationContext,
        options: &ValidationOptions,
        started: Instant,
        trail: &mut Vec<AuditEntry>,
    ) -> ValidatorResult<ValidationResult> {
        // Layers: concurrent over one snapshot, audited in completion order
        let layers_run: Vec<LayerKind> = LayerKind::ALL
            .into_iter()
            .filter(|l| !options.skip_layers.contains(l))
            .collect();

        let snapshot = response.clone();
        let mut outcomes = Vec::with_capacity(layers_run.len());
        {
            let mut pending: FuturesUnordered<_> = layers_run
                .iter()
                .map(|layer| {
                    layers::run_layer(*layer, &self.rules, &self.facts, &snapshot, context)
                })
                .collect();
            while let Some(outcome) = pending.next().await {
                trail.push(outcome.audit_entry());
                outcomes.push(outcome);
            }
        }

        // Aggregate in layer order
        outcomes.sort_by_key(|o| o.layer);
        let external = outcomes
            .iter()
            .find_map(|o| o.external.clone())
            .unwrap_or_else(ExternalVerification::empty);
        let rule_count: usize = outcomes.iter().map(|o| o.findings.rules_applied).sum();
        let mut errors: Vec<ValidationError> = Vec::new();
        let mut warnings: Vec<ValidationWarning> = Vec::new();
        for outcome in outcomes {
            errors.extend(outcome.findings.errors);
            warnings.extend(outcome.findings.warnings);
        }
        let critical = errors.iter().filter(|e| e.is_critical()).count();
        trail.push(AuditEntry::new(
            "aggregate",
            json!({
                "errors": errors.len(),
                "warnings": warnings.len(),
                "critical": critical,
                "ruleCount": rule_count,
            }),
            if critical == 0 { 1.0 } else { 0.0 },
            "orchestrator",
        ));

        // Correct
        let threshold = self.calibrator.auto_correct_threshold(&context.session_id).await;
        let policy = CorrectionPolicy {
            min_confidence: self.config.pipeline.correction_min_confidence,
            auto_apply_threshold: threshold,
            auto_correct: options.auto_correct,
        };
        let corrections = correction::apply_corrections(&errors, response, policy);
        let applied = corrections.iter().filter(|c| c.auto_applied).count();
        trail.push(AuditEntry::new(
            "correct",
            json!({"proposed": corrections.len(), "applied": applied, "threshold": threshold}),
            correction_confidence(&corrections),
            "orchestrator",
        ));

        // Calibrate against the corrected response
        let timestamp = pmv_common::time::now();
        let aggregated = AggregatedResults {
            field_count: Payload::new(response).field_count(),
            external_confidence: external.confidence,
            source_reliability: external.reliability(),
            errors,
            warnings,
        };
        let confidence = self
            .calibrator
            .calibrate_at(&aggregated, context, &corrections, timestamp)
            .await;
        trail.push(AuditEntry::new(
            "calibrate",
            json!({
                "externalConfidence": aggregated.external_confidence,
                "sourceReliability": aggregated.source_reliability,
                "fieldCount": aggregated.field_count,
            }),
            confidence,
            "confidence_calibrator",
        ));

        // Finalize
        let AggregatedResults {
            errors, mut warnings, ..
        } = aggregated;
        let is_valid = !errors.iter().any(ValidationError::is_critical);
        if confidence < options.min_confidence {
            warnings.push(ValidationWarning::new(
                WarningKind::PotentialIssue,
                "",
                format!(
                    "Confidence {:.2} is below the requested minimum {:.2}",
                    confidence, options.min_confidence
                ),
                Impact::High,
            ));
        }

        let mut sources_consulted = vec!["rules_engine".to_string()];
        if layers_run.contains(&LayerKind::Factual) {
            sources_consulted.push("fact_store".to_string());
            sources_consulted.extend(external.sources_used.iter().cloned());
        }

        trail.push(AuditEntry::new(
            "finalize",
            json!({"isValid": is_valid, "errors": errors.len(), "warnings": warnings.len()}),
            confidence,
            "orchestrator",
        ));

        Ok(ValidationResult {
            is_valid,
            confidence,
            errors,
            warnings,
            corrections,
            metadata: ValidationMetadata {
                request_id: context.request_id.clone(),
                session_id: context.session_id.clone(),
                timestamp,
                processing_time_ms: pmv_common::time::elapsed_ms(started),
                layers_run,
                sources_consulted,
                rule_count,
                confidence,
            },
            audit_trail: std::mem::take(trail),
        })
    }

    fn failure_result(
        &self,
        context: &ValidationContext,
        started: Instant,
        trail: Vec<AuditEntry>,
        reason: ValidatorError,
    ) -> ValidationResult {
        error!(
            request_id = %context.request_id,
            session_id = %context.session_id,
            reason = %reason,
            "Validation pipeline failed"
        );
        let layers_run = trail
            .iter()
            .filter_map(|entry| LayerKind::ALL.into_iter().find(|l| l.as_str() == entry.layer))
            .collect();

        ValidationResult {
            is_valid: false,
            confidence: 0.0,
            errors: vec![ValidationError::new(
                ErrorKind::System,
                Severity::Critical,
                "",
                reason.to_string(),
            )
            .with_confidence(1.0)
            .with_source("orchestrator")],
            warnings: Vec::new(),
            corrections: Vec::new(),
            metadata: ValidationMetadata {
                request_id: context.request_id.clone(),
                session_id: context.session_id.clone(),
                timestamp: pmv_common::time::now(),
                processing_time_ms: pmv_common::time::elapsed_ms(started),
                layers_run,
                sources_consulted: Vec::new(),
                rule_count: 0,
                confidence: 0.0,
            },
            audit_trail: trail,
        }
    }

    // ========================================================================
    // History, metrics, feedback
    // ========================================================================

    /// One page of a session's history, newest first
    pub async fn history(&self, session_id: &str, limit: usize, offset: usize) -> HistoryPage {
        self.history.lock().await.page(session_id, limit, offset)
    }

    pub async fn find_by_request(&self, request_id: &str) -> Option<ValidationResult> {
        self.history.lock().await.find_by_request(request_id)
    }

    pub async fn metrics(&self) -> ValidationMetrics {
        self.metrics.lock().await.snapshot()
    }

    /// Attach an observed outcome to the calibration reading nearest `timestamp`
    pub async fn record_feedback(
        &self,
        session_id: &str,
        timestamp: DateTime<Utc>,
        outcome: Outcome,
        feedback_score: Option<f64>,
    ) -> bool {
        self.calibrator
            .record_feedback(session_id, timestamp, outcome, feedback_score)
            .await
    }

    pub async fn model_metrics(&self) -> TrainingMetrics {
        self.calibrator.model_metrics().await
    }

    // ========================================================================
    // Real-time fan-out
    // ========================================================================

    /// Register a sink; it immediately receives a `connected` message
    pub async fn subscribe(&self, sink: Arc<dyn EventSink>) -> Uuid {
        self.notifier.register(sink).await
    }

    pub async fn unsubscribe(&self, id: Uuid) -> bool {
        self.notifier.unregister(id).await
    }

    /// In-process broadcast bus carrying every real-time message
    pub fn event_bus(&self) -> &EventBus {
        self.notifier.bus()
    }

    /// Drop all sinks and clear history
    pub async fn shutdown(&self) {
        self.notifier.clear().await;
        self.history.lock().await.clear();
        info!("Validation service shut down");
    }
}

fn check_input(
    response: &Value,
    context: &ValidationContext,
    options: &ValidationOptions,
) -> ValidatorResult<()> {
    if context.request_id.trim().is_empty() {
        return Err(ValidatorError::InvalidInput("requestId must not be empty".to_string()));
    }
    if context.session_id.trim().is_empty() {
        return Err(ValidatorError::InvalidInput("sessionId must not be empty".to_string()));
    }
    if !options.min_confidence.is_finite() || !(0.0..=1.0).contains(&options.min_confidence) {
        return Err(ValidatorError::InvalidInput(format!(
            "minConfidence must be within [0, 1], got {}",
            options.min_confidence
        )));
    }
    if !response.is_object() {
        return Err(ValidatorError::InvalidInput("response must be a JSON object".to_string()));
    }
    Ok(())
}

fn correction_confidence(corrections: &[crate::types::ValidationCorrection]) -> f64 {
    if corrections.is_empty() {
        1.0
    } else {
        corrections.iter().map(|c| c.confidence).sum::<f64>() / corrections.len() as f64
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
