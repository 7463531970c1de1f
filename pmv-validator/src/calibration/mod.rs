//! Confidence calibrator
//!
//! Turns aggregated layer findings into one calibrated confidence:
//! 1. Derive the 8 confidence factors
//! 2. Score them with the calibration network
//! 3. Apply contextual multipliers (domain, role, complexity, history,
//!    source reliability)
//! 4. Nudge the session's auto-correct threshold
//!
//! Every calibration is recorded as a reading. Feedback labels readings and
//! turns them into training samples; once enough fresh samples arrive the
//! next calibration retrains the network off the async runtime and swaps the
//! new weights in atomically.

pub mod factors;
pub mod network;
pub mod readings;

pub use factors::ConfidenceFactors;
pub use network::{NeuralCalibrationModel, TrainingMetrics, TrainingParams};
pub use readings::{ConfidenceReading, Outcome, SessionReadings, TrainingSample};

use crate::config::CalibrationConfig;
use crate::types::{
    Domain, UserRole, ValidationContext, ValidationCorrection, ValidationError, ValidationWarning,
};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

// Contextual multipliers
const BUSINESS_TIGHTEN_BELOW: f64 = 0.9;
const BUSINESS_TIGHTEN: f64 = 0.85;
const ADMIN_LOOSEN: f64 = 1.05;
const GUEST_TIGHTEN: f64 = 0.95;
const COMPLEXITY_LIMIT: f64 = 0.8;
const COMPLEXITY_TIGHTEN: f64 = 0.9;
const HISTORY_HIGH: f64 = 0.9;
const HISTORY_LOOSEN: f64 = 1.1;
const HISTORY_LOW: f64 = 0.7;
const HISTORY_TIGHTEN: f64 = 0.85;

// Threshold drift
const RECENT_ACCURACY_HIGH: f64 = 0.95;
const RECENT_ACCURACY_LOW: f64 = 0.8;
const THRESHOLD_LOWER: f64 = 0.98;
const THRESHOLD_RAISE: f64 = 1.02;

/// Aggregated output of the five layers, as the calibrator consumes it
#[derive(Debug, Clone, Default)]
pub struct AggregatedResults {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
    /// Leaf fields in the (corrected) response
    pub field_count: usize,
    /// External-verification confidence (1.0 when nothing was checked)
    pub external_confidence: f64,
    /// Share of invoked external sources that answered
    pub source_reliability: f64,
}

#[derive(Default)]
struct CalibratorState {
    sessions: HashMap<String, SessionReadings>,
    samples: VecDeque<TrainingSample>,
    /// Samples added since the last retraining started
    fresh_samples: usize,
    /// Bumped on every calibration; orders sessions by recency
    tick: u64,
}

impl CalibratorState {
    /// Session readings, created on first use
    ///
    /// Creating a session beyond `max_sessions` evicts the least recently
    /// calibrated one.
    fn touch_session(
        &mut self,
        session_id: &str,
        max_sessions: usize,
        create: impl FnOnce() -> SessionReadings,
    ) -> &mut SessionReadings {
        if !self.sessions.contains_key(session_id) && self.sessions.len() >= max_sessions.max(1) {
            let idle = self
                .sessions
                .iter()
                .min_by_key(|(_, s)| s.last_used)
                .map(|(id, _)| id.clone());
            if let Some(id) = idle {
                debug!(session_id = %id, "Evicting idle calibration session");
                self.sessions.remove(&id);
            }
        }
        self.tick += 1;
        let session = self.sessions.entry(session_id.to_string()).or_insert_with(create);
        session.last_used = self.tick;
        session
    }
}

pub struct ConfidenceCalibrator {
    model: RwLock<Arc<NeuralCalibrationModel>>,
    state: Mutex<CalibratorState>,
    /// Held for the duration of a retraining pass
    training: Mutex<()>,
    config: CalibrationConfig,
    default_threshold: f64,
    complexity_normalizer: f64,
}

impl ConfidenceCalibrator {
    pub fn new(
        config: CalibrationConfig,
        default_threshold: f64,
        complexity_normalizer: f64,
    ) -> Self {
        Self {
            model: RwLock::new(Arc::new(NeuralCalibrationModel::new())),
            state: Mutex::new(CalibratorState::default()),
            training: Mutex::new(()),
            config,
            default_threshold,
            complexity_normalizer: complexity_normalizer.max(f64::EPSILON),
        }
    }

    fn new_session(&self) -> SessionReadings {
        SessionReadings::new(self.config.max_readings_per_session, self.default_threshold)
    }

    /// Current auto-correct threshold for a session
    pub async fn auto_correct_threshold(&self, session_id: &str) -> f64 {
        let state = self.state.lock().await;
        state
            .sessions
            .get(session_id)
            .map(|s| s.threshold)
            .unwrap_or(self.default_threshold)
    }

    /// Calibrate, recording the reading at the current time
    pub async fn calibrate(
        &self,
        aggregated: &AggregatedResults,
        context: &ValidationContext,
        corrections: &[ValidationCorrection],
    ) -> f64 {
        self.calibrate_at(aggregated, context, corrections, pmv_common::time::now()).await
    }

    /// Calibrate, recording the reading at `timestamp`
    ///
    /// Feedback is later matched against `timestamp`.
    pub async fn calibrate_at(
        &self,
        aggregated: &AggregatedResults,
        context: &ValidationContext,
        corrections: &[ValidationCorrection],
        timestamp: DateTime<Utc>,
    ) -> f64 {
        let model = self.model.read().await.clone();

        let confidence = {
            let mut state = self.state.lock().await;
            let session = state.touch_session(&context.session_id, self.config.max_sessions, || {
                self.new_session()
            });

            let history = if session.labelled_count() >= self.config.min_outcomes_for_adjustment {
                session.accuracy()
            } else {
                None
            };

            let factors = ConfidenceFactors::derive(
                &aggregated.errors,
                history.unwrap_or(1.0),
                aggregated.external_confidence,
                corrections,
            );
            let base = model.predict(&factors.to_array());
            let confidence = self.apply_multipliers(base, &factors, aggregated, context, history);

            self.adjust_threshold(session);
            session.push(ConfidenceReading {
                timestamp,
                context: context.clone(),
                factors,
                predicted: confidence,
                outcome: None,
                feedback_score: None,
            });

            debug!(
                request_id = %context.request_id,
                session_id = %context.session_id,
                base = base,
                confidence = confidence,
                threshold = session.threshold,
                "Confidence calibrated"
            );
            confidence
        };

        self.retrain_if_due().await;
        confidence
    }

    fn apply_multipliers(
        &self,
        base: f64,
        factors: &ConfidenceFactors,
        aggregated: &AggregatedResults,
        context: &ValidationContext,
        history: Option<f64>,
    ) -> f64 {
        let mut confidence = base;

        if context.domain == Domain::PropertyManagement
            && factors.business_rule < BUSINESS_TIGHTEN_BELOW
        {
            confidence *= BUSINESS_TIGHTEN;
        }

        match context.user_role {
            Some(UserRole::Admin) => confidence = (confidence * ADMIN_LOOSEN).min(1.0),
            Some(UserRole::Guest) => confidence *= GUEST_TIGHTEN,
            _ => {}
        }

        let items = aggregated.errors.len() + aggregated.warnings.len() + aggregated.field_count;
        let complexity = items as f64 / self.complexity_normalizer;
        if complexity > COMPLEXITY_LIMIT {
            confidence *= COMPLEXITY_TIGHTEN;
        }

        if let Some(accuracy) = history {
            if accuracy > HISTORY_HIGH {
                confidence = (confidence * HISTORY_LOOSEN).min(1.0);
            } else if accuracy < HISTORY_LOW {
                confidence *= HISTORY_TIGHTEN;
            }
        }

        confidence *= 0.8 + 0.2 * aggregated.source_reliability.clamp(0.0, 1.0);
        confidence.clamp(0.0, 1.0)
    }

    fn adjust_threshold(&self, session: &mut SessionReadings) {
        if session.labelled_count() < self.config.min_outcomes_for_adjustment {
            return;
        }
        let Some(recent) = session.recent_accuracy(self.config.threshold_window) else {
            return;
        };
        if recent > RECENT_ACCURACY_HIGH {
            session.threshold *= THRESHOLD_LOWER;
        } else if recent < RECENT_ACCURACY_LOW {
            session.threshold *= THRESHOLD_RAISE;
        }
        session.threshold = session
            .threshold
            .clamp(self.config.threshold_min, self.config.threshold_max);
    }

    /// Attach an observed outcome to the closest unlabelled reading
    ///
    /// Returns false when the score is not a finite number or no reading of
    /// the session lies within the feedback window.
    pub async fn record_feedback(
        &self,
        session_id: &str,
        timestamp: DateTime<Utc>,
        outcome: Outcome,
        feedback_score: Option<f64>,
    ) -> bool {
        if let Some(score) = feedback_score.filter(|s| !s.is_finite()) {
            warn!(session_id = session_id, score = score, "Rejecting non-finite feedback score");
            return false;
        }
        let window_ms = (self.config.feedback_window_secs * 1000) as i64;
        let mut state = self.state.lock().await;

        let Some(session) = state.sessions.get_mut(session_id) else {
            debug!(session_id = session_id, "Feedback for unknown session");
            return false;
        };
        let Some(reading) = session.closest_unlabelled(timestamp, window_ms) else {
            debug!(session_id = session_id, "No reading within the feedback window");
            return false;
        };

        reading.outcome = Some(outcome);
        reading.feedback_score = feedback_score;
        let sample = TrainingSample {
            inputs: reading.factors.to_array(),
            target: readings::training_target(outcome, feedback_score),
        };

        state.samples.push_back(sample);
        state.fresh_samples += 1;
        if state.samples.len() > self.config.max_training_samples {
            let trim = self.config.training_trim.min(state.samples.len());
            state.samples.drain(..trim);
        }
        true
    }

    /// Retrain when enough fresh samples have arrived
    ///
    /// Only one pass runs at a time; concurrent calls skip.
    async fn retrain_if_due(&self) {
        let Ok(_guard) = self.training.try_lock() else {
            return;
        };

        let samples: Vec<TrainingSample> = {
            let mut state = self.state.lock().await;
            if state.fresh_samples < self.config.min_training_samples {
                return;
            }
            state.fresh_samples = 0;
            state.samples.iter().copied().collect()
        };

        let mut candidate = (**self.model.read().await).clone();
        let params = TrainingParams {
            batch_size: self.config.batch_size,
            max_epochs: self.config.max_epochs,
            early_stop_loss: self.config.early_stop_loss,
            learning_rate: self.config.learning_rate,
        };

        info!(samples = samples.len(), "Retraining calibration model");
        let trained = tokio::task::spawn_blocking(move || {
            let metrics = candidate.train(&samples, &params, &mut rand::thread_rng());
            (candidate, metrics)
        })
        .await;

        match trained {
            Ok((model, metrics)) if !is_usable(&model, &metrics) => {
                warn!(
                    validation_loss = metrics.validation_loss,
                    "Retrained model produced non-finite output; keeping current weights"
                );
            }
            Ok((model, metrics)) => {
                *self.model.write().await = Arc::new(model);
                info!(
                    epochs = metrics.training_epochs,
                    accuracy = metrics.accuracy,
                    validation_loss = metrics.validation_loss,
                    "Calibration model retrained"
                );
            }
            Err(e) => warn!(error = %e, "Calibration retraining failed; keeping current weights"),
        }
    }

    pub async fn model_metrics(&self) -> TrainingMetrics {
        self.model.read().await.metrics().clone()
    }

    /// Readings currently held for a session
    pub async fn reading_count(&self, session_id: &str) -> usize {
        let state = self.state.lock().await;
        state.sessions.get(session_id).map(|s| s.len()).unwrap_or(0)
    }

    /// Sessions currently holding readings
    pub async fn session_count(&self) -> usize {
        self.state.lock().await.sessions.len()
    }

    /// Training samples currently buffered
    pub async fn sample_count(&self) -> usize {
        self.state.lock().await.samples.len()
    }
}

/// Trained weights are only swapped in when they still score finitely
fn is_usable(model: &NeuralCalibrationModel, metrics: &TrainingMetrics) -> bool {
    let scores = [
        model.predict(&ConfidenceFactors::perfect().to_array()),
        model.predict(&[0.0; ConfidenceFactors::LEN]),
    ];
    scores.iter().all(|s| s.is_finite())
        && metrics.validation_loss.is_finite()
        && metrics.accuracy.is_finite()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ErrorKind, ResponseType, Severity};

    fn calibrator(config: CalibrationConfig) -> ConfidenceCalibrator {
        ConfidenceCalibrator::new(config, 0.95, 100.0)
    }

    fn clean() -> AggregatedResults {
        AggregatedResults {
            field_count: 10,
            external_confidence: 1.0,
            source_reliability: 1.0,
            ..Default::default()
        }
    }

    fn ctx(session: &str) -> ValidationContext {
        ValidationContext::new("req", session, ResponseType::PropertyInfo)
    }

    #[tokio::test]
    async fn test_clean_response_is_confident() {
        let cal = calibrator(CalibrationConfig::default());
        let confidence = cal.calibrate(&clean(), &ctx("s"), &[]).await;
        assert!(confidence >= 0.85, "confidence = {}", confidence);
        assert_eq!(cal.reading_count("s").await, 1);
    }

    #[tokio::test]
    async fn test_role_and_business_multipliers() {
        let cal = calibrator(CalibrationConfig::default());
        let admin = cal.calibrate(&clean(), &ctx("a").with_role(UserRole::Admin), &[]).await;
        let guest = cal.calibrate(&clean(), &ctx("g").with_role(UserRole::Guest), &[]).await;
        assert!(admin > guest);
        assert!(admin <= 1.0);

        let mut flagged = clean();
        flagged.errors.push(
            ValidationError::new(ErrorKind::Business, Severity::Critical, "price", "bad")
                .with_confidence(0.5),
        );
        let tightened = cal.calibrate(&flagged, &ctx("b"), &[]).await;
        let base = cal.calibrate(&clean(), &ctx("b"), &[]).await;
        assert!(tightened < base);
    }

    #[tokio::test]
    async fn test_unreliable_sources_and_complexity_lower_confidence() {
        let cal = calibrator(CalibrationConfig::default());
        let reference = cal.calibrate(&clean(), &ctx("r"), &[]).await;

        let mut unreliable = clean();
        unreliable.source_reliability = 0.0;
        assert!(cal.calibrate(&unreliable, &ctx("r"), &[]).await < reference);

        let mut complex = clean();
        complex.field_count = 200;
        assert!(cal.calibrate(&complex, &ctx("r"), &[]).await < reference);
    }

    #[tokio::test]
    async fn test_feedback_matches_within_window() {
        let cal = calibrator(CalibrationConfig::default());
        let at = Utc::now();
        cal.calibrate_at(&clean(), &ctx("s"), &[], at).await;

        let later = at + chrono::Duration::seconds(1);
        assert!(cal.record_feedback("s", later, Outcome::Correct, None).await);
        // Only one reading, now labelled
        assert!(!cal.record_feedback("s", at, Outcome::Correct, None).await);
        assert!(!cal.record_feedback("unknown", at, Outcome::Correct, None).await);
        assert_eq!(cal.sample_count().await, 1);
    }

    #[tokio::test]
    async fn test_threshold_drifts_with_accuracy() {
        let config = CalibrationConfig {
            min_outcomes_for_adjustment: 3,
            ..Default::default()
        };
        let cal = calibrator(config);
        for _ in 0..5 {
            let at = Utc::now();
            cal.calibrate_at(&clean(), &ctx("s"), &[], at).await;
            cal.record_feedback("s", at, Outcome::Incorrect, None).await;
        }
        cal.calibrate(&clean(), &ctx("s"), &[]).await;
        let threshold = cal.auto_correct_threshold("s").await;
        assert!(threshold > 0.95);
        assert!(threshold <= 0.98);
        assert_eq!(cal.auto_correct_threshold("fresh").await, 0.95);
    }

    #[tokio::test]
    async fn test_retraining_runs_after_enough_feedback() {
        let config = CalibrationConfig {
            min_training_samples: 20,
            max_training_samples: 100,
            training_trim: 10,
            ..Default::default()
        };
        let cal = calibrator(config);
        assert!(cal.model_metrics().await.last_trained.is_none());

        for _ in 0..20 {
            let at = Utc::now();
            cal.calibrate_at(&clean(), &ctx("s"), &[], at).await;
            assert!(cal.record_feedback("s", at, Outcome::Correct, None).await);
        }
        cal.calibrate(&clean(), &ctx("s"), &[]).await;

        let metrics = cal.model_metrics().await;
        assert!(metrics.last_trained.is_some());
        assert!(metrics.training_epochs >= 1);
        assert_eq!(metrics.samples_trained, 20);
    }

    #[tokio::test]
    async fn test_training_buffer_is_trimmed() {
        let config = CalibrationConfig {
            min_training_samples: 1000,
            max_training_samples: 10,
            training_trim: 4,
            ..Default::default()
        };
        let cal = calibrator(config);
        for _ in 0..11 {
            let at = Utc::now();
            cal.calibrate_at(&clean(), &ctx("s"), &[], at).await;
            cal.record_feedback("s", at, Outcome::Correct, None).await;
        }
        assert_eq!(cal.sample_count().await, 7);
    }

    #[tokio::test]
    async fn test_non_finite_feedback_scores_are_rejected() {
        let config = CalibrationConfig {
            min_training_samples: 5,
            ..Default::default()
        };
        let cal = calibrator(config);
        for score in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY, f64::NAN, f64::NAN] {
            let at = Utc::now();
            cal.calibrate_at(&clean(), &ctx("s"), &[], at).await;
            assert!(!cal.record_feedback("s", at, Outcome::Correct, Some(score)).await);
        }
        assert_eq!(cal.sample_count().await, 0);

        let confidence = cal.calibrate(&clean(), &ctx("s"), &[]).await;
        assert!(confidence.is_finite());
        assert!((0.0..=1.0).contains(&confidence));
        assert!(cal.model_metrics().await.last_trained.is_none());
    }

    #[tokio::test]
    async fn test_idle_sessions_are_evicted() {
        let config = CalibrationConfig {
            max_sessions: 2,
            ..Default::default()
        };
        let cal = calibrator(config);
        cal.calibrate(&clean(), &ctx("a"), &[]).await;
        cal.calibrate(&clean(), &ctx("b"), &[]).await;
        cal.calibrate(&clean(), &ctx("a"), &[]).await;
        cal.calibrate(&clean(), &ctx("c"), &[]).await;

        assert_eq!(cal.session_count().await, 2);
        assert_eq!(cal.reading_count("a").await, 2);
        assert_eq!(cal.reading_count("b").await, 0);
        assert_eq!(cal.reading_count("c").await, 1);
    }

    #[test]
    fn test_non_finite_training_result_is_not_swapped_in() {
        let model = NeuralCalibrationModel::new();
        assert!(is_usable(&model, &TrainingMetrics::default()));
        let poisoned = TrainingMetrics {
            validation_loss: f64::NAN,
            ..Default::default()
        };
        assert!(!is_usable(&model, &poisoned));
    }
}
