//! Configuration for pmv-validator
//!
//! Resolution priority: `--config` path → `PMV_CONFIG` env var →
//! `<config_dir>/pmv/validator.toml` → compiled defaults. A handful of
//! fields can then be overridden individually from the environment.

use pmv_common::config::{env_override, load_toml, ConfigResolver, LoggingConfig};
use pmv_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

pub const CONFIG_ENV_VAR: &str = "PMV_CONFIG";
pub const CONFIG_FILE_NAME: &str = "validator.toml";

/// Pipeline, correction and batching parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Initial per-session confidence above which corrections are auto-applied
    pub auto_correct_threshold: f64,
    /// Error confidence above which a fix becomes a correction
    pub correction_min_confidence: f64,
    /// History entries kept per session
    pub history_limit: usize,
    /// Sessions held in history; the least recently used is dropped first
    pub max_sessions: usize,
    pub max_batch_size: usize,
    /// In-flight validations per batch chunk
    pub batch_concurrency: usize,
    /// Divisor turning (errors + warnings + fields) into a complexity score
    pub complexity_normalizer: f64,
    /// Broadcast sink capacity
    pub event_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            auto_correct_threshold: 0.95,
            correction_min_confidence: 0.8,
            history_limit: 50,
            max_sessions: 1000,
            max_batch_size: 50,
            batch_concurrency: 10,
            complexity_normalizer: 100.0,
            event_capacity: 256,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FactsConfig {
    /// Per-verifier timeout; clamped into 2000-5000
    pub verifier_timeout_ms: u64,
}

impl Default for FactsConfig {
    fn default() -> Self {
        Self {
            verifier_timeout_ms: 3000,
        }
    }
}

/// Calibrator learning parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Fresh feedback samples needed before a retraining pass
    pub min_training_samples: usize,
    pub max_training_samples: usize,
    /// Oldest samples dropped when `max_training_samples` is exceeded
    pub training_trim: usize,
    pub batch_size: usize,
    pub max_epochs: usize,
    pub early_stop_loss: f64,
    pub learning_rate: f64,
    /// Feedback must land within this many seconds of a reading
    pub feedback_window_secs: u64,
    pub max_readings_per_session: usize,
    /// Sessions with readings held; the least recently used is dropped first
    pub max_sessions: usize,
    /// Trailing outcomes used to adjust the auto-correct threshold
    pub threshold_window: usize,
    pub threshold_min: f64,
    pub threshold_max: f64,
    /// Labelled readings needed before history influences scoring
    pub min_outcomes_for_adjustment: usize,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            min_training_samples: 1000,
            max_training_samples: 10_000,
            training_trim: 2000,
            batch_size: 32,
            max_epochs: 500,
            early_stop_loss: 0.01,
            learning_rate: 0.5,
            feedback_window_secs: 5,
            max_readings_per_session: 1000,
            max_sessions: 1000,
            threshold_window: 50,
            threshold_min: 0.85,
            threshold_max: 0.98,
            min_outcomes_for_adjustment: 10,
        }
    }
}

/// Complete validator configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    pub logging: LoggingConfig,
    pub pipeline: PipelineConfig,
    pub facts: FactsConfig,
    pub calibration: CalibrationConfig,
}

impl ValidatorConfig {
    /// Resolve, load, apply environment overrides and validate
    pub fn load(cli_path: Option<&Path>) -> Result<Self> {
        let resolver = ConfigResolver::new(CONFIG_ENV_VAR, CONFIG_FILE_NAME);
        let path = resolver.resolve(cli_path);
        let mut config: ValidatorConfig = load_toml(path.as_deref())?;
        config.apply_env_overrides();
        config.validate()?;
        info!(
            auto_correct_threshold = config.pipeline.auto_correct_threshold,
            verifier_timeout_ms = config.facts.verifier_timeout_ms,
            "Validator configuration ready"
        );
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) {
        if let Some(v) = env_override("PMV_AUTO_CORRECT_THRESHOLD") {
            self.pipeline.auto_correct_threshold = v;
        }
        if let Some(v) = env_override("PMV_VERIFIER_TIMEOUT_MS") {
            self.facts.verifier_timeout_ms = v;
        }
        if let Some(v) = env_override("PMV_HISTORY_LIMIT") {
            self.pipeline.history_limit = v;
        }
        if let Some(v) = env_override::<String>("PMV_LOG_LEVEL") {
            self.logging.level = v;
        }
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        let p = &self.pipeline;
        let c = &self.calibration;

        for (name, value) in [
            ("pipeline.auto_correct_threshold", p.auto_correct_threshold),
            ("pipeline.correction_min_confidence", p.correction_min_confidence),
            ("calibration.threshold_min", c.threshold_min),
            ("calibration.threshold_max", c.threshold_max),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::Config(format!("{} must be within [0, 1], got {}", name, value)));
            }
        }

        for (name, value) in [
            ("pipeline.history_limit", p.history_limit),
            ("pipeline.max_sessions", p.max_sessions),
            ("pipeline.max_batch_size", p.max_batch_size),
            ("pipeline.batch_concurrency", p.batch_concurrency),
            ("pipeline.event_capacity", p.event_capacity),
            ("calibration.batch_size", c.batch_size),
            ("calibration.max_epochs", c.max_epochs),
            ("calibration.min_training_samples", c.min_training_samples),
            ("calibration.max_readings_per_session", c.max_readings_per_session),
            ("calibration.max_sessions", c.max_sessions),
            ("calibration.threshold_window", c.threshold_window),
        ] {
            if value == 0 {
                return Err(Error::Config(format!("{} must be greater than 0", name)));
            }
        }

        if p.complexity_normalizer <= 0.0 {
            return Err(Error::Config(
                "pipeline.complexity_normalizer must be positive".to_string(),
            ));
        }
        if c.threshold_min > c.threshold_max {
            return Err(Error::Config(format!(
                "calibration.threshold_min ({}) exceeds threshold_max ({})",
                c.threshold_min, c.threshold_max
            )));
        }
        if c.min_training_samples > c.max_training_samples {
            return Err(Error::Config(format!(
                "calibration.min_training_samples ({}) exceeds max_training_samples ({})",
                c.min_training_samples, c.max_training_samples
            )));
        }
        if c.training_trim >= c.max_training_samples {
            return Err(Error::Config(
                "calibration.training_trim must be smaller than max_training_samples".to_string(),
            ));
        }
        if c.learning_rate <= 0.0 {
            return Err(Error::Config("calibration.learning_rate must be positive".to_string()));
        }
        Ok(())
    }
}
