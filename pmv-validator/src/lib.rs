//! # PMV Validator Library (pmv-validator)
//!
//! Multi-layer validation of AI-generated property-management responses.
//!
//! **Purpose:** Check a loosely-typed JSON response through five independent
//! layers (syntax, semantic, business, factual, consistency), propose and
//! apply corrections, and attach a calibrated confidence score.
//!
//! **Architecture:** One `ValidationService` owns all mutable state; the
//! `RulesEngine`, `FactStore` and `ConfidenceCalibrator` are its components.
//! Real-time results fan out through registered `EventSink`s.

pub mod calibration;
pub mod config;
pub mod error;
pub mod facts;
pub mod notify;
pub mod orchestrator;
pub mod payload;
pub mod rules;
pub mod types;

pub use calibration::{ConfidenceCalibrator, Outcome, TrainingMetrics};
pub use config::ValidatorConfig;
pub use error::{ValidatorError, ValidatorResult};
pub use facts::{ExternalVerifier, FactStore};
pub use notify::{ChannelSink, EventSink};
pub use orchestrator::{BatchRequest, BatchResponse, ValidationMetrics, ValidationService};
pub use payload::Payload;
pub use rules::{BusinessRule, RulesEngine};
pub use types::{
    ResponseType, ValidationContext, ValidationError, ValidationOptions, ValidationResult,
};
