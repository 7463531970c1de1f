//! Confidence readings, outcomes and training samples

use super::factors::ConfidenceFactors;
use crate::types::ValidationContext;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Predicted confidence at or above which a response counts as "good"
pub const POSITIVE_PREDICTION: f64 = 0.7;

/// Observed correctness of a validated response, reported later by feedback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Correct,
    PartiallyCorrect,
    Incorrect,
}

impl Outcome {
    /// Training target for this outcome
    pub fn target(&self) -> f64 {
        match self {
            Outcome::Correct => 1.0,
            Outcome::PartiallyCorrect => 0.7,
            Outcome::Incorrect => 0.2,
        }
    }

    pub fn is_positive(&self) -> bool {
        matches!(self, Outcome::Correct | Outcome::PartiallyCorrect)
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "correct" => Some(Outcome::Correct),
            "partially_correct" | "partial" => Some(Outcome::PartiallyCorrect),
            "incorrect" => Some(Outcome::Incorrect),
            _ => None,
        }
    }
}

/// Training target: explicit 0-100 score when given, else the outcome's target
///
/// Non-finite scores fall back to the outcome's target.
pub fn training_target(outcome: Outcome, feedback_score: Option<f64>) -> f64 {
    feedback_score
        .filter(|score| score.is_finite())
        .map(|score| score.clamp(0.0, 100.0) / 100.0)
        .unwrap_or_else(|| outcome.target())
}

/// One recorded calibration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfidenceReading {
    pub timestamp: DateTime<Utc>,
    pub context: ValidationContext,
    pub factors: ConfidenceFactors,
    pub predicted: f64,
    pub outcome: Option<Outcome>,
    pub feedback_score: Option<f64>,
}

impl ConfidenceReading {
    /// Whether the prediction agreed with the outcome; `None` until labelled
    pub fn is_accurate(&self) -> Option<bool> {
        self.outcome
            .map(|o| (self.predicted >= POSITIVE_PREDICTION) == o.is_positive())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainingSample {
    pub inputs: [f64; ConfidenceFactors::LEN],
    pub target: f64,
}

/// Bounded per-session reading log plus the session's auto-correct threshold
#[derive(Debug, Clone)]
pub struct SessionReadings {
    readings: VecDeque<ConfidenceReading>,
    capacity: usize,
    pub threshold: f64,
    /// Recency stamp set by the owner on every calibration
    pub last_used: u64,
}

impl SessionReadings {
    pub fn new(capacity: usize, threshold: f64) -> Self {
        Self {
            readings: VecDeque::new(),
            capacity: capacity.max(1),
            threshold,
            last_used: 0,
        }
    }

    /// Append, evicting the oldest reading when full
    pub fn push(&mut self, reading: ConfidenceReading) {
        if self.readings.len() >= self.capacity {
            self.readings.pop_front();
        }
        self.readings.push_back(reading);
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    /// Unlabelled reading closest to `timestamp`, within `window_ms`
    pub fn closest_unlabelled(
        &mut self,
        timestamp: DateTime<Utc>,
        window_ms: i64,
    ) -> Option<&mut ConfidenceReading> {
        self.readings
            .iter_mut()
            .filter(|r| r.outcome.is_none())
            .map(|r| (pmv_common::time::distance_ms(r.timestamp, timestamp), r))
            .filter(|(distance, _)| *distance <= window_ms)
            .min_by_key(|(distance, _)| *distance)
            .map(|(_, r)| r)
    }

    pub fn labelled_count(&self) -> usize {
        self.readings.iter().filter(|r| r.outcome.is_some()).count()
    }

    /// Accuracy over the most recent `window` labelled readings
    pub fn recent_accuracy(&self, window: usize) -> Option<f64> {
        let recent: Vec<bool> = self
            .readings
            .iter()
            .rev()
            .filter_map(ConfidenceReading::is_accurate)
            .take(window)
            .collect();
        if recent.is_empty() {
            return None;
        }
        Some(recent.iter().filter(|ok| **ok).count() as f64 / recent.len() as f64)
    }

    /// Accuracy over every labelled reading
    pub fn accuracy(&self) -> Option<f64> {
        self.recent_accuracy(usize::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ResponseType;
    use chrono::Duration;

    fn reading(at: DateTime<Utc>, predicted: f64) -> ConfidenceReading {
        ConfidenceReading {
            timestamp: at,
            context: ValidationContext::new("req", "sess", ResponseType::General),
            factors: ConfidenceFactors::perfect(),
            predicted,
            outcome: None,
            feedback_score: None,
        }
    }

    #[test]
    fn test_training_targets() {
        assert_eq!(training_target(Outcome::Correct, None), 1.0);
        assert_eq!(training_target(Outcome::PartiallyCorrect, None), 0.7);
        assert_eq!(training_target(Outcome::Incorrect, None), 0.2);
        assert_eq!(training_target(Outcome::Incorrect, Some(45.0)), 0.45);
        assert_eq!(training_target(Outcome::Correct, Some(250.0)), 1.0);
        assert_eq!(training_target(Outcome::Incorrect, Some(f64::NAN)), 0.2);
        assert_eq!(training_target(Outcome::Correct, Some(-5.0)), 0.0);
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let now = Utc::now();
        let mut session = SessionReadings::new(2, 0.95);
        session.push(reading(now, 0.1));
        session.push(reading(now, 0.2));
        session.push(reading(now, 0.3));
        assert_eq!(session.len(), 2);
        assert_eq!(session.readings[0].predicted, 0.2);
    }

    #[test]
    fn test_closest_unlabelled_within_window() {
        let now = Utc::now();
        let mut session = SessionReadings::new(10, 0.95);
        session.push(reading(now - Duration::seconds(3), 0.5));
        session.push(reading(now, 0.9));

        let hit = session.closest_unlabelled(now + Duration::milliseconds(200), 5000).unwrap();
        assert_eq!(hit.predicted, 0.9);
        hit.outcome = Some(Outcome::Correct);

        // Labelled readings are skipped; the next closest is 3.2s away
        let hit = session.closest_unlabelled(now + Duration::milliseconds(200), 5000).unwrap();
        assert_eq!(hit.predicted, 0.5);
        assert!(session.closest_unlabelled(now + Duration::seconds(30), 5000).is_none());
    }

    #[test]
    fn test_accuracy_counts_agreement() {
        let now = Utc::now();
        let mut session = SessionReadings::new(10, 0.95);
        let mut good = reading(now, 0.9);
        good.outcome = Some(Outcome::PartiallyCorrect);
        let mut bad = reading(now, 0.9);
        bad.outcome = Some(Outcome::Incorrect);
        session.push(good);
        session.push(bad);
        session.push(reading(now, 0.9));
        assert_eq!(session.labelled_count(), 2);
        assert_eq!(session.accuracy(), Some(0.5));
        assert_eq!(session.recent_accuracy(1), Some(0.0));
    }
}
