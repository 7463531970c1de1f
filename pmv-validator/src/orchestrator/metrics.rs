//! Global validation counters

use crate::types::ValidationResult;
use serde::Serialize;

/// Snapshot returned to callers
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationMetrics {
    pub total_validations: u64,
    pub successful_validations: u64,
    pub success_rate: f64,
    pub average_processing_time_ms: f64,
    /// Share of validations with at least one auto-applied correction
    pub auto_correction_rate: f64,
}

#[derive(Debug, Default)]
pub struct MetricsCounters {
    total: u64,
    successful: u64,
    auto_corrected: u64,
    average_processing_time_ms: f64,
}

impl MetricsCounters {
    pub fn record(&mut self, result: &ValidationResult) {
        self.total += 1;
        if result.is_valid {
            self.successful += 1;
        }
        if result.auto_applied_count() > 0 {
            self.auto_corrected += 1;
        }
        // Incremental mean
        let elapsed = result.metadata.processing_time_ms;
        self.average_processing_time_ms +=
            (elapsed - self.average_processing_time_ms) / self.total as f64;
    }

    pub fn snapshot(&self) -> ValidationMetrics {
        let rate = |n: u64| if self.total == 0 { 0.0 } else { n as f64 / self.total as f64 };
        ValidationMetrics {
            total_validations: self.total,
            successful_validations: self.successful,
            success_rate: rate(self.successful),
            average_processing_time_ms: self.average_processing_time_ms,
            auto_correction_rate: rate(self.auto_corrected),
        }
    }
}
