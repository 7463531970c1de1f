//! Batch validation
//!
//! Requests are validated in chunks of `batch_concurrency`; each chunk is
//! awaited fully before the next starts. A failing item never aborts the
//! batch.

use super::ValidationService;
use crate::error::{ValidatorError, ValidatorResult};
use crate::types::{ValidationContext, ValidationOptions, ValidationResult};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Instant;
use tracing::info;

/// One entry of a batch
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRequest {
    pub response: Value,
    pub context: ValidationContext,
    /// Overrides the batch-wide options for this item
    #[serde(default)]
    pub options: Option<ValidationOptions>,
}

/// Result slot for one request, in submission order
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchItem {
    pub index: usize,
    pub request_id: String,
    /// The item completed and produced a result
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ValidationResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Response after auto-applied corrections
    pub response: Value,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub processing_time_ms: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResponse {
    pub results: Vec<BatchItem>,
    pub summary: BatchSummary,
}

impl ValidationService {
    /// Validate up to `max_batch_size` requests
    pub async fn validate_batch(
        &self,
        requests: Vec<BatchRequest>,
        options: &ValidationOptions,
    ) -> ValidatorResult<BatchResponse> {
        let max = self.config().pipeline.max_batch_size;
        if requests.len() > max {
            return Err(ValidatorError::InvalidInput(format!(
                "batch of {} requests exceeds the limit of {}",
                requests.len(),
                max
            )));
        }

        let started = Instant::now();
        let total = requests.len();
        let chunk_size = self.config().pipeline.batch_concurrency.max(1);
        let mut results = Vec::with_capacity(total);

        let mut indexed = requests.into_iter().enumerate().peekable();
        while indexed.peek().is_some() {
            let chunk: Vec<_> = indexed.by_ref().take(chunk_size).collect();
            let items = join_all(
                chunk
                    .into_iter()
                    .map(|(index, request)| self.validate_item(index, request, options)),
            )
            .await;
            results.extend(items);
        }

        let successful = results.iter().filter(|item| item.success).count();
        let summary = BatchSummary {
            total,
            successful,
            failed: total - successful,
            processing_time_ms: pmv_common::time::elapsed_ms(started),
        };
        info!(
            total = summary.total,
            successful = summary.successful,
            failed = summary.failed,
            "Batch complete"
        );
        Ok(BatchResponse { results, summary })
    }

    async fn validate_item(
        &self,
        index: usize,
        request: BatchRequest,
        options: &ValidationOptions,
    ) -> BatchItem {
        let BatchRequest {
            mut response,
            context,
            options: item_options,
        } = request;
        let options = item_options.as_ref().unwrap_or(options);

        match self.validate(&mut response, &context, options).await {
            Ok(result) => BatchItem {
                index,
                request_id: context.request_id,
                success: true,
                result: Some(result),
                error: None,
                response,
            },
            Err(e) => BatchItem {
                index,
                request_id: context.request_id,
                success: false,
                result: None,
                error: Some(e.to_string()),
                response,
            },
        }
    }
}
