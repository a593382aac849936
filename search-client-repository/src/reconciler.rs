//! Bulk result reconciliation.
//!
//! Maps the backend's per-item response array back onto the submitted batch. Correlation
//! is strictly positional: item `i` of the response belongs to operation `i` of the
//! batch. Ids cannot be used because operations may have been submitted without one.

use crate::batch::BulkBatch;
use crate::errors::SearchClientError;
use crate::types::{BulkItemResult, BulkSummary, FailureCause, ItemStatus, RawItemResult};

const VERSION_CONFLICT_TYPES: &[&str] = &["version_conflict_engine_exception"];

const UNAVAILABLE_TYPES: &[&str] = &[
    "es_rejected_execution_exception",
    "unavailable_shards_exception",
    "cluster_block_exception",
    "node_not_connected_exception",
    "circuit_breaking_exception",
];

const VALIDATION_TYPES: &[&str] = &[
    "mapper_parsing_exception",
    "illegal_argument_exception",
    "document_parsing_exception",
    "document_missing_exception",
    "action_request_validation_exception",
    "strict_dynamic_mapping_exception",
];

/// Detail attached to every item of a cancelled or timed-out submission.
pub const INDETERMINATE_DETAIL: &str =
    "request was interrupted before the backend responded; outcome unknown";

/// Correlates raw backend results with the operations that produced them.
pub struct BulkResultReconciler;

impl BulkResultReconciler {
    /// Reconcile `raw` against `batch`.
    ///
    /// Returns exactly one result per operation, in batch order, with
    /// `operation_index == i` for the i-th result.
    ///
    /// # Errors
    ///
    /// * `ProtocolViolationError` - if the backend returned a different number of items
    ///   than the batch holds
    pub fn reconcile(
        batch: &BulkBatch,
        raw: Vec<RawItemResult>,
    ) -> Result<Vec<BulkItemResult>, SearchClientError> {
        if raw.len() != batch.len() {
            return Err(SearchClientError::protocol_violation(batch.len(), raw.len()));
        }

        Ok(batch
            .operations()
            .iter()
            .zip(raw)
            .enumerate()
            .map(|(index, (operation, item))| {
                let submitted_id = operation.id.clone();
                let (id, status, version, result, error_detail) = match item {
                    RawItemResult::Succeeded {
                        id,
                        version,
                        result,
                    } => (id, ItemStatus::Succeeded, version, result, None),
                    RawItemResult::Failed {
                        id,
                        status,
                        error_type,
                        reason,
                    } => {
                        let cause = Self::classify(status, &error_type);
                        let detail = format!("{} ({}): {}", error_type, status, reason);
                        (id, ItemStatus::Failed(cause), None, None, Some(detail))
                    }
                };

                BulkItemResult {
                    operation_index: index,
                    kind: operation.kind,
                    collection: operation.collection.clone(),
                    id: id.or(submitted_id),
                    status,
                    version,
                    result,
                    error_detail,
                }
            })
            .collect())
    }

    /// Results for a submission whose outcome is unknown: every item is
    /// [`ItemStatus::Indeterminate`].
    pub fn indeterminate(batch: &BulkBatch) -> Vec<BulkItemResult> {
        batch
            .operations()
            .iter()
            .enumerate()
            .map(|(index, operation)| BulkItemResult {
                operation_index: index,
                kind: operation.kind,
                collection: operation.collection.clone(),
                id: operation.id.clone(),
                status: ItemStatus::Indeterminate,
                version: None,
                result: None,
                error_detail: Some(INDETERMINATE_DETAIL.to_string()),
            })
            .collect()
    }

    /// Classify a failed item for reporting.
    ///
    /// The backend error type wins over the status code when both are recognised.
    pub fn classify(status: u16, error_type: &str) -> FailureCause {
        if VERSION_CONFLICT_TYPES.contains(&error_type) {
            return FailureCause::VersionConflict;
        }
        if UNAVAILABLE_TYPES.contains(&error_type) {
            return FailureCause::BackendUnavailable;
        }
        if VALIDATION_TYPES.contains(&error_type) {
            return FailureCause::ValidationError;
        }

        match status {
            409 => FailureCause::VersionConflict,
            429 | 502 | 503 | 504 => FailureCause::BackendUnavailable,
            400 | 404 => FailureCause::ValidationError,
            _ => FailureCause::Unknown,
        }
    }

    /// Aggregate reconciled results into a summary.
    pub fn summarize(results: Vec<BulkItemResult>, took_ms: u64) -> BulkSummary {
        let mut summary = BulkSummary {
            total: results.len(),
            took_ms,
            ..BulkSummary::empty()
        };
        for result in &results {
            match result.status {
                ItemStatus::Succeeded => summary.succeeded += 1,
                ItemStatus::Failed(_) => summary.failed += 1,
                ItemStatus::Indeterminate => summary.indeterminate += 1,
            }
        }
        summary.results = results;
        summary
    }
}
