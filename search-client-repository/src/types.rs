//! Request and response types for search client operations.

use std::fmt;

use search_client_shared::{Document, WireQuery};
use serde_json::{Map, Value};

use crate::batch::OperationKind;

/// Lifecycle state of a `SearchClient` connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No connection. The initial and final state.
    #[default]
    Disconnected,
    /// A connect call is in flight.
    Connecting,
    /// Ready for operations.
    Connected,
    /// A close call is in flight.
    Closing,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Closing => "closing",
        };
        f.write_str(name)
    }
}

/// Per-item outcome as reported by the backend, before reconciliation.
///
/// One variant per outcome rather than one type per operation kind: index, update and
/// delete results all share this shape.
#[derive(Debug, Clone, PartialEq)]
pub enum RawItemResult {
    /// The backend applied the operation.
    Succeeded {
        /// Document id, including ids generated by the backend.
        id: Option<String>,
        /// Document version after the operation.
        version: Option<i64>,
        /// Backend result keyword ("created", "updated", "deleted", "not_found", "noop").
        result: Option<String>,
    },
    /// The backend rejected the operation.
    Failed {
        /// Document id, when the backend reports one.
        id: Option<String>,
        /// HTTP-style status code of the item.
        status: u16,
        /// Backend error type, e.g. `version_conflict_engine_exception`.
        error_type: String,
        /// Human readable reason.
        reason: String,
    },
}

impl RawItemResult {
    /// Convenience constructor for a successful item.
    pub fn ok(id: impl Into<String>) -> Self {
        RawItemResult::Succeeded {
            id: Some(id.into()),
            version: None,
            result: None,
        }
    }

    /// Convenience constructor for a failed item.
    pub fn failed(status: u16, error_type: impl Into<String>, reason: impl Into<String>) -> Self {
        RawItemResult::Failed {
            id: None,
            status,
            error_type: error_type.into(),
            reason: reason.into(),
        }
    }

    /// Whether the backend reported success.
    pub fn is_success(&self) -> bool {
        matches!(self, RawItemResult::Succeeded { .. })
    }

    /// The id reported by the backend.
    pub fn id(&self) -> Option<&str> {
        match self {
            RawItemResult::Succeeded { id, .. } | RawItemResult::Failed { id, .. } => {
                id.as_deref()
            }
        }
    }
}

/// Raw response to a bulk request: one item per submitted operation, in order.
#[derive(Debug, Clone, PartialEq)]
pub struct RawBulkResponse {
    /// Time the backend spent on the request in milliseconds.
    pub took_ms: u64,
    /// Per-item results.
    pub items: Vec<RawItemResult>,
}

/// Caller-facing classification of a failed item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCause {
    /// The document changed concurrently; re-read and retry.
    VersionConflict,
    /// The operation or document was rejected (bad mapping, missing document).
    ValidationError,
    /// The backend could not take the operation right now.
    BackendUnavailable,
    /// Anything else.
    Unknown,
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureCause::VersionConflict => "version conflict",
            FailureCause::ValidationError => "validation error",
            FailureCause::BackendUnavailable => "backend unavailable",
            FailureCause::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Outcome of one operation after reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemStatus {
    /// The backend applied the operation.
    Succeeded,
    /// The backend rejected the operation.
    Failed(FailureCause),
    /// The outcome is unknown: the call was cancelled or timed out mid-flight.
    /// Re-read the document to find out what happened.
    Indeterminate,
}

/// Reconciled result of one operation in a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkItemResult {
    /// Zero-based position of the operation in its batch.
    pub operation_index: usize,
    /// Kind of the originating operation.
    pub kind: OperationKind,
    /// Target collection.
    pub collection: String,
    /// Document id: the backend-reported id if any, else the submitted one.
    pub id: Option<String>,
    /// Outcome.
    pub status: ItemStatus,
    /// Document version after the operation, when known.
    pub version: Option<i64>,
    /// Backend result keyword for successful items.
    pub result: Option<String>,
    /// Failure or indeterminate detail.
    pub error_detail: Option<String>,
}

impl BulkItemResult {
    /// Whether the operation succeeded.
    pub fn succeeded(&self) -> bool {
        self.status == ItemStatus::Succeeded
    }

    /// Whether the outcome is unknown.
    pub fn is_indeterminate(&self) -> bool {
        self.status == ItemStatus::Indeterminate
    }

    /// The failure cause, if the operation failed.
    pub fn failure_cause(&self) -> Option<FailureCause> {
        match self.status {
            ItemStatus::Failed(cause) => Some(cause),
            _ => None,
        }
    }
}

/// Summary of a bulk submission containing aggregate statistics and individual results.
///
/// Individual failures do not fail the submission; callers inspect `results` to handle
/// partial application.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkSummary {
    /// Total number of operations in the batch.
    pub total: usize,
    /// Number of successful operations.
    pub succeeded: usize,
    /// Number of failed operations.
    pub failed: usize,
    /// Number of operations with unknown outcome.
    pub indeterminate: usize,
    /// Backend processing time in milliseconds, 0 when unknown.
    pub took_ms: u64,
    /// Individual results, one per operation, in batch order.
    pub results: Vec<BulkItemResult>,
}

impl BulkSummary {
    /// Summary of an empty batch.
    pub fn empty() -> Self {
        Self {
            total: 0,
            succeeded: 0,
            failed: 0,
            indeterminate: 0,
            took_ms: 0,
            results: Vec::new(),
        }
    }

    /// Returns true if any operation failed.
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    /// Iterate over failed results.
    pub fn failures(&self) -> impl Iterator<Item = &BulkItemResult> {
        self.results
            .iter()
            .filter(|r| matches!(r.status, ItemStatus::Failed(_)))
    }
}

/// Search as executed by a backend: rendered query, optional post filter, targets.
#[derive(Debug, Clone, PartialEq)]
pub struct WireSearch {
    /// Collections to search. Empty searches all collections.
    pub collections: Vec<String>,
    /// Rendered scoring query.
    pub query: WireQuery,
    /// Rendered post filter.
    pub post_filter: Option<WireQuery>,
}

/// One hit as returned by the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct RawHit {
    /// Collection the document lives in.
    pub collection: String,
    /// Document id.
    pub id: String,
    /// Relevance score.
    pub score: Option<f64>,
    /// Stored source.
    pub source: Map<String, Value>,
}

/// Raw response to a search.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSearchResponse {
    /// Time the backend spent on the search in milliseconds.
    pub took_ms: u64,
    /// Total number of matching documents.
    pub total: u64,
    /// Hits for the requested page.
    pub hits: Vec<RawHit>,
}

/// Document as returned by a backend `get`.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDocument {
    /// Collection the document lives in.
    pub collection: String,
    /// Document id.
    pub id: String,
    /// Document version.
    pub version: Option<i64>,
    /// Stored source.
    pub source: Map<String, Value>,
}

/// Decoded document with its metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    /// Collection the document lives in.
    pub collection: String,
    /// Document id.
    pub id: String,
    /// Document version.
    pub version: Option<i64>,
    /// Decoded fields.
    pub document: Document,
}
