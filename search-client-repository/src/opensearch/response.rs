//! Wire types for OpenSearch REST responses.
//!
//! Only the fields the backend needs are declared; everything else in the response is
//! ignored. Both the pre-7.x (`"total": 3`) and current (`"total": {"value": 3}`) hit
//! total shapes are accepted.

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::types::{RawDocument, RawHit, RawItemResult, RawSearchResponse};

/// Response to `POST _bulk`.
#[derive(Debug, Deserialize)]
pub struct BulkResponse {
    #[serde(default)]
    pub took: u64,
    #[serde(default)]
    pub errors: bool,
    #[serde(default)]
    pub items: Vec<BulkResponseItem>,
}

/// One entry of a bulk response, keyed by the action that produced it.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BulkResponseItem {
    Index(WriteStatus),
    Create(WriteStatus),
    Update(WriteStatus),
    Delete(WriteStatus),
}

impl BulkResponseItem {
    pub fn status(&self) -> &WriteStatus {
        match self {
            BulkResponseItem::Index(s)
            | BulkResponseItem::Create(s)
            | BulkResponseItem::Update(s)
            | BulkResponseItem::Delete(s) => s,
        }
    }

    pub fn into_raw(self) -> RawItemResult {
        match self {
            BulkResponseItem::Index(s)
            | BulkResponseItem::Create(s)
            | BulkResponseItem::Update(s)
            | BulkResponseItem::Delete(s) => s.into_raw(),
        }
    }
}

/// Outcome of a single write, as found in bulk items and in the body of the direct
/// index, update and delete endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct WriteStatus {
    #[serde(rename = "_index")]
    pub index: Option<String>,
    #[serde(rename = "_id")]
    pub id: Option<String>,
    #[serde(rename = "_version")]
    pub version: Option<i64>,
    pub result: Option<String>,
    #[serde(default)]
    pub status: u16,
    pub error: Option<ErrorBody>,
}

impl WriteStatus {
    /// Convert to a raw item result.
    ///
    /// A delete of a missing document comes back as 404 with result `not_found` and no
    /// error; that is a success.
    pub fn into_raw(self) -> RawItemResult {
        let not_found = self.result.as_deref() == Some("not_found");
        match self.error {
            Some(error) => RawItemResult::Failed {
                id: self.id,
                status: self.status,
                error_type: error.error_type,
                reason: error.reason.unwrap_or_default(),
            },
            None if self.status >= 400 && !not_found => RawItemResult::Failed {
                id: self.id,
                status: self.status,
                error_type: String::new(),
                reason: format!("status {}", self.status),
            },
            None => RawItemResult::Succeeded {
                id: self.id,
                version: self.version,
                result: self.result,
            },
        }
    }
}

/// Error object attached to failed items and failed requests.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    #[serde(rename = "type", default)]
    pub error_type: String,
    pub reason: Option<String>,
}

/// Error envelope returned for a failed request.
#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
    #[serde(default)]
    pub status: u16,
}

/// Response to `POST <collections>/_search`.
#[derive(Debug, Deserialize)]
pub struct SearchResponseBody {
    #[serde(default)]
    pub took: u64,
    pub hits: HitsBody,
}

#[derive(Debug, Deserialize)]
pub struct HitsBody {
    pub total: Option<TotalHits>,
    #[serde(default)]
    pub hits: Vec<HitBody>,
}

/// Hit total: a bare number before 7.x, an object since.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum TotalHits {
    Count(u64),
    Object { value: u64 },
}

impl TotalHits {
    pub fn value(&self) -> u64 {
        match self {
            TotalHits::Count(value) | TotalHits::Object { value } => *value,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct HitBody {
    #[serde(rename = "_index")]
    pub index: String,
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_score")]
    pub score: Option<f64>,
    #[serde(rename = "_source", default)]
    pub source: Map<String, Value>,
}

impl SearchResponseBody {
    pub fn into_raw(self) -> RawSearchResponse {
        let total = self
            .hits
            .total
            .as_ref()
            .map(TotalHits::value)
            .unwrap_or(self.hits.hits.len() as u64);
        RawSearchResponse {
            took_ms: self.took,
            total,
            hits: self
                .hits
                .hits
                .into_iter()
                .map(|hit| RawHit {
                    collection: hit.index,
                    id: hit.id,
                    score: hit.score,
                    source: hit.source,
                })
                .collect(),
        }
    }
}

/// Response to `GET <collection>/_doc/<id>`.
#[derive(Debug, Deserialize)]
pub struct GetResponseBody {
    #[serde(rename = "_index")]
    pub index: String,
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_version")]
    pub version: Option<i64>,
    #[serde(default)]
    pub found: bool,
    #[serde(rename = "_source", default)]
    pub source: Map<String, Value>,
}

impl GetResponseBody {
    pub fn into_raw(self) -> Option<RawDocument> {
        if !self.found {
            return None;
        }
        Some(RawDocument {
            collection: self.index,
            id: self.id,
            version: self.version,
            source: self.source,
        })
    }
}

/// Response to `GET /`.
#[derive(Debug, Deserialize)]
pub struct InfoResponse {
    pub cluster_name: String,
    #[serde(default)]
    pub version: Option<VersionInfo>,
}

#[derive(Debug, Deserialize)]
pub struct VersionInfo {
    pub number: Option<String>,
    pub distribution: Option<String>,
}

/// Build a raw item result for a direct write endpoint from its HTTP status and body.
///
/// The direct endpoints put the outcome in the HTTP status rather than in the body, and
/// failed requests carry an error envelope instead of a write status.
pub fn write_result(status: u16, body: Value) -> RawItemResult {
    if let Ok(envelope) = serde_json::from_value::<ErrorResponse>(body.clone()) {
        return RawItemResult::Failed {
            id: None,
            status,
            error_type: envelope.error.error_type,
            reason: envelope.error.reason.unwrap_or_default(),
        };
    }

    match serde_json::from_value::<WriteStatus>(body) {
        Ok(write) => WriteStatus { status, ..write }.into_raw(),
        Err(e) => RawItemResult::Failed {
            id: None,
            status,
            error_type: String::new(),
            reason: format!("unreadable response: {}", e),
        },
    }
}
