//! In-memory implementation of the search backend.
//!
//! Keeps documents in process, per collection and in insertion order, and evaluates the
//! rendered queries itself. Used as the test double for the client and for offline
//! runs of the walkthrough; it is not a search engine.

mod matcher;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use search_client_shared::Pagination;
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::batch::{EncodedBatch, EncodedOperation, OperationKind};
use crate::errors::SearchClientError;
use crate::interfaces::SearchBackend;
use crate::types::{
    ConnectionState, RawBulkResponse, RawDocument, RawHit, RawItemResult, RawSearchResponse,
    WireSearch,
};

pub use matcher::matches;

#[derive(Debug, Clone)]
struct StoredEntry {
    id: String,
    version: i64,
    source: Map<String, Value>,
}

/// In-memory backend.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use search_client_repository::{ConnectionConfig, InMemoryBackend, SearchClient};
/// use search_client_shared::Document;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = ConnectionConfig::new("local").with_endpoint("localhost:9200");
/// let client = SearchClient::new(Arc::new(InMemoryBackend::new()), config)?;
/// client.connect().await?;
/// client
///     .index_one("twitter", Some("1"), Document::new().with("user", "geyang"))
///     .await?;
/// assert!(client.get_one("twitter", "1").await?.is_some());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    collections: RwLock<BTreeMap<String, Vec<StoredEntry>>>,
    connected: AtomicBool,
    unavailable: AtomicBool,
    latency: Option<Duration>,
}

impl InMemoryBackend {
    /// Create an empty, available backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every data call by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Switch availability. An unavailable backend refuses connections and fails every
    /// call with a transport error.
    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    /// Returns true if the backend is available.
    pub fn is_available(&self) -> bool {
        !self.unavailable.load(Ordering::SeqCst)
    }

    /// Number of documents stored in `collection`.
    pub async fn document_count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// Guard shared by every data call: availability, connection, latency.
    async fn enter(&self) -> Result<(), SearchClientError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if !self.is_available() {
            return Err(SearchClientError::transport("In-memory backend is unavailable"));
        }
        if !self.connected.load(Ordering::SeqCst) {
            return Err(SearchClientError::not_connected(ConnectionState::Disconnected));
        }
        Ok(())
    }
}

/// Apply one operation to the store.
fn apply(
    collections: &mut BTreeMap<String, Vec<StoredEntry>>,
    operation: &EncodedOperation,
) -> RawItemResult {
    let entries = match operation.kind {
        OperationKind::Index => collections.entry(operation.collection.clone()).or_default(),
        OperationKind::Update | OperationKind::Delete => {
            match collections.get_mut(&operation.collection) {
                Some(entries) => entries,
                None => return missing(operation),
            }
        }
    };
    let position = operation
        .id
        .as_ref()
        .and_then(|id| entries.iter().position(|e| &e.id == id));
    let source = operation
        .source
        .as_ref()
        .map(|s| s.as_map().clone())
        .unwrap_or_default();

    match (operation.kind, position) {
        (OperationKind::Index, Some(pos)) => {
            let entry = &mut entries[pos];
            entry.version += 1;
            entry.source = source;
            written(&entry.id, entry.version, "updated")
        }
        (OperationKind::Index, None) => {
            let id = operation
                .id
                .clone()
                .unwrap_or_else(|| Uuid::new_v4().simple().to_string());
            entries.push(StoredEntry {
                id: id.clone(),
                version: 1,
                source,
            });
            written(&id, 1, "created")
        }
        (OperationKind::Update, Some(pos)) => {
            let entry = &mut entries[pos];
            let mut merged = entry.source.clone();
            merge(&mut merged, source);
            if merged == entry.source {
                return written(&entry.id, entry.version, "noop");
            }
            entry.version += 1;
            entry.source = merged;
            written(&entry.id, entry.version, "updated")
        }
        (OperationKind::Delete, Some(pos)) => {
            let entry = entries.remove(pos);
            written(&entry.id, entry.version + 1, "deleted")
        }
        (OperationKind::Update | OperationKind::Delete, None) => missing(operation),
    }
}

/// Outcome of an update or delete whose target document does not exist.
fn missing(operation: &EncodedOperation) -> RawItemResult {
    match operation.kind {
        OperationKind::Delete => RawItemResult::Succeeded {
            id: operation.id.clone(),
            version: None,
            result: Some("not_found".to_string()),
        },
        OperationKind::Index | OperationKind::Update => {
            let id = operation.id.clone().unwrap_or_default();
            RawItemResult::Failed {
                reason: format!("[{}]: document missing", id),
                id: Some(id),
                status: 404,
                error_type: "document_missing_exception".to_string(),
            }
        }
    }
}

fn written(id: &str, version: i64, result: &str) -> RawItemResult {
    RawItemResult::Succeeded {
        id: Some(id.to_string()),
        version: Some(version),
        result: Some(result.to_string()),
    }
}

/// Merge `partial` into `target`; nested objects merge recursively.
fn merge(target: &mut Map<String, Value>, partial: Map<String, Value>) {
    for (key, value) in partial {
        match (target.get_mut(&key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => merge(existing, incoming),
            (_, value) => {
                target.insert(key, value);
            }
        }
    }
}

#[async_trait]
impl SearchBackend for InMemoryBackend {
    async fn connect(&self) -> Result<(), SearchClientError> {
        if !self.is_available() {
            return Err(SearchClientError::connection("In-memory backend is unavailable"));
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&self) -> Result<(), SearchClientError> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn submit_bulk(&self, batch: &EncodedBatch) -> Result<RawBulkResponse, SearchClientError> {
        self.enter().await?;
        let mut collections = self.collections.write().await;
        let items = batch
            .operations
            .iter()
            .map(|operation| apply(&mut collections, operation))
            .collect();
        debug!(operations = batch.len(), "In-memory bulk applied");
        Ok(RawBulkResponse { took_ms: 0, items })
    }

    async fn execute_query(
        &self,
        search: &WireSearch,
        page: Pagination,
    ) -> Result<RawSearchResponse, SearchClientError> {
        self.enter().await?;
        let collections = self.collections.read().await;

        let mut hits = Vec::new();
        for (name, entries) in collections.iter() {
            if !search.collections.is_empty() && !search.collections.contains(name) {
                continue;
            }
            for entry in entries {
                if !matches(search.query.as_json(), &entry.source)? {
                    continue;
                }
                if let Some(filter) = &search.post_filter {
                    if !matches(filter.as_json(), &entry.source)? {
                        continue;
                    }
                }
                hits.push(RawHit {
                    collection: name.clone(),
                    id: entry.id.clone(),
                    score: Some(1.0),
                    source: entry.source.clone(),
                });
            }
        }

        let total = hits.len() as u64;
        let hits = hits
            .into_iter()
            .skip(page.from as usize)
            .take(page.size as usize)
            .collect();
        Ok(RawSearchResponse {
            took_ms: 0,
            total,
            hits,
        })
    }

    async fn get(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<RawDocument>, SearchClientError> {
        self.enter().await?;
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|entries| entries.iter().find(|e| e.id == id))
            .map(|entry| RawDocument {
                collection: collection.to_string(),
                id: entry.id.clone(),
                version: Some(entry.version),
                source: entry.source.clone(),
            }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::{BulkBatch, WriteOperation};
    use crate::codec::DocumentCodec;
    use search_client_shared::query::{range, render, render_match_all, term};
    use search_client_shared::Document;

    async fn connected() -> InMemoryBackend {
        let backend = InMemoryBackend::new();
        backend.connect().await.unwrap();
        backend
    }

    fn encode(operations: Vec<WriteOperation>) -> EncodedBatch {
        let mut batch = BulkBatch::new();
        for op in operations {
            batch.add(op).unwrap();
        }
        batch.encode(&DocumentCodec::new()).unwrap()
    }

    fn tweet(user: &str, age: i64) -> Document {
        Document::new().with("user", user).with("age", age)
    }

    #[tokio::test]
    async fn test_index_get_update_delete() {
        let backend = connected().await;

        let response = backend
            .submit_bulk(&encode(vec![WriteOperation::index(
                "twitter",
                "1",
                tweet("geyang", 20),
            )]))
            .await
            .unwrap();
        assert_eq!(response.items[0], written("1", 1, "created"));

        let update = encode(vec![WriteOperation::update(
            "twitter",
            "1",
            Document::new().with("age", 21),
        )]);
        let item = backend.update_one(&update.operations[0]).await.unwrap();
        assert_eq!(item, written("1", 2, "updated"));

        let stored = backend.get("twitter", "1").await.unwrap().unwrap();
        assert_eq!(stored.version, Some(2));
        assert_eq!(stored.source.get("user"), Some(&Value::from("geyang")));
        assert_eq!(stored.source.get("age"), Some(&Value::from(21)));

        let delete = encode(vec![WriteOperation::delete("twitter", "1")]);
        let item = backend.delete_one(&delete.operations[0]).await.unwrap();
        assert_eq!(item, written("1", 3, "deleted"));
        assert!(backend.get("twitter", "1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_noop_keeps_version() {
        let backend = connected().await;
        backend
            .submit_bulk(&encode(vec![WriteOperation::index(
                "twitter",
                "1",
                tweet("a", 1),
            )]))
            .await
            .unwrap();

        let response = backend
            .submit_bulk(&encode(vec![WriteOperation::update(
                "twitter",
                "1",
                Document::new().with("age", 1),
            )]))
            .await
            .unwrap();
        assert_eq!(response.items[0], written("1", 1, "noop"));
    }

    #[tokio::test]
    async fn test_missing_documents() {
        let backend = connected().await;
        let response = backend
            .submit_bulk(&encode(vec![
                WriteOperation::update("twitter", "9", tweet("a", 1)),
                WriteOperation::delete("twitter", "9"),
            ]))
            .await
            .unwrap();

        assert!(matches!(
            &response.items[0],
            RawItemResult::Failed { status: 404, error_type, .. }
                if error_type == "document_missing_exception"
        ));
        assert_eq!(
            response.items[1],
            RawItemResult::Succeeded {
                id: Some("9".to_string()),
                version: None,
                result: Some("not_found".to_string()),
            }
        );
    }

    #[tokio::test]
    async fn test_missing_targets_leave_collections_untouched() {
        let backend = connected().await;
        backend
            .submit_bulk(&encode(vec![
                WriteOperation::update("twitter", "9", tweet("a", 1)),
                WriteOperation::delete("weibo", "9"),
            ]))
            .await
            .unwrap();
        assert!(backend.collections.read().await.is_empty());

        backend
            .submit_bulk(&encode(vec![WriteOperation::index("twitter", "1", tweet("a", 1))]))
            .await
            .unwrap();
        let collections = backend.collections.read().await;
        assert_eq!(collections.keys().collect::<Vec<_>>(), vec!["twitter"]);
    }

    #[tokio::test]
    async fn test_auto_id() {
        let backend = connected().await;
        let response = backend
            .submit_bulk(&encode(vec![
                WriteOperation::index_auto_id("twitter", tweet("a", 1)),
                WriteOperation::index_auto_id("twitter", tweet("b", 2)),
            ]))
            .await
            .unwrap();

        let first = response.items[0].id().unwrap().to_string();
        let second = response.items[1].id().unwrap().to_string();
        assert_ne!(first, second);
        assert_eq!(backend.document_count("twitter").await, 2);
    }

    #[tokio::test]
    async fn test_nested_update_merges() {
        let backend = connected().await;
        let doc = Document::new().with(
            "location",
            Document::new().with("city", "Shanghai").with("floor", 3),
        );
        backend
            .submit_bulk(&encode(vec![WriteOperation::index("twitter", "1", doc)]))
            .await
            .unwrap();
        backend
            .submit_bulk(&encode(vec![WriteOperation::update(
                "twitter",
                "1",
                Document::new().with("location", Document::new().with("floor", 4)),
            )]))
            .await
            .unwrap();

        let stored = backend.get("twitter", "1").await.unwrap().unwrap();
        let location = stored.source.get("location").unwrap();
        assert_eq!(location.get("city"), Some(&Value::from("Shanghai")));
        assert_eq!(location.get("floor"), Some(&Value::from(4)));
    }

    #[tokio::test]
    async fn test_execute_query_filters_and_pages() {
        let backend = connected().await;
        let ops = (0..5)
            .map(|i| WriteOperation::index("twitter", i.to_string(), tweet(&format!("geyang{}", i), 20 + i)))
            .chain([WriteOperation::index("other", "x", tweet("geyang0", 20))])
            .collect();
        backend.submit_bulk(&encode(ops)).await.unwrap();

        let all = WireSearch {
            collections: vec![],
            query: render_match_all(),
            post_filter: None,
        };
        let response = backend.execute_query(&all, Pagination::default()).await.unwrap();
        assert_eq!(response.total, 6);

        let scoped = WireSearch {
            collections: vec!["twitter".to_string()],
            query: render(&term("user", "geyang0")),
            post_filter: None,
        };
        let response = backend.execute_query(&scoped, Pagination::default()).await.unwrap();
        assert_eq!(response.total, 1);
        assert_eq!(response.hits[0].id, "0");

        let filtered = WireSearch {
            collections: vec!["twitter".to_string()],
            query: render_match_all(),
            post_filter: Some(render(&range("age", 21, 23))),
        };
        let page = Pagination { from: 1, size: 5 };
        let response = backend.execute_query(&filtered, page).await.unwrap();
        assert_eq!(response.total, 3);
        let ids: Vec<_> = response.hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["2", "3"]);
    }

    #[tokio::test]
    async fn test_unavailable() {
        let backend = connected().await;
        backend.set_available(false);

        let result = backend.get("twitter", "1").await;
        assert!(matches!(result, Err(SearchClientError::TransportError(_))));

        backend.close().await.unwrap();
        assert!(matches!(
            backend.connect().await,
            Err(SearchClientError::ConnectionError(_))
        ));

        backend.set_available(true);
        assert!(backend.connect().await.is_ok());
    }

    #[tokio::test]
    async fn test_calls_require_connect() {
        let backend = InMemoryBackend::new();
        assert!(matches!(
            backend.get("twitter", "1").await,
            Err(SearchClientError::NotConnectedError(_))
        ));
    }
}
