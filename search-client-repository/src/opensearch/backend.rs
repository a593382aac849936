//! OpenSearch backend implementation.
//!
//! This module provides the concrete implementation of `SearchBackend`
//! using the OpenSearch Rust crate.

use async_trait::async_trait;
use opensearch::{
    http::{
        request::JsonBody,
        response::Response,
        transport::{SingleNodeConnectionPool, TransportBuilder},
        StatusCode,
    },
    BulkParts, DeleteParts, GetParts, IndexParts, OpenSearch, SearchParts, UpdateParts,
};
use search_client_shared::Pagination;
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::batch::{EncodedBatch, EncodedOperation, OperationKind};
use crate::config::ConnectionConfig;
use crate::errors::SearchClientError;
use crate::interfaces::SearchBackend;
use crate::opensearch::response::{
    write_result, BulkResponse, GetResponseBody, InfoResponse, SearchResponseBody,
};
use crate::types::{
    ConnectionState, RawBulkResponse, RawDocument, RawItemResult, RawSearchResponse, WireSearch,
};

/// OpenSearch backend implementation.
///
/// Talks to an OpenSearch (or Elasticsearch-compatible) cluster over its REST API. On
/// connect the configured endpoints are tried in order; the first one that answers a
/// ping (and reports the expected cluster name, when that check is on) is used for
/// every later call.
///
/// # Example
///
/// ```no_run
/// use search_client_repository::{ConnectionConfig, OpenSearchBackend, SearchBackend};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = ConnectionConfig::new("elasticsearch-cluster-tst")
///     .with_endpoints(["10.0.0.1:9200", "10.0.0.2:9200"]);
/// let backend = OpenSearchBackend::new(config)?;
/// backend.connect().await?;
/// # Ok(())
/// # }
/// ```
pub struct OpenSearchBackend {
    config: ConnectionConfig,
    endpoints: Vec<Url>,
    client: RwLock<Option<OpenSearch>>,
}

impl OpenSearchBackend {
    /// Create a new, unconnected OpenSearch backend.
    ///
    /// # Errors
    ///
    /// * `ConfigurationError` - if no endpoint is configured or one does not parse
    pub fn new(config: ConnectionConfig) -> Result<Self, SearchClientError> {
        let endpoints = config.endpoint_urls()?;
        Ok(Self {
            config,
            endpoints,
            client: RwLock::new(None),
        })
    }

    /// Build a client for one endpoint.
    fn build_client(&self, url: &Url) -> Result<OpenSearch, SearchClientError> {
        let conn_pool = SingleNodeConnectionPool::new(url.clone());
        let transport = TransportBuilder::new(conn_pool)
            .disable_proxy()
            .timeout(self.config.request_timeout)
            .build()
            .map_err(|e| SearchClientError::connection(e.to_string()))?;
        Ok(OpenSearch::new(transport))
    }

    /// Ping an endpoint and, if configured, check the cluster name it reports.
    async fn ping(&self, client: &OpenSearch) -> Result<(), SearchClientError> {
        let response = client
            .ping()
            .send()
            .await
            .map_err(|e| SearchClientError::connection(e.to_string()))?;
        if !response.status_code().is_success() {
            return Err(SearchClientError::connection(format!(
                "Ping failed with status {}",
                response.status_code()
            )));
        }

        if self.config.ignore_cluster_name {
            return Ok(());
        }

        let response = client
            .info()
            .send()
            .await
            .map_err(|e| SearchClientError::connection(e.to_string()))?;
        let info: InfoResponse = parse_json(response).await?;
        check_cluster_name(&self.config.cluster_name, &info)
    }

    /// The connected client.
    async fn client(&self) -> Result<OpenSearch, SearchClientError> {
        self.client
            .read()
            .await
            .clone()
            .ok_or(SearchClientError::not_connected(ConnectionState::Disconnected))
    }

    async fn write_one(
        &self,
        operation: &EncodedOperation,
    ) -> Result<RawItemResult, SearchClientError> {
        let client = self.client().await?;
        let collection = operation.collection.as_str();
        let id = operation.id.as_deref();
        let source = operation
            .source
            .as_ref()
            .map(|s| s.to_value())
            .unwrap_or_else(|| Value::Object(Map::new()));

        let sent = match (operation.kind, id) {
            (OperationKind::Index, Some(id)) => {
                client
                    .index(IndexParts::IndexId(collection, id))
                    .body(source)
                    .send()
                    .await
            }
            (OperationKind::Index, None) => {
                client
                    .index(IndexParts::Index(collection))
                    .body(source)
                    .send()
                    .await
            }
            (OperationKind::Update, Some(id)) => {
                client
                    .update(UpdateParts::IndexId(collection, id))
                    .body(json!({ "doc": source }))
                    .send()
                    .await
            }
            (OperationKind::Delete, Some(id)) => {
                client
                    .delete(DeleteParts::IndexId(collection, id))
                    .send()
                    .await
            }
            (kind, None) => {
                return Err(SearchClientError::invalid_operation(format!(
                    "{} operations require a document id",
                    kind
                )));
            }
        };

        let response = sent.map_err(|e| SearchClientError::transport(e.to_string()))?;
        let status = response.status_code().as_u16();
        let body: Value = response
            .json()
            .await
            .map_err(|e| SearchClientError::parse(e.to_string()))?;

        let result = write_result(status, body);
        debug!(
            kind = %operation.kind,
            collection = %collection,
            id = ?result.id(),
            status,
            "Document write completed"
        );
        Ok(result)
    }
}

#[async_trait]
impl SearchBackend for OpenSearchBackend {
    /// Connect to the first endpoint that answers.
    ///
    /// Endpoints are tried in order, each bounded by the connect timeout. The error of the
    /// last endpoint tried is returned when none answers.
    async fn connect(&self) -> Result<(), SearchClientError> {
        let mut last_error = SearchClientError::connection("No endpoints configured");

        for url in &self.endpoints {
            let client = self.build_client(url)?;
            let ping = tokio::time::timeout(self.config.connect_timeout, self.ping(&client));
            match ping.await {
                Ok(Ok(())) => {
                    *self.client.write().await = Some(client);
                    info!(
                        url = %url,
                        cluster = %self.config.cluster_name,
                        "Connected to OpenSearch"
                    );
                    return Ok(());
                }
                Ok(Err(e)) => {
                    warn!(url = %url, error = %e, "Endpoint unavailable, trying next");
                    last_error = e;
                }
                Err(_) => {
                    warn!(url = %url, "Endpoint timed out, trying next");
                    last_error = SearchClientError::timeout(self.config.connect_timeout);
                }
            }
        }

        error!(endpoints = ?self.config.endpoints, "No OpenSearch endpoint reachable");
        Err(last_error)
    }

    async fn close(&self) -> Result<(), SearchClientError> {
        self.client.write().await.take();
        debug!("OpenSearch client released");
        Ok(())
    }

    async fn submit_bulk(&self, batch: &EncodedBatch) -> Result<RawBulkResponse, SearchClientError> {
        let client = self.client().await?;

        let body: Vec<JsonBody<Value>> = batch
            .to_bulk_lines()
            .into_iter()
            .map(JsonBody::from)
            .collect();

        let response = client
            .bulk(BulkParts::None)
            .body(body)
            .send()
            .await
            .map_err(|e| SearchClientError::transport(e.to_string()))?;

        let parsed: BulkResponse = parse_json(response).await?;
        if parsed.errors {
            debug!(items = parsed.items.len(), "Bulk response reports item errors");
        }

        Ok(RawBulkResponse {
            took_ms: parsed.took,
            items: parsed.items.into_iter().map(|item| item.into_raw()).collect(),
        })
    }

    async fn execute_query(
        &self,
        search: &WireSearch,
        page: Pagination,
    ) -> Result<RawSearchResponse, SearchClientError> {
        let client = self.client().await?;
        let body = search_body(search, page);
        let collections: Vec<&str> = search.collections.iter().map(String::as_str).collect();
        let parts = if collections.is_empty() {
            SearchParts::None
        } else {
            SearchParts::Index(&collections)
        };

        let response = client
            .search(parts)
            .body(body)
            .send()
            .await
            .map_err(|e| SearchClientError::transport(e.to_string()))?;

        let parsed: SearchResponseBody = parse_json(response).await?;
        Ok(parsed.into_raw())
    }

    async fn get(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<RawDocument>, SearchClientError> {
        let client = self.client().await?;
        let response = client
            .get(GetParts::IndexId(collection, id))
            .send()
            .await
            .map_err(|e| SearchClientError::transport(e.to_string()))?;

        // 404 covers both a missing document and a missing collection.
        if response.status_code() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let parsed: GetResponseBody = parse_json(response).await?;
        Ok(parsed.into_raw())
    }

    async fn index_one(&self, operation: &EncodedOperation) -> Result<RawItemResult, SearchClientError> {
        self.write_one(operation).await
    }

    async fn update_one(&self, operation: &EncodedOperation) -> Result<RawItemResult, SearchClientError> {
        self.write_one(operation).await
    }

    async fn delete_one(&self, operation: &EncodedOperation) -> Result<RawItemResult, SearchClientError> {
        self.write_one(operation).await
    }
}

/// Request body for `_search`.
fn search_body(search: &WireSearch, page: Pagination) -> Value {
    let mut body = Map::new();
    body.insert("query".to_string(), search.query.as_json().clone());
    if let Some(filter) = &search.post_filter {
        body.insert("post_filter".to_string(), filter.as_json().clone());
    }
    body.insert("from".to_string(), json!(page.from));
    body.insert("size".to_string(), json!(page.size));
    Value::Object(body)
}

fn check_cluster_name(expected: &str, info: &InfoResponse) -> Result<(), SearchClientError> {
    if info.cluster_name != expected {
        return Err(SearchClientError::connection(format!(
            "Endpoint belongs to cluster '{}', expected '{}'",
            info.cluster_name, expected
        )));
    }
    Ok(())
}

/// Check the status of a response and deserialize its body.
async fn parse_json<T: DeserializeOwned>(response: Response) -> Result<T, SearchClientError> {
    let status = response.status_code();
    if !status.is_success() {
        let error_body = response.text().await.unwrap_or_default();
        error!(status = %status, body = %error_body, "OpenSearch request failed");
        return Err(SearchClientError::transport(format!(
            "Request failed with status {}: {}",
            status, error_body
        )));
    }

    response
        .json::<T>()
        .await
        .map_err(|e| SearchClientError::parse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use search_client_shared::query::{range, render, render_match_all, term};

    #[test]
    fn test_new_parses_endpoints() {
        let config =
            ConnectionConfig::new("tst").with_endpoints(["127.0.0.1:9200", "https://node-2:9243"]);
        let backend = OpenSearchBackend::new(config).unwrap();
        assert_eq!(backend.endpoints.len(), 2);
        assert_eq!(backend.endpoints[0].as_str(), "http://127.0.0.1:9200/");
    }

    #[test]
    fn test_new_rejects_missing_endpoints() {
        assert!(matches!(
            OpenSearchBackend::new(ConnectionConfig::new("tst")),
            Err(SearchClientError::ConfigurationError(_))
        ));
    }

    #[tokio::test]
    async fn test_calls_before_connect_fail() {
        let backend =
            OpenSearchBackend::new(ConnectionConfig::new("tst").with_endpoint("127.0.0.1:9200"))
                .unwrap();
        assert!(matches!(
            backend.get("twitter", "1").await,
            Err(SearchClientError::NotConnectedError(_))
        ));
    }

    #[test]
    fn test_search_body() {
        let search = WireSearch {
            collections: vec!["twitter".to_string()],
            query: render(&term("user", "geyang1")),
            post_filter: Some(render(&range("age", 10, 30))),
        };

        let body = search_body(&search, Pagination { from: 0, size: 60 });
        assert_eq!(
            body,
            json!({
                "query": { "term": { "user": "geyang1" } },
                "post_filter": { "range": { "age": { "gte": 10, "lte": 30 } } },
                "from": 0,
                "size": 60
            })
        );
    }

    #[test]
    fn test_search_body_match_all_without_filter() {
        let search = WireSearch {
            collections: vec![],
            query: render_match_all(),
            post_filter: None,
        };
        let body = search_body(&search, Pagination::default());
        assert_eq!(
            body,
            json!({ "query": { "match_all": {} }, "from": 0, "size": 10 })
        );
    }

    #[test]
    fn test_check_cluster_name() {
        let info: InfoResponse =
            serde_json::from_value(json!({ "cluster_name": "elasticsearch-cluster-tst" })).unwrap();
        assert!(check_cluster_name("elasticsearch-cluster-tst", &info).is_ok());
        assert!(matches!(
            check_cluster_name("other", &info),
            Err(SearchClientError::ConnectionError(_))
        ));
    }
}
