//! Search client implementation.
//!
//! This module provides the main client for interacting with a search backend.
//! Application code uses this to index, update, delete, fetch and search documents,
//! either one at a time or in bulk batches.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use search_client_shared::query::{render, render_match_all};
use search_client_shared::{Document, Query, SearchHit, SearchRequest, SearchResponse};
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};

use crate::batch::{BulkBatch, OperationKind, WriteOperation};
use crate::codec::DocumentCodec;
use crate::config::ConnectionConfig;
use crate::errors::SearchClientError;
use crate::interfaces::SearchBackend;
use crate::reconciler::BulkResultReconciler;
use crate::types::{BulkItemResult, BulkSummary, ConnectionState, StoredDocument, WireSearch};

/// The main client for interacting with a search backend.
///
/// This is the high-level API that application code should use. It owns the connection
/// lifecycle, validates and encodes input, bounds every backend call with the configured
/// timeouts, and reconciles backend responses into per-operation results. All operations
/// return `SearchClientError` for consistent error handling.
///
/// The client is `Send + Sync`; share it behind an `Arc` to issue operations
/// concurrently.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use search_client_repository::{ConnectionConfig, OpenSearchBackend, SearchClient};
/// use search_client_shared::Document;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = ConnectionConfig::new("elasticsearch-cluster-tst").with_endpoint("127.0.0.1:9200");
/// let backend = Arc::new(OpenSearchBackend::new(config.clone())?);
/// let client = SearchClient::new(backend, config)?;
///
/// client.connect().await?;
/// let result = client
///     .index_one("twitter", Some("1"), Document::new().with("user", "geyang"))
///     .await?;
/// assert!(result.succeeded());
/// client.close().await?;
/// # Ok(())
/// # }
/// ```
pub struct SearchClient {
    backend: Arc<dyn SearchBackend>,
    config: ConnectionConfig,
    codec: DocumentCodec,
    state: Mutex<ConnectionState>,
}

impl SearchClient {
    /// Create a new, disconnected client.
    ///
    /// # Errors
    ///
    /// * `ConfigurationError` - if `config` fails [`ConnectionConfig::validate`]
    pub fn new(
        backend: Arc<dyn SearchBackend>,
        config: ConnectionConfig,
    ) -> Result<Self, SearchClientError> {
        config.validate()?;
        Ok(Self {
            backend,
            config,
            codec: DocumentCodec::default(),
            state: Mutex::new(ConnectionState::Disconnected),
        })
    }

    /// Replace the document codec.
    pub fn with_codec(mut self, codec: DocumentCodec) -> Self {
        self.codec = codec;
        self
    }

    /// The configuration this client was created with.
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Current connection state.
    pub async fn state(&self) -> ConnectionState {
        *lock_state(&self.state)
    }

    /// Returns true if the client is ready for operations.
    pub async fn is_connected(&self) -> bool {
        self.state().await == ConnectionState::Connected
    }

    /// Connect to the backend.
    ///
    /// Connecting an already connected client is a no-op. The backend call is bounded by
    /// the configured connect timeout; on failure the client returns to
    /// `Disconnected` and may be connected again. Dropping the returned future before it
    /// completes also leaves the client `Disconnected`.
    ///
    /// # Errors
    ///
    /// * `InvalidState` - if a connect or close is already in progress
    /// * `ConnectionError` / `Timeout` - if the backend could not be reached
    pub async fn connect(&self) -> Result<(), SearchClientError> {
        let transition = {
            let mut state = lock_state(&self.state);
            match *state {
                ConnectionState::Connected => return Ok(()),
                ConnectionState::Connecting | ConnectionState::Closing => {
                    return Err(SearchClientError::invalid_state(format!(
                        "cannot connect while {}",
                        *state
                    )));
                }
                ConnectionState::Disconnected => *state = ConnectionState::Connecting,
            }
            Transition::new(&self.state)
        };

        info!(
            cluster = %self.config.cluster_name,
            endpoints = ?self.config.endpoints,
            "Connecting to search backend"
        );

        let result = match timeout(self.config.connect_timeout, self.backend.connect()).await {
            Ok(result) => result,
            Err(_) => Err(SearchClientError::timeout(self.config.connect_timeout)),
        };

        match &result {
            Ok(()) => {
                transition.finish(ConnectionState::Connected);
                info!(cluster = %self.config.cluster_name, "Connected to search backend");
            }
            Err(e) => {
                transition.finish(ConnectionState::Disconnected);
                warn!(error = %e, "Failed to connect to search backend");
            }
        }
        result
    }

    /// Close the connection.
    ///
    /// Closing a disconnected client is a no-op. The client ends up `Disconnected` even
    /// when the backend reports an error while closing, or when the returned future is
    /// dropped early; a backend error is returned.
    ///
    /// # Errors
    ///
    /// * `InvalidState` - if a connect or close is already in progress
    pub async fn close(&self) -> Result<(), SearchClientError> {
        let transition = {
            let mut state = lock_state(&self.state);
            match *state {
                ConnectionState::Disconnected => return Ok(()),
                ConnectionState::Connecting | ConnectionState::Closing => {
                    return Err(SearchClientError::invalid_state(format!(
                        "cannot close while {}",
                        *state
                    )));
                }
                ConnectionState::Connected => *state = ConnectionState::Closing,
            }
            Transition::new(&self.state)
        };

        let result = match timeout(self.config.request_timeout, self.backend.close()).await {
            Ok(result) => result,
            Err(_) => Err(SearchClientError::timeout(self.config.request_timeout)),
        };

        transition.finish(ConnectionState::Disconnected);
        match &result {
            Ok(()) => info!("Search backend connection closed"),
            Err(e) => warn!(error = %e, "Search backend reported an error while closing"),
        }
        result
    }

    /// Index a single document, replacing any existing document with the same id.
    ///
    /// With `id` set to `None` the backend generates one; it is reported in the
    /// returned result.
    ///
    /// # Returns
    ///
    /// * `Ok(BulkItemResult)` - The reconciled outcome; a backend rejection is a
    ///   `Failed` result, not an error
    /// * `Err(SearchClientError)` - If the client is not connected, the document cannot be
    ///   encoded, or the call failed as a whole
    pub async fn index_one(
        &self,
        collection: &str,
        id: Option<&str>,
        document: Document,
    ) -> Result<BulkItemResult, SearchClientError> {
        let operation = match id {
            Some(id) => WriteOperation::index(collection, id, document),
            None => WriteOperation::index_auto_id(collection, document),
        };
        self.submit_single(operation).await
    }

    /// Merge the fields of `partial` into the existing document `id`.
    ///
    /// Updating a missing document yields a `Failed` result with cause
    /// `ValidationError`.
    pub async fn update_one(
        &self,
        collection: &str,
        id: &str,
        partial: Document,
    ) -> Result<BulkItemResult, SearchClientError> {
        self.submit_single(WriteOperation::update(collection, id, partial))
            .await
    }

    /// Delete the document `id`.
    ///
    /// If the document doesn't exist, the operation is considered successful and the
    /// result keyword is `"not_found"`.
    pub async fn delete_one(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<BulkItemResult, SearchClientError> {
        self.submit_single(WriteOperation::delete(collection, id))
            .await
    }

    /// Fetch a document by id.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(StoredDocument))` - The decoded document and its metadata
    /// * `Ok(None)` - If the document does not exist
    /// * `Err(SearchClientError::Timeout)` - If the backend did not answer in time
    pub async fn get_one(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<StoredDocument>, SearchClientError> {
        self.ensure_connected().await?;
        if collection.trim().is_empty() {
            return Err(SearchClientError::invalid_argument(
                "Collection name is required",
            ));
        }
        if id.is_empty() {
            return Err(SearchClientError::invalid_argument("Document id is required"));
        }

        let raw = self
            .bounded(self.backend.get(collection, id))
            .await?;

        let Some(raw) = raw else {
            debug!(collection, id, "Document not found");
            return Ok(None);
        };

        let document = self.codec.decode_source(&raw.source)?;
        Ok(Some(StoredDocument {
            collection: raw.collection,
            id: raw.id,
            version: raw.version,
            document,
        }))
    }

    /// Submit a batch of write operations in a single backend request.
    ///
    /// Individual operation failures are reported in the summary rather than causing the
    /// entire submission to fail. If the backend does not answer within the request
    /// timeout, every operation is reported as indeterminate.
    ///
    /// # Returns
    ///
    /// * `Ok(BulkSummary)` - Aggregate counts and one result per operation, in order
    /// * `Err(SearchClientError::BatchSizeExceeded)` - If the batch exceeds the configured maximum
    /// * `Err(SearchClientError::ProtocolViolationError)` - If the response cannot be
    ///   matched to the batch
    /// * `Err(SearchClientError)` - If encoding or the request as a whole fails
    pub async fn submit_bulk(&self, batch: BulkBatch) -> Result<BulkSummary, SearchClientError> {
        self.submit_bulk_until(batch, std::future::pending()).await
    }

    /// Submit a batch, abandoning the request when `cancel` completes first.
    ///
    /// A cancelled submission may already have been applied in part or in full, so every
    /// operation is reported as indeterminate rather than failed.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use search_client_repository::{BulkBatch, SearchClient};
    /// # async fn example(client: &SearchClient, batch: BulkBatch) -> Result<(), Box<dyn std::error::Error>> {
    /// let (shutdown_tx, mut shutdown_rx) = tokio::sync::broadcast::channel::<()>(1);
    /// # drop(shutdown_tx);
    /// let summary = client
    ///     .submit_bulk_until(batch, async move {
    ///         let _ = shutdown_rx.recv().await;
    ///     })
    ///     .await?;
    /// println!("{} indeterminate", summary.indeterminate);
    /// # Ok(())
    /// # }
    /// ```
    #[instrument(skip_all, fields(operations = batch.len()))]
    pub async fn submit_bulk_until<F>(
        &self,
        batch: BulkBatch,
        cancel: F,
    ) -> Result<BulkSummary, SearchClientError>
    where
        F: Future<Output = ()> + Send,
    {
        self.ensure_connected().await?;

        if batch.is_empty() {
            return Ok(BulkSummary::empty());
        }

        self.validate_batch_size(batch.len())?;
        let encoded = batch.encode(&self.codec)?;

        let request = timeout(self.config.request_timeout, self.backend.submit_bulk(&encoded));
        let response = tokio::select! {
            outcome = request => match outcome {
                Ok(response) => response?,
                Err(_) => {
                    warn!(
                        timeout_ms = self.config.request_timeout.as_millis() as u64,
                        "Bulk request timed out; outcome of every operation is unknown"
                    );
                    return Ok(BulkResultReconciler::summarize(
                        BulkResultReconciler::indeterminate(&batch),
                        0,
                    ));
                }
            },
            _ = cancel => {
                warn!("Bulk request cancelled; outcome of every operation is unknown");
                return Ok(BulkResultReconciler::summarize(
                    BulkResultReconciler::indeterminate(&batch),
                    0,
                ));
            }
        };

        let results = BulkResultReconciler::reconcile(&batch, response.items)?;
        let summary = BulkResultReconciler::summarize(results, response.took_ms);

        if summary.has_failures() {
            warn!(
                total = summary.total,
                succeeded = summary.succeeded,
                failed = summary.failed,
                "Bulk request partially failed"
            );
        } else {
            info!(
                total = summary.total,
                took_ms = summary.took_ms,
                "Bulk request completed"
            );
        }
        Ok(summary)
    }

    /// Search every collection and return the matching documents of one page.
    ///
    /// # Errors
    ///
    /// * `InvalidArgumentError` - if `from` or `size` is negative or the query is malformed
    /// * `Timeout` - if the backend did not answer in time
    pub async fn search(
        &self,
        query: &Query,
        from: i64,
        size: i64,
    ) -> Result<Vec<Document>, SearchClientError> {
        let request = SearchRequest::new(query.clone()).from(from).size(size);
        Ok(self.search_request(request).await?.documents())
    }

    /// Execute a full search request.
    ///
    /// A request without a query matches every document; the post filter narrows the
    /// hits without affecting scoring.
    pub async fn search_request(
        &self,
        request: SearchRequest,
    ) -> Result<SearchResponse, SearchClientError> {
        self.ensure_connected().await?;
        request
            .validate()
            .map_err(SearchClientError::invalid_argument)?;
        let page = request
            .pagination()
            .map_err(SearchClientError::invalid_argument)?;

        let search = WireSearch {
            collections: request.collections,
            query: request
                .query
                .as_ref()
                .map(render)
                .unwrap_or_else(render_match_all),
            post_filter: request.post_filter.as_ref().map(render),
        };
        debug!(query = %search.query, from = page.from, size = page.size, "Executing search");

        let raw = self
            .bounded(self.backend.execute_query(&search, page))
            .await?;

        let hits = raw
            .hits
            .into_iter()
            .map(|hit| {
                Ok(SearchHit {
                    document: self.codec.decode_source(&hit.source)?,
                    collection: hit.collection,
                    id: hit.id,
                    score: hit.score,
                })
            })
            .collect::<Result<Vec<_>, SearchClientError>>()?;

        Ok(SearchResponse::new(hits, raw.total, raw.took_ms))
    }

    /// Check the connection state.
    async fn ensure_connected(&self) -> Result<(), SearchClientError> {
        let state = self.state().await;
        if state != ConnectionState::Connected {
            return Err(SearchClientError::not_connected(state));
        }
        Ok(())
    }

    /// Check if batch size exceeds the configured limit.
    fn validate_batch_size(&self, size: usize) -> Result<(), SearchClientError> {
        if let Some(max) = self.config.max_batch_size {
            if size > max {
                return Err(SearchClientError::batch_size_exceeded(size, max));
            }
        }
        Ok(())
    }

    /// Await a backend call, failing with `Timeout` after the request timeout.
    async fn bounded<T, Fut>(&self, call: Fut) -> Result<T, SearchClientError>
    where
        Fut: Future<Output = Result<T, SearchClientError>>,
    {
        timeout(self.config.request_timeout, call)
            .await
            .map_err(|_| SearchClientError::timeout(self.config.request_timeout))?
    }

    /// Send one operation through the backend's single-document call and reconcile it
    /// as a one-item batch.
    async fn submit_single(
        &self,
        operation: WriteOperation,
    ) -> Result<BulkItemResult, SearchClientError> {
        self.ensure_connected().await?;

        let mut batch = BulkBatch::with_capacity(1);
        batch.add(operation)?;
        let encoded = batch.encode(&self.codec)?;
        let operation = encoded
            .operations
            .first()
            .ok_or_else(|| SearchClientError::protocol_violation(1, 0))?;

        let call = async {
            match operation.kind {
                OperationKind::Index => self.backend.index_one(operation).await,
                OperationKind::Update => self.backend.update_one(operation).await,
                OperationKind::Delete => self.backend.delete_one(operation).await,
            }
        };

        let mut results = match timeout(self.config.request_timeout, call).await {
            Ok(raw) => BulkResultReconciler::reconcile(&batch, vec![raw?])?,
            Err(_) => {
                warn!(
                    kind = %operation.kind,
                    collection = %operation.collection,
                    "Request timed out; outcome is unknown"
                );
                BulkResultReconciler::indeterminate(&batch)
            }
        };

        let result = results
            .pop()
            .ok_or_else(|| SearchClientError::protocol_violation(1, 0))?;
        debug!(
            kind = %result.kind,
            collection = %result.collection,
            id = ?result.id,
            status = ?result.status,
            "Single operation completed"
        );
        Ok(result)
    }
}

/// The state cell is never held across an await, so a poisoned lock still holds a
/// consistent state.
fn lock_state(state: &Mutex<ConnectionState>) -> MutexGuard<'_, ConnectionState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// An in-progress connect or close.
///
/// Dropped without [`Transition::finish`], for example when the caller's future is
/// cancelled or times out, it puts the client back in `Disconnected`.
struct Transition<'a> {
    state: &'a Mutex<ConnectionState>,
    done: bool,
}

impl<'a> Transition<'a> {
    fn new(state: &'a Mutex<ConnectionState>) -> Self {
        Self { state, done: false }
    }

    fn finish(mut self, next: ConnectionState) {
        *lock_state(self.state) = next;
        self.done = true;
    }
}

impl Drop for Transition<'_> {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        let mut state = lock_state(self.state);
        warn!(from = %*state, "Connection transition abandoned before completing");
        *state = ConnectionState::Disconnected;
    }
}
