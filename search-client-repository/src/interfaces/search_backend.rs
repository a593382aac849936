//! Search backend trait definition.
//!
//! This module defines the abstract interface between `SearchClient` and the engine that
//! stores and searches documents, allowing for different backend implementations
//! (OpenSearch, an in-memory store for tests, etc.).

use async_trait::async_trait;

use search_client_shared::Pagination;

use crate::batch::{EncodedBatch, EncodedOperation};
use crate::errors::SearchClientError;
use crate::types::{RawBulkResponse, RawDocument, RawItemResult, RawSearchResponse, WireSearch};

/// Abstracts the underlying search engine.
///
/// Implementations are injected into `SearchClient` to enable dependency injection and
/// easy testing with mock implementations. Backends only move already encoded data:
/// encoding, validation and result reconciliation happen in the client.
///
/// A backend must answer a bulk request with exactly one item per submitted operation,
/// in submission order. Item-level failures are data inside [`RawBulkResponse`], not
/// errors; `Err` means the request failed as a whole.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Establish the transport session and verify the backend answers.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - If the backend is ready for use
    /// * `Err(SearchClientError)` - If no endpoint could be reached
    async fn connect(&self) -> Result<(), SearchClientError>;

    /// Release the transport session. The default does nothing.
    async fn close(&self) -> Result<(), SearchClientError> {
        Ok(())
    }

    /// Submit a batch of encoded operations as one request.
    ///
    /// # Returns
    ///
    /// * `Ok(RawBulkResponse)` - Per-item results in submission order
    /// * `Err(SearchClientError)` - If the request failed as a whole
    async fn submit_bulk(&self, batch: &EncodedBatch) -> Result<RawBulkResponse, SearchClientError>;

    /// Execute a rendered search and return one page of hits.
    async fn execute_query(
        &self,
        search: &WireSearch,
        page: Pagination,
    ) -> Result<RawSearchResponse, SearchClientError>;

    /// Fetch a document by id. Returns `Ok(None)` if it does not exist.
    async fn get(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<RawDocument>, SearchClientError>;

    /// Index a single document.
    ///
    /// The default routes through [`submit_bulk`](Self::submit_bulk) with one item.
    async fn index_one(&self, operation: &EncodedOperation) -> Result<RawItemResult, SearchClientError> {
        submit_single(self, operation).await
    }

    /// Apply a partial update to a single document.
    ///
    /// The default routes through [`submit_bulk`](Self::submit_bulk) with one item.
    async fn update_one(&self, operation: &EncodedOperation) -> Result<RawItemResult, SearchClientError> {
        submit_single(self, operation).await
    }

    /// Delete a single document.
    ///
    /// The default routes through [`submit_bulk`](Self::submit_bulk) with one item.
    async fn delete_one(&self, operation: &EncodedOperation) -> Result<RawItemResult, SearchClientError> {
        submit_single(self, operation).await
    }
}

/// Send one operation as a single-item bulk request.
async fn submit_single<B>(backend: &B, operation: &EncodedOperation) -> Result<RawItemResult, SearchClientError>
where
    B: SearchBackend + ?Sized,
{
    let response = backend
        .submit_bulk(&EncodedBatch::single(operation.clone()))
        .await?;
    let actual = response.items.len();
    let mut items = response.items.into_iter();
    match (items.next(), actual) {
        (Some(item), 1) => Ok(item),
        _ => Err(SearchClientError::protocol_violation(1, actual)),
    }
}
