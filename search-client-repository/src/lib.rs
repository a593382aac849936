//! # Search Client Repository
//!
//! This crate provides the bulk document-indexing client: encoding documents, batching
//! write operations, reconciling per-item results, and the `SearchClient` façade that
//! owns the connection to a search backend. It includes definitions for errors, the
//! backend interface, and concrete implementations for OpenSearch and for an in-memory
//! store.

pub mod batch;
pub mod client;
pub mod codec;
pub mod config;
pub mod errors;
pub mod interfaces;
pub mod memory;
pub mod opensearch;
pub mod reconciler;
pub mod types;

pub use batch::{BulkBatch, EncodedBatch, EncodedOperation, OperationKind, WriteOperation};
pub use client::SearchClient;
pub use codec::{DocumentCodec, EncodedDocument};
pub use config::ConnectionConfig;
pub use errors::SearchClientError;
pub use interfaces::SearchBackend;
pub use memory::InMemoryBackend;
pub use opensearch::OpenSearchBackend;
pub use reconciler::BulkResultReconciler;
pub use types::{
    BulkItemResult, BulkSummary, ConnectionState, FailureCause, ItemStatus, RawBulkResponse,
    RawDocument, RawHit, RawItemResult, RawSearchResponse, StoredDocument, WireSearch,
};
