//! Write operations and bulk batches.
//!
//! A [`BulkBatch`] accumulates index, update and delete operations for different
//! collections and is submitted as a single backend request. The position returned by
//! [`BulkBatch::add`] is the key used later to correlate per-item results.

use std::fmt;

use search_client_shared::Document;
use serde_json::{json, Map, Value};

use crate::codec::{DocumentCodec, EncodedDocument};
use crate::errors::SearchClientError;

/// Kind of a write operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    /// Create or replace a whole document.
    Index,
    /// Merge fields into an existing document.
    Update,
    /// Remove a document.
    Delete,
}

impl OperationKind {
    /// Action name used in bulk requests.
    pub fn action(&self) -> &'static str {
        match self {
            OperationKind::Index => "index",
            OperationKind::Update => "update",
            OperationKind::Delete => "delete",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.action())
    }
}

/// One write operation against a collection.
///
/// Use the typed constructors ([`WriteOperation::index`], [`WriteOperation::update`],
/// [`WriteOperation::delete`]) where possible; [`WriteOperation::new`] accepts any
/// combination and leaves validation to [`BulkBatch::add`].
#[derive(Debug, Clone, PartialEq)]
pub struct WriteOperation {
    /// Operation kind.
    pub kind: OperationKind,
    /// Target collection.
    pub collection: String,
    /// Document id. `None` asks the backend to generate one (index only).
    pub id: Option<String>,
    /// Payload: full document for index, partial document for update, none for delete.
    pub document: Option<Document>,
}

impl WriteOperation {
    /// Assemble an operation from parts without validating it.
    pub fn new(
        kind: OperationKind,
        collection: impl Into<String>,
        id: Option<String>,
        document: Option<Document>,
    ) -> Self {
        Self {
            kind,
            collection: collection.into(),
            id,
            document,
        }
    }

    /// Index `document` under `id`.
    pub fn index(collection: impl Into<String>, id: impl Into<String>, document: Document) -> Self {
        Self::new(OperationKind::Index, collection, Some(id.into()), Some(document))
    }

    /// Index `document` under an id generated by the backend.
    pub fn index_auto_id(collection: impl Into<String>, document: Document) -> Self {
        Self::new(OperationKind::Index, collection, None, Some(document))
    }

    /// Merge the fields of `partial` into the document `id`.
    pub fn update(collection: impl Into<String>, id: impl Into<String>, partial: Document) -> Self {
        Self::new(OperationKind::Update, collection, Some(id.into()), Some(partial))
    }

    /// Delete the document `id`.
    pub fn delete(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self::new(OperationKind::Delete, collection, Some(id.into()), None)
    }

    /// Check the operation's shape.
    ///
    /// # Errors
    ///
    /// * `InvalidOperationError` - empty collection, empty id, payload on a delete,
    ///   missing payload on index/update, or missing id on update/delete
    pub fn validate(&self) -> Result<(), SearchClientError> {
        if self.collection.trim().is_empty() {
            return Err(SearchClientError::invalid_operation(
                "Collection name is required",
            ));
        }

        if matches!(&self.id, Some(id) if id.is_empty()) {
            return Err(SearchClientError::invalid_operation(
                "Document id cannot be empty; omit it to request a generated id",
            ));
        }

        match (self.kind, &self.document) {
            (OperationKind::Delete, Some(_)) => Err(SearchClientError::invalid_operation(
                "Delete operations cannot carry a document",
            )),
            (OperationKind::Index | OperationKind::Update, None) => {
                Err(SearchClientError::invalid_operation(format!(
                    "{} operations require a document",
                    self.kind
                )))
            }
            (OperationKind::Update | OperationKind::Delete, _) if self.id.is_none() => {
                Err(SearchClientError::invalid_operation(format!(
                    "{} operations require a document id",
                    self.kind
                )))
            }
            _ => Ok(()),
        }
    }

    fn encode(&self, codec: &DocumentCodec) -> Result<EncodedOperation, SearchClientError> {
        let source = self
            .document
            .as_ref()
            .map(|doc| codec.encode(doc))
            .transpose()?;

        Ok(EncodedOperation {
            kind: self.kind,
            collection: self.collection.clone(),
            id: self.id.clone(),
            source,
        })
    }
}

/// Ordered, append-only sequence of write operations.
///
/// Submitting a batch consumes it, so a submitted batch cannot be extended.
///
/// # Example
///
/// ```
/// use search_client_repository::{BulkBatch, WriteOperation};
/// use search_client_shared::Document;
///
/// let mut batch = BulkBatch::new();
/// let first = batch
///     .add(WriteOperation::index("twitter", "1", Document::new().with("user", "a")))
///     .unwrap();
/// let second = batch.add(WriteOperation::delete("twitter", "1")).unwrap();
///
/// assert_eq!((first, second), (0, 1));
/// assert_eq!(batch.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkBatch {
    operations: Vec<WriteOperation>,
}

impl BulkBatch {
    /// Create an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty batch with room for `capacity` operations.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            operations: Vec::with_capacity(capacity),
        }
    }

    /// Append an operation and return its zero-based position.
    ///
    /// # Errors
    ///
    /// * `InvalidOperationError` - if the operation fails [`WriteOperation::validate`];
    ///   the batch is left unchanged
    pub fn add(&mut self, operation: WriteOperation) -> Result<usize, SearchClientError> {
        operation.validate()?;
        self.operations.push(operation);
        Ok(self.operations.len() - 1)
    }

    /// Returns true if the batch holds no operations.
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Number of operations.
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Number of operations.
    pub fn size(&self) -> usize {
        self.len()
    }

    /// Operation at `index`.
    pub fn get(&self, index: usize) -> Option<&WriteOperation> {
        self.operations.get(index)
    }

    /// All operations in order.
    pub fn operations(&self) -> &[WriteOperation] {
        &self.operations
    }

    /// Encode every operation's payload.
    ///
    /// # Errors
    ///
    /// * `EncodingError` - if any document fails to encode; nothing is sent
    pub fn encode(&self, codec: &DocumentCodec) -> Result<EncodedBatch, SearchClientError> {
        let operations = self
            .operations
            .iter()
            .map(|op| op.encode(codec))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(EncodedBatch { operations })
    }
}

/// A write operation with its payload in wire form.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedOperation {
    /// Operation kind.
    pub kind: OperationKind,
    /// Target collection.
    pub collection: String,
    /// Document id, if supplied.
    pub id: Option<String>,
    /// Encoded payload.
    pub source: Option<EncodedDocument>,
}

impl EncodedOperation {
    /// Action line of the bulk request, e.g. `{"index":{"_index":"twitter","_id":"1"}}`.
    pub fn action_line(&self) -> Value {
        let mut meta = Map::new();
        meta.insert("_index".to_string(), json!(self.collection));
        if let Some(id) = &self.id {
            meta.insert("_id".to_string(), json!(id));
        }
        let mut action = Map::new();
        action.insert(self.kind.action().to_string(), Value::Object(meta));
        Value::Object(action)
    }

    /// Source line of the bulk request. Updates wrap the partial document in `doc`.
    pub fn source_line(&self) -> Option<Value> {
        let source = self.source.as_ref()?.to_value();
        match self.kind {
            OperationKind::Update => Some(json!({ "doc": source })),
            _ => Some(source),
        }
    }

    /// Bulk request lines for this operation.
    pub fn to_bulk_lines(&self) -> Vec<Value> {
        let mut lines = vec![self.action_line()];
        lines.extend(self.source_line());
        lines
    }
}

/// A batch ready to be sent to a backend.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EncodedBatch {
    /// Encoded operations, in batch order.
    pub operations: Vec<EncodedOperation>,
}

impl EncodedBatch {
    /// A batch holding a single operation.
    pub fn single(operation: EncodedOperation) -> Self {
        Self {
            operations: vec![operation],
        }
    }

    /// Number of operations.
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Returns true if the batch holds no operations.
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// All bulk request lines, in order.
    pub fn to_bulk_lines(&self) -> Vec<Value> {
        self.operations
            .iter()
            .flat_map(EncodedOperation::to_bulk_lines)
            .collect()
    }

    /// Newline-delimited JSON body of the bulk request, with the trailing newline.
    pub fn to_ndjson(&self) -> String {
        let mut body = String::new();
        for line in self.to_bulk_lines() {
            body.push_str(&line.to_string());
            body.push('\n');
        }
        body
    }
}
