//! Search client error types.
//!
//! This module defines the unified error type for all search client operations,
//! including local validation errors, connection-state errors and backend errors.
//!
//! Per-item failures inside a bulk request are not errors: they are reported as data in
//! [`BulkItemResult`](crate::types::BulkItemResult).

use thiserror::Error;

use crate::types::ConnectionState;

/// Unified errors from search client operations.
///
/// Used by the `SearchBackend` trait and `SearchClient` for all operations. Local errors
/// (encoding, invalid operations, invalid arguments) are never worth retrying; transport
/// errors may be.
#[derive(Debug, Clone, Error)]
pub enum SearchClientError {
    /// A document could not be encoded or decoded.
    #[error("Encoding error: {0}")]
    EncodingError(String),

    /// A write operation is malformed (payload on delete, missing payload, missing id).
    #[error("Invalid operation: {0}")]
    InvalidOperationError(String),

    /// A caller-supplied argument is invalid (negative pagination, empty field name).
    #[error("Invalid argument: {0}")]
    InvalidArgumentError(String),

    /// The operation needs a connected client.
    #[error("Not connected (state: {0})")]
    NotConnectedError(ConnectionState),

    /// A connection transition was requested while another one is in progress.
    #[error("Invalid connection state: {0}")]
    InvalidState(String),

    /// The backend response does not correspond to the request.
    #[error("Protocol violation: expected {expected} items, backend returned {actual}")]
    ProtocolViolationError { expected: usize, actual: usize },

    /// Connection configuration is invalid.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Failed to establish a connection to the backend.
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// A backend call failed as a whole.
    #[error("Transport error: {0}")]
    TransportError(String),

    /// A backend call did not complete in time.
    #[error("Operation timed out after {0} ms")]
    Timeout(u64),

    /// Failed to parse a response from the backend.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Failed to serialize a request for the backend.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Batch size exceeds configured maximum.
    #[error("Batch size {provided} exceeds maximum {max}")]
    BatchSizeExceeded { provided: usize, max: usize },
}

impl SearchClientError {
    /// Create an encoding error.
    pub fn encoding(msg: impl Into<String>) -> Self {
        Self::EncodingError(msg.into())
    }

    /// Create an invalid operation error.
    pub fn invalid_operation(msg: impl Into<String>) -> Self {
        Self::InvalidOperationError(msg.into())
    }

    /// Create an invalid argument error.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgumentError(msg.into())
    }

    /// Create a not connected error for the given state.
    pub fn not_connected(state: ConnectionState) -> Self {
        Self::NotConnectedError(state)
    }

    /// Create an invalid state error.
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    /// Create a protocol violation error.
    pub fn protocol_violation(expected: usize, actual: usize) -> Self {
        Self::ProtocolViolationError { expected, actual }
    }

    /// Create a configuration error.
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::ConfigurationError(msg.into())
    }

    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::ConnectionError(msg.into())
    }

    /// Create a transport error.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::TransportError(msg.into())
    }

    /// Create a timeout error.
    pub fn timeout(after: std::time::Duration) -> Self {
        Self::Timeout(after.as_millis() as u64)
    }

    /// Create a parse error.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::ParseError(msg.into())
    }

    /// Create a serialization error.
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::SerializationError(msg.into())
    }

    /// Create a batch size exceeded error.
    pub fn batch_size_exceeded(provided: usize, max: usize) -> Self {
        Self::BatchSizeExceeded { provided, max }
    }

    /// Whether repeating the same call could succeed.
    ///
    /// Only connection, transport and timeout errors qualify. A protocol violation is
    /// never retryable: the response cannot be attributed to the request.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ConnectionError(_) | Self::TransportError(_) | Self::Timeout(_)
        )
    }
}

impl From<serde_json::Error> for SearchClientError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_retryable_errors() {
        assert!(SearchClientError::connection("refused").is_retryable());
        assert!(SearchClientError::transport("reset").is_retryable());
        assert!(SearchClientError::timeout(Duration::from_secs(1)).is_retryable());

        assert!(!SearchClientError::protocol_violation(2, 1).is_retryable());
        assert!(!SearchClientError::encoding("NaN").is_retryable());
        assert!(!SearchClientError::invalid_argument("from").is_retryable());
        assert!(!SearchClientError::not_connected(ConnectionState::Disconnected).is_retryable());
    }

    #[test]
    fn test_display() {
        assert_eq!(
            SearchClientError::protocol_violation(2, 3).to_string(),
            "Protocol violation: expected 2 items, backend returned 3"
        );
        assert_eq!(
            SearchClientError::not_connected(ConnectionState::Closing).to_string(),
            "Not connected (state: closing)"
        );
        assert_eq!(
            SearchClientError::timeout(Duration::from_millis(1500)).to_string(),
            "Operation timed out after 1500 ms"
        );
    }
}
