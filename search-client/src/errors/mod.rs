//! Error types for walkthrough steps.

use search_client_repository::SearchClientError;
use thiserror::Error;

/// Reasons a walkthrough step did not pass.
#[derive(Error, Debug)]
pub enum StepError {
    /// The client call itself failed.
    #[error("Client error: {0}")]
    ClientError(#[from] SearchClientError),

    /// The backend rejected an operation or left its outcome unknown.
    #[error("Rejected: {0}")]
    Rejected(String),

    /// The call succeeded but returned something other than expected.
    #[error("Unexpected result: {0}")]
    Unexpected(String),
}

impl StepError {
    /// Create a rejection error.
    pub fn rejected(msg: impl Into<String>) -> Self {
        Self::Rejected(msg.into())
    }

    /// Create an unexpected-result error.
    pub fn unexpected(msg: impl Into<String>) -> Self {
        Self::Unexpected(msg.into())
    }
}
