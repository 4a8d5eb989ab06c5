//! Deployment client errors

use thiserror::Error;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Failure of a call to the deployment API
#[derive(Debug, Error)]
pub enum ClientError {
    /// The request never produced a response
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// The service answered with a non-success status
    #[error("API error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    /// The response body could not be read
    #[error("Failed to read response body: {0}")]
    ResponseBody(#[source] reqwest::Error),
}

impl ClientError {
    pub fn api_error(status: u16, message: impl Into<String>) -> Self {
        Self::ApiError {
            status,
            message: message.into(),
        }
    }
}
