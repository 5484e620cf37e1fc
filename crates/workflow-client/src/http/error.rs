/*
[INPUT]:  Error sources (HTTP, API status, serialization, auth, storage)
[OUTPUT]: Structured error types with status and auth classification
[POS]:    Error handling layer - unified error types for entire crate
[UPDATE]: When adding new error sources or improving error messages
*/

use reqwest::StatusCode;
use thiserror::Error;

/// Main error type for the workflow client
#[derive(Error, Debug)]
pub enum WorkflowError {
    /// HTTP request failed before a response arrived
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned a non-success status
    #[error("API error (status {code}): {message}")]
    Api { code: u16, message: String },

    /// Authentication could not be established or recovered
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// Refresh token is expired, a new login is required
    #[error("Refresh token expired, please log in again")]
    TokenExpired,

    /// Serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// URL parsing failed
    #[error("Invalid URL: {0}")]
    UrlParse(#[from] url::ParseError),

    /// Successful response whose body could not be decoded
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Credential persistence failed
    #[error("Storage error: {0}")]
    Storage(String),
}

impl WorkflowError {
    /// HTTP status carried by the error, if the server answered
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            WorkflowError::Api { code, .. } => StatusCode::from_u16(*code).ok(),
            WorkflowError::Http(err) => err.status(),
            _ => None,
        }
    }

    /// Check if the server rejected the request as unauthorized (401)
    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(StatusCode::UNAUTHORIZED)
    }

    /// Check if error indicates authentication failure
    pub fn is_auth_error(&self) -> bool {
        self.is_unauthorized()
            || matches!(
                self,
                WorkflowError::Authentication { .. } | WorkflowError::TokenExpired
            )
    }

    /// Create an API error from status code and message
    pub fn api_error(status: StatusCode, message: impl Into<String>) -> Self {
        WorkflowError::Api {
            code: status.as_u16(),
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for WorkflowError {
    fn from(err: std::io::Error) -> Self {
        WorkflowError::Storage(err.to_string())
    }
}

/// Result type alias for workflow client operations
pub type Result<T> = std::result::Result<T, WorkflowError>;
