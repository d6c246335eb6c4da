//! Error types for provider calls.

use reqwest::StatusCode;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ComputeError>;

/// Errors returned by the compute, container and metadata clients.
#[derive(Debug, Error)]
pub enum ComputeError {
    /// The request never produced a response (connect, timeout, body read).
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider answered with a non-success status.
    #[error("api error: {status} - {body}")]
    Api { status: StatusCode, body: String },

    /// The metadata server answered with something other than 200.
    #[error("metadata server returned {status} for {path}")]
    Metadata { path: String, status: StatusCode },

    /// No cluster with the requested name exists in the project.
    #[error("cluster not found: {0}")]
    ClusterNotFound(String),

    /// A response body could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),
}

impl ComputeError {
    /// Returns true if the provider reported the resource as missing.
    pub fn is_not_found(&self) -> bool {
        match self {
            ComputeError::Api { status, .. } | ComputeError::Metadata { status, .. } => {
                *status == StatusCode::NOT_FOUND
            }
            ComputeError::ClusterNotFound(_) => true,
            _ => false,
        }
    }
}

impl From<serde_json::Error> for ComputeError {
    fn from(err: serde_json::Error) -> Self {
        ComputeError::Decode(err.to_string())
    }
}
