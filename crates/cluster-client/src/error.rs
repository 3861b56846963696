//! Cluster client errors

use thiserror::Error;

/// Errors that can occur when talking to the cluster
#[derive(Debug, Error)]
pub enum ClusterError {
    /// Kubernetes API error that has no more specific variant
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    /// Object does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Object with the same key already exists
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Update was based on a stale resource version
    #[error("Conflict: {0}")]
    Conflict(String),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Object is missing required fields or a request is malformed
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// API server could not be reached or refused service
    #[error("Cluster unavailable: {0}")]
    Unavailable(String),
}

impl ClusterError {
    /// Whether the error means the object is absent
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClusterError::NotFound(_))
    }
}
