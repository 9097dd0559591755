//! Cluster and notifier error types.

use thiserror::Error;

pub type ClusterResult<T> = Result<T, ClusterError>;

#[derive(Debug, Error)]
pub enum ClusterError {
    /// The instance disappeared before the delete reached it.
    #[error("instance {namespace}/{name} not found")]
    NotFound { namespace: String, name: String },

    #[error("cluster unavailable: {0}")]
    Unavailable(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid inventory: {0}")]
    Deserialize(#[from] serde_json::Error),
}

impl ClusterError {
    pub fn not_found(namespace: &str, name: &str) -> Self {
        Self::NotFound {
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("invalid webhook url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("webhook request failed: {0}")]
    Request(String),

    #[error("webhook returned status {0}")]
    Status(u16),

    #[error("webhook timed out")]
    Timeout,
}
