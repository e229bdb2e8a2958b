//! Errors reported by a metadata graph client

use thiserror::Error;

/// Result type alias for graph calls
pub type GraphResult<T> = std::result::Result<T, GraphError>;

/// Graph client failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// Referenced node does not exist
    #[error("node not found: {what}")]
    NotFound { what: String },

    /// Server-side name uniqueness violated
    #[error("node already exists: {name}")]
    AlreadyExists { name: String },

    /// Transport failure
    #[error("metadata service unavailable: {reason}")]
    Unavailable { reason: String },

    /// Call exceeded its deadline; the outcome is unknown
    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    /// Capability not offered by this deployment
    #[error("operation not supported: {operation}")]
    Unsupported { operation: String },

    /// Malformed request
    #[error("invalid argument: {reason}")]
    InvalidArgument { reason: String },
}

impl GraphError {
    /// Whether the call may have reached the server
    pub fn is_ambiguous(&self) -> bool {
        matches!(
            self,
            GraphError::Unavailable { .. } | GraphError::Timeout { .. }
        )
    }
}
