//! Error types for tracking operations
//!
//! Every failure surfaced to a tracking-API caller is a [`TrackingError`].
//! Errors are:
//! - **Typed**: the variant is the kind, see [`ErrorCode`]
//! - **Descriptive**: each variant carries a human-readable message
//! - **Serializable**: they can cross a process boundary unchanged
//!
//! # Categories
//!
//! | Kind | Raised when |
//! |------|-------------|
//! | `ResourceDoesNotExist` | Unknown experiment, run or tag; writes against a deleted run |
//! | `AlreadyExists` | Name collision on create or rename |
//! | `InvalidState` | Write against a terminal run, illegal status transition |
//! | `InvalidParameter` | Malformed filter, oversized page, stale token, param conflict |
//! | `Unavailable` | Transport failure or timeout talking to the metadata service |
//! | `Internal` | A graph node is missing a property the translator expects |
//! | `NotImplemented` | The backing deployment does not support an operation |

use serde::{Deserialize, Serialize};

/// Result type alias for tracking operations
pub type Result<T> = std::result::Result<T, TrackingError>;

/// Stable, machine-readable error kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Lookup of an unknown entity
    ResourceDoesNotExist,
    /// Name collision
    ResourceAlreadyExists,
    /// Operation not allowed in the entity's current state
    InvalidState,
    /// Caller supplied a bad argument
    InvalidParameterValue,
    /// Metadata service unreachable
    TemporarilyUnavailable,
    /// Unexpected translation failure
    InternalError,
    /// Operation unsupported by this deployment
    NotImplemented,
}

impl ErrorCode {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ResourceDoesNotExist => "RESOURCE_DOES_NOT_EXIST",
            ErrorCode::ResourceAlreadyExists => "RESOURCE_ALREADY_EXISTS",
            ErrorCode::InvalidState => "INVALID_STATE",
            ErrorCode::InvalidParameterValue => "INVALID_PARAMETER_VALUE",
            ErrorCode::TemporarilyUnavailable => "TEMPORARILY_UNAVAILABLE",
            ErrorCode::InternalError => "INTERNAL_ERROR",
            ErrorCode::NotImplemented => "NOT_IMPLEMENTED",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tracking operation errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
pub enum TrackingError {
    /// Experiment, run, metric or tag is unknown (or logically absent)
    #[error("resource does not exist: {message}")]
    ResourceDoesNotExist { message: String },

    /// Name collision on create
    #[error("resource already exists: {message}")]
    AlreadyExists { message: String },

    /// Write against a terminal or otherwise ineligible entity
    #[error("invalid state: {message}")]
    InvalidState { message: String },

    /// Malformed filter, oversized page, stale token, conflicting param
    #[error("invalid parameter: {message}")]
    InvalidParameter { message: String },

    /// Transport failure or timeout; safe to retry idempotent calls
    #[error("metadata service unavailable: {message}")]
    Unavailable { message: String },

    /// Bug or broken graph invariant
    #[error("internal error: {message}")]
    Internal { message: String },

    /// The deployment does not support this operation
    #[error("not implemented: {operation}")]
    NotImplemented { operation: String },
}

impl TrackingError {
    /// Unknown or logically absent resource
    pub fn not_found(message: impl Into<String>) -> Self {
        TrackingError::ResourceDoesNotExist {
            message: message.into(),
        }
    }

    /// Name collision
    pub fn already_exists(message: impl Into<String>) -> Self {
        TrackingError::AlreadyExists {
            message: message.into(),
        }
    }

    /// Operation not allowed in the current state
    pub fn invalid_state(message: impl Into<String>) -> Self {
        TrackingError::InvalidState {
            message: message.into(),
        }
    }

    /// Bad caller input
    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        TrackingError::InvalidParameter {
            message: message.into(),
        }
    }

    /// Transport failure
    pub fn unavailable(message: impl Into<String>) -> Self {
        TrackingError::Unavailable {
            message: message.into(),
        }
    }

    /// Unexpected translation failure
    pub fn internal(message: impl Into<String>) -> Self {
        TrackingError::Internal {
            message: message.into(),
        }
    }

    /// Unsupported operation
    pub fn not_implemented(operation: impl Into<String>) -> Self {
        TrackingError::NotImplemented {
            operation: operation.into(),
        }
    }

    /// The kind of this error
    pub fn code(&self) -> ErrorCode {
        match self {
            TrackingError::ResourceDoesNotExist { .. } => ErrorCode::ResourceDoesNotExist,
            TrackingError::AlreadyExists { .. } => ErrorCode::ResourceAlreadyExists,
            TrackingError::InvalidState { .. } => ErrorCode::InvalidState,
            TrackingError::InvalidParameter { .. } => ErrorCode::InvalidParameterValue,
            TrackingError::Unavailable { .. } => ErrorCode::TemporarilyUnavailable,
            TrackingError::Internal { .. } => ErrorCode::InternalError,
            TrackingError::NotImplemented { .. } => ErrorCode::NotImplemented,
        }
    }

    /// Whether an idempotent call that failed with this error may be retried
    pub fn is_retryable(&self) -> bool {
        matches!(self, TrackingError::Unavailable { .. })
    }
}

impl From<serde_json::Error> for TrackingError {
    fn from(e: serde_json::Error) -> Self {
        TrackingError::internal(format!("serialization error: {}", e))
    }
}
