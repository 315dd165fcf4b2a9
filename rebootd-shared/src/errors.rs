//! Error types used across the reboot coordination crates.

use thiserror::Error;

/// Result type for reboot coordination operations.
pub type RebootResult<T> = Result<T, RebootError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RebootError {
    /// Caller identity is not authorized for the target node or operation.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Target node (or facade) does not exist or is no longer alive.
    #[error("not found: {0}")]
    NotFound(String),

    /// The flag store could not be reached or failed mid-operation.
    #[error("flag store unavailable: {0}")]
    StoreUnavailable(String),

    /// The OS shutdown primitive reported a failure.
    #[error("OS action failed: {0}")]
    OsActionFailed(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl RebootError {
    /// Whether a caller may reasonably retry the failed operation as-is.
    ///
    /// Only store outages are transient; permission and lookup failures
    /// will fail the same way again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RebootError::StoreUnavailable(_))
    }

    pub fn is_permission_denied(&self) -> bool {
        matches!(self, RebootError::PermissionDenied(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, RebootError::NotFound(_))
    }
}

// Implement From for common error types to enable `?` operator
impl From<std::io::Error> for RebootError {
    fn from(err: std::io::Error) -> Self {
        RebootError::Internal(format!("I/O error: {}", err))
    }
}

impl From<serde_json::Error> for RebootError {
    fn from(err: serde_json::Error) -> Self {
        RebootError::Internal(format!("JSON error: {}", err))
    }
}

impl From<String> for RebootError {
    fn from(err: String) -> Self {
        RebootError::Internal(err)
    }
}

impl From<&str> for RebootError {
    fn from(err: &str) -> Self {
        RebootError::Internal(err.to_string())
    }
}
