//! Storage error types.
//!
//! Error definitions with expected-state / transient classification. The
//! provisioning engine converts `Conflict` into idempotent success at the
//! call sites that expect it, treats `NotFound` as "nothing to do" or
//! "re-provision" depending on context, and surfaces auth failures as a
//! service-level outage rather than a per-customer problem.

use thiserror::Error;

/// Error that can occur talking to the remote folder service.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The resource already exists in the state the call would create
    /// (folder already at that path, folder already shared).
    #[error("conflict: {message}")]
    Conflict { message: String },

    /// The addressed folder or shared folder does not exist.
    #[error("not found: {target}")]
    NotFound { target: String },

    /// Credentials were rejected by the remote service.
    #[error("authentication failed: invalid credentials")]
    AuthenticationFailed,

    /// Credentials have expired and must be refreshed.
    #[error("authentication failed: credentials expired")]
    CredentialsExpired,

    /// The remote service asked us to back off.
    #[error("rate limited by remote service")]
    RateLimited {
        /// Suggested wait before retrying, when the service provided one.
        retry_after_secs: Option<u64>,
    },

    /// The remote service is temporarily unavailable.
    #[error("remote service unavailable: {message}")]
    Unavailable { message: String },

    /// Any other remote failure.
    #[error("storage operation failed: {message}")]
    OperationFailed {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl StorageError {
    /// Expected-state conflict (already exists / already shared).
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, StorageError::Conflict { .. })
    }

    /// The addressed resource does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound { .. })
    }

    /// Credential problem; a service-level outage, not a per-customer one.
    #[must_use]
    pub fn is_auth(&self) -> bool {
        matches!(
            self,
            StorageError::AuthenticationFailed | StorageError::CredentialsExpired
        )
    }

    /// Whether retrying later may succeed without intervention.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StorageError::RateLimited { .. } | StorageError::Unavailable { .. }
        )
    }

    // Convenience constructors

    /// Create a conflict error.
    pub fn conflict(message: impl Into<String>) -> Self {
        StorageError::Conflict {
            message: message.into(),
        }
    }

    /// Create a not-found error.
    pub fn not_found(target: impl Into<String>) -> Self {
        StorageError::NotFound {
            target: target.into(),
        }
    }

    /// Create an unavailable error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        StorageError::Unavailable {
            message: message.into(),
        }
    }

    /// Create an operation-failed error.
    pub fn operation_failed(message: impl Into<String>) -> Self {
        StorageError::OperationFailed {
            message: message.into(),
            source: None,
        }
    }

    /// Create an operation-failed error with an underlying cause.
    pub fn operation_failed_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        StorageError::OperationFailed {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        assert!(StorageError::conflict("exists").is_conflict());
        assert!(StorageError::not_found("/x").is_not_found());
        assert!(StorageError::AuthenticationFailed.is_auth());
        assert!(StorageError::CredentialsExpired.is_auth());
        assert!(StorageError::RateLimited {
            retry_after_secs: Some(3)
        }
        .is_transient());
        assert!(StorageError::unavailable("down").is_transient());
        assert!(!StorageError::operation_failed("boom").is_transient());
        assert!(!StorageError::operation_failed("boom").is_conflict());
    }

    #[test]
    fn display_messages() {
        assert_eq!(
            StorageError::conflict("folder exists").to_string(),
            "conflict: folder exists"
        );
        assert_eq!(
            StorageError::not_found("/FinFlow/customers/x").to_string(),
            "not found: /FinFlow/customers/x"
        );
    }
}
