//! Engine error types.

use thiserror::Error;
use uuid::Uuid;

use finflow_db::DbError;
use finflow_storage::StorageError;

/// Maximum length of the failure summary persisted in `last_error`.
const SUMMARY_MAX_LEN: usize = 500;

/// Error that can occur during provisioning or deletion.
#[derive(Debug, Error)]
pub enum ProvisioningError {
    /// A remote folder operation failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A database operation failed.
    #[error(transparent)]
    Database(#[from] DbError),

    /// The customer row does not exist.
    #[error("customer not found: {0}")]
    CustomerNotFound(Uuid),

    /// The remote service reported a shared folder without giving us its
    /// identifier, or an equally inconsistent combination.
    #[error("inconsistent remote state: {0}")]
    InconsistentRemoteState(String),
}

impl ProvisioningError {
    /// Whether the failure is a service-level credential problem rather
    /// than a per-customer one.
    #[must_use]
    pub fn is_auth(&self) -> bool {
        matches!(self, ProvisioningError::Storage(e) if e.is_auth())
    }

    /// Truncated human-readable summary for the `last_error` column.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut text = self.to_string();
        if text.len() > SUMMARY_MAX_LEN {
            let mut cut = SUMMARY_MAX_LEN;
            while !text.is_char_boundary(cut) {
                cut -= 1;
            }
            text.truncate(cut);
            text.push('…');
        }
        text
    }
}

impl From<sqlx::Error> for ProvisioningError {
    fn from(err: sqlx::Error) -> Self {
        ProvisioningError::Database(err.into())
    }
}

/// Result type for engine operations.
pub type ProvisioningResult<T> = Result<T, ProvisioningError>;
