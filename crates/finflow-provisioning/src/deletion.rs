//! All-or-nothing customer deletion.
//!
//! The ordering is strict: the remote folder removal is attempted first,
//! and any failure other than not-found aborts the whole operation before
//! the database is touched. A customer row must never disappear while its
//! external folder state is unknown, because there is no way to retry a
//! delete against a record that no longer exists.

use std::sync::Arc;

use tracing::{info, instrument, warn};
use uuid::Uuid;

use finflow_db::models::{CreateAuditEntry, Customer, DependentCounts};
use finflow_storage::FolderStore;

use crate::error::{ProvisioningError, ProvisioningResult};
use crate::path::{is_legacy_path, PathConfig};
use crate::repository::CustomerRepository;

/// Read-only impact summary shown before deletion.
#[derive(Debug, Clone)]
pub struct DeletionPreview {
    pub customer_id: Uuid,
    pub code: String,
    pub display_name: String,
    pub counts: DependentCounts,
    pub folder: FolderPreview,
}

/// Remote-folder portion of the preview.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FolderPreview {
    /// Whether a trusted (non-legacy) folder path is on record.
    pub has_folder: bool,
    pub folder_path: Option<String>,
}

/// Options for a deletion.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeleteOptions {
    /// Acting user, for the audit trail.
    pub actor_id: Option<Uuid>,
    /// Whether to remove the remote folder as well.
    pub delete_folder: bool,
}

/// Outcome of a completed deletion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionOutcome {
    /// The remote folder was removed by this call.
    pub folder_deleted: bool,
    /// The remote folder was already gone.
    pub folder_not_found: bool,
    /// Dependent rows removed, as re-counted inside the transaction.
    pub counts: DependentCounts,
}

/// Computes deletion previews and executes the deletion protocol.
pub struct DeletionCoordinator<R, S> {
    repo: Arc<R>,
    store: Arc<S>,
    config: PathConfig,
}

impl<R, S> DeletionCoordinator<R, S>
where
    R: CustomerRepository,
    S: FolderStore,
{
    /// Create a coordinator over the given repository and store.
    pub fn new(repo: Arc<R>, store: Arc<S>, config: PathConfig) -> Self {
        Self {
            repo,
            store,
            config,
        }
    }

    /// Compute the pre-deletion impact summary. Read-only, no locks.
    pub async fn preview(&self, customer_id: Uuid) -> ProvisioningResult<DeletionPreview> {
        let customer = self
            .repo
            .customer(customer_id)
            .await?
            .ok_or(ProvisioningError::CustomerNotFound(customer_id))?;

        let counts = self.repo.dependent_counts(customer_id).await?;
        let folder = self.folder_preview(&customer);

        Ok(DeletionPreview {
            customer_id: customer.id,
            code: customer.code,
            display_name: customer.display_name,
            counts,
            folder,
        })
    }

    /// Execute the deletion protocol.
    ///
    /// Step 1: if requested and a trusted path is on record, remove the
    /// remote folder; not-found counts as already satisfied, anything else
    /// aborts before any database mutation. Step 2: the transactional
    /// cascade delete (dependents, audit entry, customer row), which
    /// either fully commits or fully rolls back.
    #[instrument(skip(self))]
    pub async fn delete(
        &self,
        customer_id: Uuid,
        options: DeleteOptions,
    ) -> ProvisioningResult<DeletionOutcome> {
        let customer = self
            .repo
            .customer(customer_id)
            .await?
            .ok_or(ProvisioningError::CustomerNotFound(customer_id))?;

        let folder = self.folder_preview(&customer);
        let mut folder_deleted = false;
        let mut folder_not_found = false;

        if options.delete_folder {
            if let Some(path) = folder.folder_path.as_deref() {
                match self.store.delete_folder(path).await {
                    Ok(()) => {
                        info!(%path, "Deleted remote customer folder");
                        folder_deleted = true;
                    }
                    Err(err) if err.is_not_found() => {
                        info!(%path, "Remote folder already gone");
                        folder_not_found = true;
                    }
                    Err(err) => {
                        let err = ProvisioningError::from(err);
                        self.audit_failure(customer_id, options.actor_id, &err).await;
                        return Err(err);
                    }
                }
            }
        }

        let folder_details = serde_json::json!({
            "requested": options.delete_folder,
            "deleted": folder_deleted,
            "not_found": folder_not_found,
            "path": folder.folder_path,
        });

        match self
            .repo
            .delete_customer_cascade(customer_id, options.actor_id, folder_details)
            .await
        {
            Ok(counts) => {
                info!(%customer_id, removed = counts.total(), "Customer deleted");
                Ok(DeletionOutcome {
                    folder_deleted,
                    folder_not_found,
                    counts,
                })
            }
            Err(db_err) => {
                let err = ProvisioningError::from(db_err);
                self.audit_failure(customer_id, options.actor_id, &err).await;
                Err(err)
            }
        }
    }

    /// Legacy paths are never trusted, so they are reported as "no folder".
    fn folder_preview(&self, customer: &Customer) -> FolderPreview {
        let trusted = customer
            .folder_path
            .as_deref()
            .filter(|path| !is_legacy_path(path, &self.config));
        FolderPreview {
            has_folder: trusted.is_some(),
            folder_path: trusted.map(str::to_string),
        }
    }

    /// Best-effort audit entry for an aborted or rolled-back deletion.
    async fn audit_failure(
        &self,
        customer_id: Uuid,
        actor_id: Option<Uuid>,
        err: &ProvisioningError,
    ) {
        let entry = CreateAuditEntry {
            actor_id,
            customer_id: Some(customer_id),
            action: "customer.delete".to_string(),
            details: Some(serde_json::json!({
                "status": "failed",
                "error": err.summary(),
            })),
        };
        if let Err(audit_err) = self.repo.record_audit(entry).await {
            warn!(%customer_id, error = %audit_err, "Failed to write deletion audit entry");
        }
    }
}
