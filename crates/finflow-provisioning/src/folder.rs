//! Idempotent remote folder provisioning.

use std::sync::Arc;

use tracing::{debug, info};

use finflow_storage::{FolderMetadata, FolderStore};

use crate::error::ProvisioningResult;
use crate::path::{build_folder_path, PathConfig};

/// Outcome of ensuring a customer folder exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnsuredFolder {
    /// Stable folder identifier.
    pub folder_id: String,
    /// Shared-folder identifier, if sharing is already enabled.
    pub shared_folder_id: Option<String>,
    /// Current display path.
    pub path: String,
    /// Whether this call created the folder.
    pub created: bool,
}

/// Idempotently ensures a remote folder exists for a customer.
pub struct FolderProvisioner<S> {
    store: Arc<S>,
    config: PathConfig,
}

impl<S> Clone for FolderProvisioner<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            config: self.config.clone(),
        }
    }
}

impl<S: FolderStore> FolderProvisioner<S> {
    /// Create a provisioner over the given store.
    pub fn new(store: Arc<S>, config: PathConfig) -> Self {
        Self { store, config }
    }

    /// Ensure a folder exists at the customer's canonical path.
    ///
    /// Attempts to create the folder with no auto-rename; a conflict means
    /// the folder already exists, in which case the path-addressed metadata
    /// lookup recovers its identifier. Two processes racing here converge
    /// on the same folder id because the lookup reads path-addressed
    /// metadata, not process-local state. Any non-conflict failure
    /// propagates.
    pub async fn ensure_folder(
        &self,
        code: &str,
        display_name: &str,
    ) -> ProvisioningResult<EnsuredFolder> {
        let path = build_folder_path(code, display_name, &self.config);

        match self.store.create_folder(&path).await {
            Ok(meta) => {
                info!(folder_id = %meta.id, path = %meta.path_display, "Created customer folder");
                Ok(EnsuredFolder {
                    folder_id: meta.id,
                    shared_folder_id: meta.shared_folder_id,
                    path: meta.path_display,
                    created: true,
                })
            }
            Err(err) if err.is_conflict() => {
                debug!(%path, "Folder already exists, resolving metadata");
                let meta = self.store.get_metadata_by_path(&path).await?;
                Ok(EnsuredFolder {
                    folder_id: meta.id,
                    shared_folder_id: meta.shared_folder_id,
                    path: meta.path_display,
                    created: false,
                })
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Refresh the display path of a folder by its stable identifier.
    ///
    /// Returns `None` when the identifier is stale (folder moved or deleted
    /// by an admin outside this system); the caller must re-provision from
    /// scratch.
    pub async fn resolve_folder_path(
        &self,
        folder_id: &str,
    ) -> ProvisioningResult<Option<FolderMetadata>> {
        match self.store.get_metadata_by_id(folder_id).await {
            Ok(meta) => Ok(Some(meta)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}
