//! Folder store capability trait.
//!
//! Abstracts the remote cloud-storage collaborator behind the operations
//! the provisioning engine needs. Implementations talk to a concrete
//! vendor API; the in-memory implementation in [`crate::memory`] backs
//! tests and local development.

use async_trait::async_trait;

use crate::error::StorageResult;
use crate::types::{FolderMetadata, Member};

/// Remote folder operations.
///
/// Every mutation is required to be safely retryable: `create_folder` and
/// `share_folder` report an expected-state [`StorageError::Conflict`](crate::error::StorageError::Conflict) when
/// the work is already done, and `add_members` acts as an access-level
/// update for members that already exist.
#[async_trait]
pub trait FolderStore: Send + Sync {
    /// Create a folder at `path` with no auto-rename.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Conflict`](crate::error::StorageError::Conflict) if a folder already exists at
    /// that path. Callers treat this as "already provisioned" and fall
    /// back to [`FolderStore::get_metadata_by_path`].
    async fn create_folder(&self, path: &str) -> StorageResult<FolderMetadata>;

    /// Look up folder metadata by its display path.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`](crate::error::StorageError::NotFound) if nothing exists at `path`.
    async fn get_metadata_by_path(&self, path: &str) -> StorageResult<FolderMetadata>;

    /// Look up folder metadata by its stable identifier.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`](crate::error::StorageError::NotFound) if the identifier is stale (the
    /// folder was deleted or detached outside this system). Callers must
    /// re-provision from scratch in that case.
    async fn get_metadata_by_id(&self, folder_id: &str) -> StorageResult<FolderMetadata>;

    /// Enable sharing on a folder, returning the shared-folder identifier.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Conflict`](crate::error::StorageError::Conflict) if the folder is already shared;
    /// callers recover the existing identifier via metadata lookup.
    async fn share_folder(&self, folder_id: &str) -> StorageResult<String>;

    /// List the current members of a shared folder.
    async fn list_members(&self, shared_folder_id: &str) -> StorageResult<Vec<Member>>;

    /// Add members in one batched call, without notifying them.
    ///
    /// Adding an existing member is an implicit access-level update, not an
    /// error.
    async fn add_members(&self, shared_folder_id: &str, members: &[Member]) -> StorageResult<()>;

    /// Remove a single member by email.
    async fn remove_member(&self, shared_folder_id: &str, email: &str) -> StorageResult<()>;

    /// Delete the folder at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`](crate::error::StorageError::NotFound) if nothing exists at `path`;
    /// deletion callers treat that as already satisfied.
    async fn delete_folder(&self, path: &str) -> StorageResult<()>;
}
