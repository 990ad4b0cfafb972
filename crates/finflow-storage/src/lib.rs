//! # FinFlow storage capability
//!
//! Abstracts the remote cloud-storage collaborator that holds per-customer
//! folders. The provisioning engine only depends on the [`FolderStore`]
//! trait; the [`memory::InMemoryFolderStore`] implementation backs tests
//! and local development.

pub mod error;
pub mod memory;
pub mod traits;
pub mod types;

pub use error::{StorageError, StorageResult};
pub use memory::InMemoryFolderStore;
pub use traits::FolderStore;
pub use types::{AccessType, FolderMetadata, Member};
