//! In-memory folder store.
//!
//! Backs the test suites and local development. Mirrors the remote
//! service's observable behavior: path-addressed creation with conflict on
//! duplicates, stable identifiers that survive renames, lazily enabled
//! sharing, and member adds that double as access-level updates.
//!
//! Failure injection (`inject_failure`) arms a one-shot error for a named
//! operation, which the tests use to exercise the engine's partial-failure
//! paths.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use crate::error::{StorageError, StorageResult};
use crate::traits::FolderStore;
use crate::types::{FolderMetadata, Member};

#[derive(Debug, Clone)]
struct FolderRecord {
    id: String,
    path: String,
    shared_folder_id: Option<String>,
    members: Vec<Member>,
}

#[derive(Debug, Default)]
struct State {
    next_id: u64,
    /// Keyed by folder id.
    folders: HashMap<String, FolderRecord>,
}

/// In-memory [`FolderStore`] implementation.
#[derive(Debug, Default)]
pub struct InMemoryFolderStore {
    state: Mutex<State>,
    create_calls: AtomicUsize,
    add_member_calls: AtomicUsize,
    remove_member_calls: AtomicUsize,
    /// One-shot injected failures, keyed by operation name.
    fail_next: Mutex<HashMap<&'static str, StorageError>>,
}

impl InMemoryFolderStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a one-shot failure for the named operation
    /// (e.g. `"delete_folder"`). The next call to that operation returns
    /// the error instead of executing.
    pub fn inject_failure(&self, operation: &'static str, error: StorageError) {
        self.fail_lock().insert(operation, error);
    }

    /// Number of `create_folder` calls made so far.
    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    /// Number of `add_members` calls made so far.
    pub fn add_member_calls(&self) -> usize {
        self.add_member_calls.load(Ordering::SeqCst)
    }

    /// Number of `remove_member` calls made so far.
    pub fn remove_member_calls(&self) -> usize {
        self.remove_member_calls.load(Ordering::SeqCst)
    }

    /// Insert a member directly, bypassing the trait surface. Used to seed
    /// pre-existing membership (e.g. an owner entry) in tests.
    pub fn seed_member(&self, shared_folder_id: &str, member: Member) {
        let mut state = self.lock();
        if let Some(folder) = state
            .folders
            .values_mut()
            .find(|f| f.shared_folder_id.as_deref() == Some(shared_folder_id))
        {
            folder.members.push(member);
        }
    }

    /// Current member list of a shared folder, for assertions.
    pub fn members_of(&self, shared_folder_id: &str) -> Vec<Member> {
        self.lock()
            .folders
            .values()
            .find(|f| f.shared_folder_id.as_deref() == Some(shared_folder_id))
            .map(|f| f.members.clone())
            .unwrap_or_default()
    }

    /// Number of folders currently in the store.
    pub fn folder_count(&self) -> usize {
        self.lock().folders.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn fail_lock(&self) -> std::sync::MutexGuard<'_, HashMap<&'static str, StorageError>> {
        self.fail_next
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn take_failure(&self, operation: &'static str) -> Option<StorageError> {
        self.fail_lock().remove(operation)
    }

    fn metadata(record: &FolderRecord) -> FolderMetadata {
        FolderMetadata {
            id: record.id.clone(),
            path_display: record.path.clone(),
            shared_folder_id: record.shared_folder_id.clone(),
        }
    }
}

#[async_trait]
impl FolderStore for InMemoryFolderStore {
    async fn create_folder(&self, path: &str) -> StorageResult<FolderMetadata> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.take_failure("create_folder") {
            return Err(err);
        }

        let mut state = self.lock();
        // Paths are case-insensitive, matching the usual vendor semantics.
        if state
            .folders
            .values()
            .any(|f| f.path.eq_ignore_ascii_case(path))
        {
            return Err(StorageError::conflict(format!(
                "folder already exists at {path}"
            )));
        }

        state.next_id += 1;
        let record = FolderRecord {
            id: format!("id:{:08}", state.next_id),
            path: path.to_string(),
            shared_folder_id: None,
            members: Vec::new(),
        };
        let meta = Self::metadata(&record);
        state.folders.insert(record.id.clone(), record);
        Ok(meta)
    }

    async fn get_metadata_by_path(&self, path: &str) -> StorageResult<FolderMetadata> {
        if let Some(err) = self.take_failure("get_metadata_by_path") {
            return Err(err);
        }
        self.lock()
            .folders
            .values()
            .find(|f| f.path.eq_ignore_ascii_case(path))
            .map(Self::metadata)
            .ok_or_else(|| StorageError::not_found(path))
    }

    async fn get_metadata_by_id(&self, folder_id: &str) -> StorageResult<FolderMetadata> {
        if let Some(err) = self.take_failure("get_metadata_by_id") {
            return Err(err);
        }
        self.lock()
            .folders
            .get(folder_id)
            .map(Self::metadata)
            .ok_or_else(|| StorageError::not_found(folder_id))
    }

    async fn share_folder(&self, folder_id: &str) -> StorageResult<String> {
        if let Some(err) = self.take_failure("share_folder") {
            return Err(err);
        }
        let mut state = self.lock();
        state.next_id += 1;
        let shared_id = format!("sf:{:08}", state.next_id);

        let folder = state
            .folders
            .get_mut(folder_id)
            .ok_or_else(|| StorageError::not_found(folder_id))?;
        if folder.shared_folder_id.is_some() {
            return Err(StorageError::conflict(format!(
                "folder {folder_id} is already shared"
            )));
        }
        folder.shared_folder_id = Some(shared_id.clone());
        Ok(shared_id)
    }

    async fn list_members(&self, shared_folder_id: &str) -> StorageResult<Vec<Member>> {
        if let Some(err) = self.take_failure("list_members") {
            return Err(err);
        }
        self.lock()
            .folders
            .values()
            .find(|f| f.shared_folder_id.as_deref() == Some(shared_folder_id))
            .map(|f| f.members.clone())
            .ok_or_else(|| StorageError::not_found(shared_folder_id))
    }

    async fn add_members(&self, shared_folder_id: &str, members: &[Member]) -> StorageResult<()> {
        self.add_member_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.take_failure("add_members") {
            return Err(err);
        }
        let mut state = self.lock();
        let folder = state
            .folders
            .values_mut()
            .find(|f| f.shared_folder_id.as_deref() == Some(shared_folder_id))
            .ok_or_else(|| StorageError::not_found(shared_folder_id))?;

        for member in members {
            match folder
                .members
                .iter_mut()
                .find(|m| m.email.eq_ignore_ascii_case(&member.email))
            {
                // Re-adding an existing member updates its access level.
                Some(existing) => existing.access = member.access,
                None => folder.members.push(member.clone()),
            }
        }
        Ok(())
    }

    async fn remove_member(&self, shared_folder_id: &str, email: &str) -> StorageResult<()> {
        self.remove_member_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.take_failure("remove_member") {
            return Err(err);
        }
        let mut state = self.lock();
        let folder = state
            .folders
            .values_mut()
            .find(|f| f.shared_folder_id.as_deref() == Some(shared_folder_id))
            .ok_or_else(|| StorageError::not_found(shared_folder_id))?;

        let before = folder.members.len();
        folder.members.retain(|m| !m.email.eq_ignore_ascii_case(email));
        if folder.members.len() == before {
            return Err(StorageError::not_found(email));
        }
        Ok(())
    }

    async fn delete_folder(&self, path: &str) -> StorageResult<()> {
        if let Some(err) = self.take_failure("delete_folder") {
            return Err(err);
        }
        let mut state = self.lock();
        let id = state
            .folders
            .values()
            .find(|f| f.path.eq_ignore_ascii_case(path))
            .map(|f| f.id.clone())
            .ok_or_else(|| StorageError::not_found(path))?;
        state.folders.remove(&id);
        Ok(())
    }
}
