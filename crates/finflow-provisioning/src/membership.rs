//! Convergent membership reconciliation.
//!
//! Desired membership always wins, with one exception: an entry holding
//! owner access is never removed, whatever the desired set says. The
//! reconciler is stateless between runs; it diffs the desired set against
//! the *actual* remote membership every pass, so it self-heals from any
//! external drift.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use finflow_storage::{AccessType, FolderStore, Member};

use crate::error::{ProvisioningError, ProvisioningResult};

/// A computed collaborator entry: who should have access, and at what
/// level. Emails are stored lower-cased.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesiredMember {
    pub email: String,
    pub access: AccessType,
}

impl DesiredMember {
    /// Create an entry, normalizing the email to lower case.
    pub fn new(email: impl AsRef<str>, access: AccessType) -> Self {
        Self {
            email: email.as_ref().to_lowercase(),
            access,
        }
    }
}

/// Delta applied by one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MembershipDelta {
    /// Emails added or access-updated.
    pub added: Vec<String>,
    /// Emails removed.
    pub removed: Vec<String>,
    /// The shared-folder identifier, whether pre-existing or just enabled.
    pub shared_folder_id: String,
}

/// Compute the desired membership for a customer: primary agent as editor,
/// collaborators at their recorded permission, administrators as editors.
/// De-duplicated by email; the higher access level wins.
#[must_use]
pub fn compute_desired_membership(
    primary_agent_email: Option<&str>,
    collaborators: &[(String, AccessType)],
    admin_emails: &[String],
) -> Vec<DesiredMember> {
    let mut by_email: HashMap<String, AccessType> = HashMap::new();

    let mut put = |email: &str, access: AccessType| {
        let email = email.trim().to_lowercase();
        if email.is_empty() {
            return;
        }
        by_email
            .entry(email)
            .and_modify(|existing| {
                if *existing == AccessType::Viewer && access == AccessType::Editor {
                    *existing = AccessType::Editor;
                }
            })
            .or_insert(access);
    };

    if let Some(email) = primary_agent_email {
        put(email, AccessType::Editor);
    }
    for (email, access) in collaborators {
        put(email, *access);
    }
    for email in admin_emails {
        put(email, AccessType::Editor);
    }

    let mut desired: Vec<DesiredMember> = by_email
        .into_iter()
        .map(|(email, access)| DesiredMember { email, access })
        .collect();
    desired.sort_by(|a, b| a.email.cmp(&b.email));
    desired
}

/// Applies the minimal add/remove delta to a shared folder's membership.
pub struct MembershipReconciler<S> {
    store: Arc<S>,
}

impl<S> Clone for MembershipReconciler<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: FolderStore> MembershipReconciler<S> {
    /// Create a reconciler over the given store.
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Converge the shared folder's membership on `desired`.
    ///
    /// Lazily enables sharing when no shared-folder identifier is known;
    /// an "already shared" conflict is success, with the existing
    /// identifier recovered via metadata lookup. Staged additions go out
    /// in one batched, non-notifying call; removals are applied one at a
    /// time. Running this twice with the same desired set is a no-op the
    /// second time.
    pub async fn ensure_members(
        &self,
        folder_id: &str,
        shared_folder_id: Option<&str>,
        desired: &[DesiredMember],
    ) -> ProvisioningResult<MembershipDelta> {
        let shared_folder_id = match shared_folder_id {
            Some(id) => id.to_string(),
            None => self.enable_sharing(folder_id).await?,
        };

        let actual = self.store.list_members(&shared_folder_id).await?;

        let mut to_add: Vec<Member> = Vec::new();
        for want in desired {
            let current = actual
                .iter()
                .find(|m| m.email.to_lowercase() == want.email);
            let needs_update = match current {
                None => true,
                // The store's add call doubles as an access-level update.
                Some(m) => m.access != want.access && m.access != AccessType::Owner,
            };
            if needs_update {
                to_add.push(Member::new(want.email.clone(), want.access));
            }
        }

        let added: Vec<String> = to_add.iter().map(|m| m.email.clone()).collect();
        if !to_add.is_empty() {
            self.store.add_members(&shared_folder_id, &to_add).await?;
        }

        let mut removed = Vec::new();
        for member in &actual {
            let email = member.email.to_lowercase();
            let wanted = desired.iter().any(|w| w.email == email);
            // Ownership is never revoked here.
            if !wanted && member.access != AccessType::Owner {
                self.store.remove_member(&shared_folder_id, &email).await?;
                removed.push(email);
            }
        }

        if added.is_empty() && removed.is_empty() {
            debug!(%shared_folder_id, "Membership already converged");
        } else {
            info!(
                %shared_folder_id,
                added = added.len(),
                removed = removed.len(),
                "Reconciled folder membership"
            );
        }

        Ok(MembershipDelta {
            added,
            removed,
            shared_folder_id,
        })
    }

    /// Enable sharing, treating "already shared" as success.
    async fn enable_sharing(&self, folder_id: &str) -> ProvisioningResult<String> {
        match self.store.share_folder(folder_id).await {
            Ok(id) => Ok(id),
            Err(err) if err.is_conflict() => {
                let meta = self.store.get_metadata_by_id(folder_id).await?;
                meta.shared_folder_id.ok_or_else(|| {
                    ProvisioningError::InconsistentRemoteState(format!(
                        "folder {folder_id} reported as already shared but has no shared folder id"
                    ))
                })
            }
            Err(err) => Err(err.into()),
        }
    }
}
