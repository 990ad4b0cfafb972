//! Provisioning orchestration.
//!
//! `provision` runs one full pass for a customer: resolve path, ensure
//! folder, reconcile membership, persist the outcome. `queue_provisioning`
//! schedules that pass as a background task, de-duplicated per customer by
//! an in-process active-job set.

use std::sync::Arc;

use dashmap::DashSet;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use finflow_db::models::{
    CreateAuditEntry, ProvisioningResult as ProvisioningUpdate, ProvisioningStatus,
};
use finflow_storage::FolderStore;

use crate::error::{ProvisioningError, ProvisioningResult};
use crate::folder::FolderProvisioner;
use crate::membership::{compute_desired_membership, MembershipReconciler};
use crate::path::{is_legacy_path, PathConfig};
use crate::repository::{CustomerRepository, ProvisioningContext};

/// What caused a provisioning pass. Recorded in logs and audit entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionTrigger {
    CustomerCreated,
    CustomerUpdated,
    Manual,
    Retry,
}

impl std::fmt::Display for ProvisionTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProvisionTrigger::CustomerCreated => write!(f, "customer_created"),
            ProvisionTrigger::CustomerUpdated => write!(f, "customer_updated"),
            ProvisionTrigger::Manual => write!(f, "manual"),
            ProvisionTrigger::Retry => write!(f, "retry"),
        }
    }
}

/// Options for a provisioning pass.
#[derive(Debug, Clone, Copy)]
pub struct ProvisionOptions {
    /// Persist `pending` before any remote I/O, for immediate UI feedback.
    pub mark_pending: bool,
    /// What caused this pass.
    pub trigger: ProvisionTrigger,
}

impl Default for ProvisionOptions {
    fn default() -> Self {
        Self {
            mark_pending: false,
            trigger: ProvisionTrigger::Manual,
        }
    }
}

/// Result of a successful provisioning pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionOutcome {
    pub folder_id: String,
    pub shared_folder_id: String,
    pub folder_path: String,
    /// Whether this pass created the folder.
    pub created: bool,
    /// Emails added or access-updated by reconciliation.
    pub members_added: Vec<String>,
    /// Emails removed by reconciliation.
    pub members_removed: Vec<String>,
}

/// Orchestrates path resolution, folder provisioning and membership
/// reconciliation for one customer, and persists the outcome.
pub struct ProvisioningCoordinator<R, S> {
    repo: Arc<R>,
    provisioner: FolderProvisioner<S>,
    reconciler: MembershipReconciler<S>,
    config: PathConfig,
    /// Customer ids with a queued job currently in flight.
    active: Arc<DashSet<Uuid>>,
}

impl<R, S> Clone for ProvisioningCoordinator<R, S> {
    fn clone(&self) -> Self {
        Self {
            repo: Arc::clone(&self.repo),
            provisioner: self.provisioner.clone(),
            reconciler: self.reconciler.clone(),
            config: self.config.clone(),
            active: Arc::clone(&self.active),
        }
    }
}

impl<R, S> ProvisioningCoordinator<R, S>
where
    R: CustomerRepository + 'static,
    S: FolderStore + 'static,
{
    /// Create a coordinator over the given repository and store.
    pub fn new(repo: Arc<R>, store: Arc<S>, config: PathConfig) -> Self {
        Self {
            repo,
            provisioner: FolderProvisioner::new(Arc::clone(&store), config.clone()),
            reconciler: MembershipReconciler::new(store),
            config,
            active: Arc::new(DashSet::new()),
        }
    }

    /// Run one provisioning pass for a customer.
    ///
    /// On remote failure the customer is left in `failed` status with a
    /// truncated summary in `last_error`, and the error is returned so a
    /// synchronous caller can surface it as a warning. The queued path
    /// only logs it; either way the customer row itself stays intact.
    #[instrument(skip(self), fields(trigger = %options.trigger))]
    pub async fn provision(
        &self,
        customer_id: Uuid,
        options: ProvisionOptions,
    ) -> ProvisioningResult<ProvisionOutcome> {
        if options.mark_pending {
            self.repo
                .mark_status(customer_id, ProvisioningStatus::Pending, None)
                .await?;
        }

        let ctx = self
            .repo
            .provisioning_context(customer_id)
            .await?
            .ok_or(ProvisioningError::CustomerNotFound(customer_id))?;

        match self.provision_inner(&ctx).await {
            Ok(outcome) => {
                self.repo
                    .save_provisioning_result(
                        customer_id,
                        &ProvisioningUpdate {
                            folder_id: outcome.folder_id.clone(),
                            shared_folder_id: Some(outcome.shared_folder_id.clone()),
                            folder_path: outcome.folder_path.clone(),
                        },
                    )
                    .await?;
                self.audit(customer_id, options.trigger, "ok", None).await;
                info!(
                    path = %outcome.folder_path,
                    created = outcome.created,
                    "Provisioning completed"
                );
                Ok(outcome)
            }
            Err(err) => {
                let summary = err.summary();
                if let Err(persist_err) = self
                    .repo
                    .mark_status(customer_id, ProvisioningStatus::Failed, Some(&summary))
                    .await
                {
                    error!(error = %persist_err, "Failed to persist provisioning failure");
                }
                self.audit(customer_id, options.trigger, "failed", Some(&summary))
                    .await;
                Err(err)
            }
        }
    }

    /// Schedule a provisioning pass as a background task.
    ///
    /// Sets the customer `pending` synchronously, then spawns the pass.
    /// Returns `false` (a silent no-op) when a queued job for this
    /// customer is already in flight. The active-set entry is removed on
    /// completion, success or failure.
    pub async fn queue_provisioning(
        &self,
        customer_id: Uuid,
        trigger: ProvisionTrigger,
    ) -> ProvisioningResult<bool> {
        if !self.active.insert(customer_id) {
            debug!(%customer_id, "Provisioning already queued, skipping");
            return Ok(false);
        }

        if let Err(err) = self
            .repo
            .mark_status(customer_id, ProvisioningStatus::Pending, None)
            .await
        {
            self.active.remove(&customer_id);
            return Err(err.into());
        }

        let this = self.clone();
        tokio::spawn(async move {
            let options = ProvisionOptions {
                mark_pending: false,
                trigger,
            };
            // Failure is reflected in the persisted status; there is no
            // caller to re-throw to.
            if let Err(err) = this.provision(customer_id, options).await {
                warn!(%customer_id, error = %err, "Queued provisioning failed");
            }
            this.active.remove(&customer_id);
        });

        Ok(true)
    }

    /// Number of queued jobs currently in flight.
    #[must_use]
    pub fn active_jobs(&self) -> usize {
        self.active.len()
    }

    async fn provision_inner(
        &self,
        ctx: &ProvisioningContext,
    ) -> ProvisioningResult<ProvisionOutcome> {
        let customer = &ctx.customer;

        // Legacy paths are never trusted; null them so everything below
        // works from the re-resolved canonical path.
        if let Some(stored) = customer.folder_path.as_deref() {
            if is_legacy_path(stored, &self.config) {
                info!(%stored, "Clearing legacy folder path");
                self.repo.clear_folder_path(customer.id).await?;
            }
        }

        let desired = compute_desired_membership(
            ctx.primary_agent_email.as_deref(),
            &ctx.collaborators,
            &ctx.admin_emails,
        );

        let ensured = self
            .provisioner
            .ensure_folder(&customer.code, &customer.display_name)
            .await?;

        let delta = self
            .reconciler
            .ensure_members(
                &ensured.folder_id,
                ensured.shared_folder_id.as_deref(),
                &desired,
            )
            .await?;

        Ok(ProvisionOutcome {
            folder_id: ensured.folder_id,
            shared_folder_id: delta.shared_folder_id,
            folder_path: ensured.path,
            created: ensured.created,
            members_added: delta.added,
            members_removed: delta.removed,
        })
    }

    /// Best-effort audit write; a failure here must not fail provisioning.
    async fn audit(
        &self,
        customer_id: Uuid,
        trigger: ProvisionTrigger,
        status: &str,
        error: Option<&str>,
    ) {
        let entry = CreateAuditEntry {
            actor_id: None,
            customer_id: Some(customer_id),
            action: "folder.provision".to_string(),
            details: Some(serde_json::json!({
                "trigger": trigger.to_string(),
                "status": status,
                "error": error,
            })),
        };
        if let Err(err) = self.repo.record_audit(entry).await {
            warn!(%customer_id, error = %err, "Failed to write provisioning audit entry");
        }
    }
}
