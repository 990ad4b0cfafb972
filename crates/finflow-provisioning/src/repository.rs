//! Persistence seam between the engine and the database.
//!
//! The coordinators are generic over [`CustomerRepository`] so the engine
//! logic can be exercised against an in-memory implementation;
//! [`PgCustomerRepository`] is the production implementation over the
//! finflow-db models.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::PgPool;
use uuid::Uuid;

use finflow_db::models::{
    delete_dependents, Agent, AuditLog, CollaboratorAssignment, CreateAuditEntry, Customer,
    DependentCounts, ProvisioningResult as ProvisioningUpdate, ProvisioningStatus,
};
use finflow_db::DbError;
use finflow_storage::AccessType;

/// Everything the provisioning pass needs to know about one customer.
#[derive(Debug, Clone)]
pub struct ProvisioningContext {
    pub customer: Customer,
    /// Email of the primary agent, when one is assigned and active.
    pub primary_agent_email: Option<String>,
    /// Collaborator emails with their recorded access level.
    pub collaborators: Vec<(String, AccessType)>,
    /// Emails of all active administrators.
    pub admin_emails: Vec<String>,
}

/// Database operations used by the provisioning and deletion coordinators.
#[async_trait]
pub trait CustomerRepository: Send + Sync {
    /// Load a customer row.
    async fn customer(&self, customer_id: Uuid) -> Result<Option<Customer>, DbError>;

    /// Load the full provisioning context for a customer.
    async fn provisioning_context(
        &self,
        customer_id: Uuid,
    ) -> Result<Option<ProvisioningContext>, DbError>;

    /// Set the provisioning status (and failure summary, if any).
    async fn mark_status(
        &self,
        customer_id: Uuid,
        status: ProvisioningStatus,
        last_error: Option<&str>,
    ) -> Result<(), DbError>;

    /// Persist a successful provisioning outcome.
    async fn save_provisioning_result(
        &self,
        customer_id: Uuid,
        result: &ProvisioningUpdate,
    ) -> Result<(), DbError>;

    /// Null out a stored (legacy) folder path.
    async fn clear_folder_path(&self, customer_id: Uuid) -> Result<(), DbError>;

    /// Count dependent rows. Read-only, no locks.
    async fn dependent_counts(&self, customer_id: Uuid) -> Result<DependentCounts, DbError>;

    /// Execute the transactional cascade delete: re-count dependents,
    /// delete them in dependency order, write one audit entry carrying
    /// `folder_details`, then delete the customer row. All-or-nothing.
    async fn delete_customer_cascade(
        &self,
        customer_id: Uuid,
        actor_id: Option<Uuid>,
        folder_details: JsonValue,
    ) -> Result<DependentCounts, DbError>;

    /// Append an audit entry. Callers treat failures as best-effort.
    async fn record_audit(&self, entry: CreateAuditEntry) -> Result<(), DbError>;
}

fn access_for(permission: &str) -> AccessType {
    match permission {
        "edit" => AccessType::Editor,
        _ => AccessType::Viewer,
    }
}

/// Production repository over a Postgres pool.
#[derive(Debug, Clone)]
pub struct PgCustomerRepository {
    pool: PgPool,
}

impl PgCustomerRepository {
    /// Create a repository over the given pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CustomerRepository for PgCustomerRepository {
    async fn customer(&self, customer_id: Uuid) -> Result<Option<Customer>, DbError> {
        Ok(Customer::get_by_id(&self.pool, customer_id).await?)
    }

    async fn provisioning_context(
        &self,
        customer_id: Uuid,
    ) -> Result<Option<ProvisioningContext>, DbError> {
        let Some(customer) = Customer::get_by_id(&self.pool, customer_id).await? else {
            return Ok(None);
        };

        let primary_agent_email = match customer.primary_agent_id {
            Some(agent_id) => Agent::get_by_id(&self.pool, agent_id)
                .await?
                .filter(|a| a.is_active)
                .map(|a| a.email),
            None => None,
        };

        let collaborators = CollaboratorAssignment::list_with_agents(&self.pool, customer_id)
            .await?
            .into_iter()
            .map(|c| (c.email, access_for(&c.permission)))
            .collect();

        let admin_emails = Agent::list_active_admins(&self.pool)
            .await?
            .into_iter()
            .map(|a| a.email)
            .collect();

        Ok(Some(ProvisioningContext {
            customer,
            primary_agent_email,
            collaborators,
            admin_emails,
        }))
    }

    async fn mark_status(
        &self,
        customer_id: Uuid,
        status: ProvisioningStatus,
        last_error: Option<&str>,
    ) -> Result<(), DbError> {
        Ok(Customer::set_provisioning_status(&self.pool, customer_id, status, last_error).await?)
    }

    async fn save_provisioning_result(
        &self,
        customer_id: Uuid,
        result: &ProvisioningUpdate,
    ) -> Result<(), DbError> {
        Ok(Customer::save_provisioning_result(&self.pool, customer_id, result).await?)
    }

    async fn clear_folder_path(&self, customer_id: Uuid) -> Result<(), DbError> {
        Ok(Customer::clear_folder_path(&self.pool, customer_id).await?)
    }

    async fn dependent_counts(&self, customer_id: Uuid) -> Result<DependentCounts, DbError> {
        Ok(DependentCounts::count(&self.pool, customer_id).await?)
    }

    async fn delete_customer_cascade(
        &self,
        customer_id: Uuid,
        actor_id: Option<Uuid>,
        folder_details: JsonValue,
    ) -> Result<DependentCounts, DbError> {
        let mut tx = self.pool.begin().await?;

        // Re-count inside the transaction so the audit record is exact.
        let counts = DependentCounts::count(&mut *tx, customer_id).await?;
        delete_dependents(&mut tx, customer_id).await?;

        AuditLog::create(
            &mut *tx,
            CreateAuditEntry {
                actor_id,
                customer_id: Some(customer_id),
                action: "customer.delete".to_string(),
                details: Some(serde_json::json!({
                    "status": "ok",
                    "counts": counts,
                    "folder": folder_details,
                })),
            },
        )
        .await?;

        Customer::delete(&mut tx, customer_id).await?;
        tx.commit().await?;

        Ok(counts)
    }

    async fn record_audit(&self, entry: CreateAuditEntry) -> Result<(), DbError> {
        AuditLog::create(&self.pool, entry).await?;
        Ok(())
    }
}
