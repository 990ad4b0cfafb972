//! End-to-end engine tests over the in-memory folder store and a mock
//! customer repository.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value as JsonValue;
use tokio::sync::Notify;
use uuid::Uuid;

use finflow_db::models::{
    CreateAuditEntry, Customer, DependentCounts, ProvisioningResult as ProvisioningUpdate,
    ProvisioningStatus,
};
use finflow_db::DbError;
use finflow_provisioning::{
    CustomerRepository, DeleteOptions, DeletionCoordinator, PathConfig, ProvisionOptions,
    ProvisionTrigger, ProvisioningContext, ProvisioningCoordinator, ProvisioningError,
};
use finflow_storage::{AccessType, FolderStore, InMemoryFolderStore, StorageError};

// =============================================================================
// Mock repository
// =============================================================================

#[derive(Default)]
struct MockRepository {
    customers: Mutex<HashMap<Uuid, Customer>>,
    primary_emails: Mutex<HashMap<Uuid, String>>,
    collaborators: Mutex<HashMap<Uuid, Vec<(String, AccessType)>>>,
    admin_emails: Mutex<Vec<String>>,
    counts: Mutex<HashMap<Uuid, DependentCounts>>,
    audits: Mutex<Vec<CreateAuditEntry>>,
    fail_cascade: AtomicBool,
    /// When set, `provisioning_context` blocks until notified. Lets the
    /// queue tests hold a job in flight deterministically.
    context_gate: Mutex<Option<Arc<Notify>>>,
}

impl MockRepository {
    fn new() -> Self {
        Self::default()
    }

    fn insert_customer(&self, code: &str, display_name: &str) -> Uuid {
        let id = Uuid::new_v4();
        let now = Utc::now();
        self.lock(&self.customers).insert(
            id,
            Customer {
                id,
                code: code.to_string(),
                display_name: display_name.to_string(),
                primary_agent_id: None,
                folder_id: None,
                shared_folder_id: None,
                folder_path: None,
                provisioning_status: "pending".to_string(),
                last_error: None,
                created_at: now,
                updated_at: now,
            },
        );
        id
    }

    fn set_folder_path(&self, id: Uuid, path: &str) {
        if let Some(c) = self.lock(&self.customers).get_mut(&id) {
            c.folder_path = Some(path.to_string());
        }
    }

    fn set_primary_email(&self, id: Uuid, email: &str) {
        self.lock(&self.primary_emails).insert(id, email.to_string());
    }

    fn set_admins(&self, emails: &[&str]) {
        *self.lock(&self.admin_emails) = emails.iter().map(|e| e.to_string()).collect();
    }

    fn set_counts(&self, id: Uuid, counts: DependentCounts) {
        self.lock(&self.counts).insert(id, counts);
    }

    fn get_customer(&self, id: Uuid) -> Option<Customer> {
        self.lock(&self.customers).get(&id).cloned()
    }

    fn audit_actions(&self) -> Vec<String> {
        self.lock(&self.audits)
            .iter()
            .map(|e| e.action.clone())
            .collect()
    }

    fn audit_details(&self) -> Vec<JsonValue> {
        self.lock(&self.audits)
            .iter()
            .filter_map(|e| e.details.clone())
            .collect()
    }

    fn gate_context(&self) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        *self.lock(&self.context_gate) = Some(Arc::clone(&notify));
        notify
    }

    fn lock<'a, T>(&self, mutex: &'a Mutex<T>) -> std::sync::MutexGuard<'a, T> {
        mutex.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn injected_db_error() -> DbError {
        DbError::ConnectionFailed(sqlx::Error::PoolClosed)
    }
}

#[async_trait]
impl CustomerRepository for MockRepository {
    async fn customer(&self, customer_id: Uuid) -> Result<Option<Customer>, DbError> {
        Ok(self.get_customer(customer_id))
    }

    async fn provisioning_context(
        &self,
        customer_id: Uuid,
    ) -> Result<Option<ProvisioningContext>, DbError> {
        let gate = self.lock(&self.context_gate).clone();
        if let Some(notify) = gate {
            notify.notified().await;
        }

        let Some(customer) = self.get_customer(customer_id) else {
            return Ok(None);
        };
        Ok(Some(ProvisioningContext {
            customer,
            primary_agent_email: self.lock(&self.primary_emails).get(&customer_id).cloned(),
            collaborators: self
                .lock(&self.collaborators)
                .get(&customer_id)
                .cloned()
                .unwrap_or_default(),
            admin_emails: self.lock(&self.admin_emails).clone(),
        }))
    }

    async fn mark_status(
        &self,
        customer_id: Uuid,
        status: ProvisioningStatus,
        last_error: Option<&str>,
    ) -> Result<(), DbError> {
        let mut customers = self.lock(&self.customers);
        let customer = customers
            .get_mut(&customer_id)
            .ok_or_else(|| DbError::NotFound(customer_id.to_string()))?;
        customer.provisioning_status = status.to_string();
        customer.last_error = last_error.map(str::to_string);
        Ok(())
    }

    async fn save_provisioning_result(
        &self,
        customer_id: Uuid,
        result: &ProvisioningUpdate,
    ) -> Result<(), DbError> {
        let mut customers = self.lock(&self.customers);
        let customer = customers
            .get_mut(&customer_id)
            .ok_or_else(|| DbError::NotFound(customer_id.to_string()))?;
        customer.folder_id = Some(result.folder_id.clone());
        customer.shared_folder_id = result.shared_folder_id.clone();
        customer.folder_path = Some(result.folder_path.clone());
        customer.provisioning_status = "ok".to_string();
        customer.last_error = None;
        Ok(())
    }

    async fn clear_folder_path(&self, customer_id: Uuid) -> Result<(), DbError> {
        if let Some(customer) = self.lock(&self.customers).get_mut(&customer_id) {
            customer.folder_path = None;
        }
        Ok(())
    }

    async fn dependent_counts(&self, customer_id: Uuid) -> Result<DependentCounts, DbError> {
        Ok(self
            .lock(&self.counts)
            .get(&customer_id)
            .copied()
            .unwrap_or_default())
    }

    async fn delete_customer_cascade(
        &self,
        customer_id: Uuid,
        actor_id: Option<Uuid>,
        folder_details: JsonValue,
    ) -> Result<DependentCounts, DbError> {
        if self.fail_cascade.load(Ordering::SeqCst) {
            return Err(Self::injected_db_error());
        }
        let counts = self.dependent_counts(customer_id).await?;
        self.lock(&self.customers).remove(&customer_id);
        self.lock(&self.counts).remove(&customer_id);
        self.lock(&self.audits).push(CreateAuditEntry {
            actor_id,
            customer_id: Some(customer_id),
            action: "customer.delete".to_string(),
            details: Some(serde_json::json!({
                "status": "ok",
                "counts": counts,
                "folder": folder_details,
            })),
        });
        Ok(counts)
    }

    async fn record_audit(&self, entry: CreateAuditEntry) -> Result<(), DbError> {
        self.lock(&self.audits).push(entry);
        Ok(())
    }
}

fn coordinator(
    repo: &Arc<MockRepository>,
    store: &Arc<InMemoryFolderStore>,
) -> ProvisioningCoordinator<MockRepository, InMemoryFolderStore> {
    ProvisioningCoordinator::new(Arc::clone(repo), Arc::clone(store), PathConfig::default())
}

fn deleter(
    repo: &Arc<MockRepository>,
    store: &Arc<InMemoryFolderStore>,
) -> DeletionCoordinator<MockRepository, InMemoryFolderStore> {
    DeletionCoordinator::new(Arc::clone(repo), Arc::clone(store), PathConfig::default())
}

// =============================================================================
// Provisioning
// =============================================================================

#[tokio::test]
async fn provisions_jane_doe_end_to_end() {
    let repo = Arc::new(MockRepository::new());
    let store = Arc::new(InMemoryFolderStore::new());
    let id = repo.insert_customer("CUST0005", "Jane Doe");
    repo.set_primary_email(id, "jane.agent@x.com");
    repo.set_admins(&["admin@x.com", "boss@x.com"]);

    let outcome = coordinator(&repo, &store)
        .provision(id, ProvisionOptions::default())
        .await
        .unwrap();

    assert_eq!(outcome.folder_path, "/FinFlow/customers/CUST0005-jane-doe");
    assert!(outcome.created);
    assert!(outcome.members_added.contains(&"jane.agent@x.com".to_string()));
    assert!(outcome.members_added.contains(&"admin@x.com".to_string()));
    assert!(outcome.members_added.contains(&"boss@x.com".to_string()));

    let members = store.members_of(&outcome.shared_folder_id);
    let jane = members.iter().find(|m| m.email == "jane.agent@x.com").unwrap();
    assert_eq!(jane.access, AccessType::Editor);

    let customer = repo.get_customer(id).unwrap();
    assert_eq!(customer.provisioning_status, "ok");
    assert_eq!(customer.folder_id.as_deref(), Some(outcome.folder_id.as_str()));
    assert_eq!(
        customer.shared_folder_id.as_deref(),
        Some(outcome.shared_folder_id.as_str())
    );
    assert!(customer.last_error.is_none());
    assert!(repo.audit_actions().contains(&"folder.provision".to_string()));
}

#[tokio::test]
async fn provisioning_twice_converges_without_duplicate_work() {
    let repo = Arc::new(MockRepository::new());
    let store = Arc::new(InMemoryFolderStore::new());
    let id = repo.insert_customer("CUST0001", "Acme Corp");
    repo.set_primary_email(id, "agent@x.com");

    let coordinator = coordinator(&repo, &store);
    let first = coordinator.provision(id, ProvisionOptions::default()).await.unwrap();
    let second = coordinator.provision(id, ProvisionOptions::default()).await.unwrap();

    assert!(first.created);
    assert!(!second.created);
    assert_eq!(second.folder_id, first.folder_id);
    assert_eq!(second.folder_path, first.folder_path);
    assert!(second.members_added.is_empty());
    assert!(second.members_removed.is_empty());
    assert_eq!(store.folder_count(), 1);
}

#[tokio::test]
async fn legacy_path_is_healed() {
    let repo = Arc::new(MockRepository::new());
    let store = Arc::new(InMemoryFolderStore::new());
    let id = repo.insert_customer("CUST0007", "Jane Doe");
    repo.set_primary_email(id, "jane.agent@x.com");
    repo.set_folder_path(id, "/finflow/oldagent/jane");

    coordinator(&repo, &store)
        .provision(id, ProvisionOptions::default())
        .await
        .unwrap();

    let customer = repo.get_customer(id).unwrap();
    assert_eq!(customer.provisioning_status, "ok");
    assert_eq!(
        customer.folder_path.as_deref(),
        Some("/FinFlow/customers/CUST0007-jane-doe")
    );
}

#[tokio::test]
async fn remote_failure_leaves_failed_status_and_intact_customer() {
    let repo = Arc::new(MockRepository::new());
    let store = Arc::new(InMemoryFolderStore::new());
    let id = repo.insert_customer("CUST0002", "Jane Doe");
    store.inject_failure("create_folder", StorageError::unavailable("maintenance window"));

    let err = coordinator(&repo, &store)
        .provision(
            id,
            ProvisionOptions {
                mark_pending: true,
                trigger: ProvisionTrigger::CustomerCreated,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ProvisioningError::Storage(_)));

    let customer = repo.get_customer(id).unwrap();
    assert_eq!(customer.provisioning_status, "failed");
    assert!(customer
        .last_error
        .as_deref()
        .unwrap()
        .contains("maintenance window"));

    // Retry succeeds and clears the error.
    coordinator(&repo, &store)
        .provision(
            id,
            ProvisionOptions {
                mark_pending: false,
                trigger: ProvisionTrigger::Retry,
            },
        )
        .await
        .unwrap();
    let customer = repo.get_customer(id).unwrap();
    assert_eq!(customer.provisioning_status, "ok");
    assert!(customer.last_error.is_none());
}

#[tokio::test]
async fn provisioning_unknown_customer_fails() {
    let repo = Arc::new(MockRepository::new());
    let store = Arc::new(InMemoryFolderStore::new());

    let err = coordinator(&repo, &store)
        .provision(Uuid::new_v4(), ProvisionOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ProvisioningError::CustomerNotFound(_)));
}

// =============================================================================
// Queued provisioning
// =============================================================================

#[tokio::test]
async fn queue_deduplicates_in_flight_jobs() {
    let repo = Arc::new(MockRepository::new());
    let store = Arc::new(InMemoryFolderStore::new());
    let id = repo.insert_customer("CUST0003", "Queued Inc");
    let gate = repo.gate_context();

    let coordinator = coordinator(&repo, &store);
    assert!(coordinator
        .queue_provisioning(id, ProvisionTrigger::CustomerCreated)
        .await
        .unwrap());

    // Pending is persisted synchronously, before the job runs.
    assert_eq!(repo.get_customer(id).unwrap().provisioning_status, "pending");

    // Second request while the first is held in flight: silent no-op.
    assert!(!coordinator
        .queue_provisioning(id, ProvisionTrigger::CustomerUpdated)
        .await
        .unwrap());
    assert_eq!(coordinator.active_jobs(), 1);

    *repo.lock(&repo.context_gate) = None;
    // notify_one stores a permit, so this works whether or not the job has
    // reached the gate yet.
    gate.notify_one();
    for _ in 0..100 {
        if coordinator.active_jobs() == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(coordinator.active_jobs(), 0);
    assert_eq!(repo.get_customer(id).unwrap().provisioning_status, "ok");

    // Once drained, a new request queues again.
    assert!(coordinator
        .queue_provisioning(id, ProvisionTrigger::Retry)
        .await
        .unwrap());
}

#[tokio::test]
async fn queued_failure_is_recorded_not_thrown() {
    let repo = Arc::new(MockRepository::new());
    let store = Arc::new(InMemoryFolderStore::new());
    let id = repo.insert_customer("CUST0004", "Flaky Ltd");
    store.inject_failure("create_folder", StorageError::operation_failed("boom"));

    let coordinator = coordinator(&repo, &store);
    assert!(coordinator
        .queue_provisioning(id, ProvisionTrigger::Manual)
        .await
        .unwrap());

    for _ in 0..100 {
        if coordinator.active_jobs() == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let customer = repo.get_customer(id).unwrap();
    assert_eq!(customer.provisioning_status, "failed");
    assert!(customer.last_error.as_deref().unwrap().contains("boom"));
}

// =============================================================================
// Deletion
// =============================================================================

fn sample_counts() -> DependentCounts {
    DependentCounts {
        loans: 2,
        documents: 4,
        notes: 1,
        tasks: 3,
        collaborators: 1,
    }
}

#[tokio::test]
async fn preview_reports_counts_and_folder() {
    let repo = Arc::new(MockRepository::new());
    let store = Arc::new(InMemoryFolderStore::new());
    let id = repo.insert_customer("CUST0010", "Doomed Co");
    repo.set_counts(id, sample_counts());
    repo.set_folder_path(id, "/FinFlow/customers/CUST0010-doomed-co");

    let preview = deleter(&repo, &store).preview(id).await.unwrap();
    assert_eq!(preview.code, "CUST0010");
    assert_eq!(preview.counts, sample_counts());
    assert!(preview.folder.has_folder);
    assert_eq!(
        preview.folder.folder_path.as_deref(),
        Some("/FinFlow/customers/CUST0010-doomed-co")
    );
}

#[tokio::test]
async fn preview_never_trusts_legacy_paths() {
    let repo = Arc::new(MockRepository::new());
    let store = Arc::new(InMemoryFolderStore::new());
    let id = repo.insert_customer("CUST0011", "Old Timer");
    repo.set_folder_path(id, "/finflow/oldagent/old-timer");

    let preview = deleter(&repo, &store).preview(id).await.unwrap();
    assert!(!preview.folder.has_folder);
    assert!(preview.folder.folder_path.is_none());
}

#[tokio::test]
async fn remote_failure_aborts_deletion_before_any_db_change() {
    let repo = Arc::new(MockRepository::new());
    let store = Arc::new(InMemoryFolderStore::new());
    let id = repo.insert_customer("CUST0012", "Sticky Co");
    repo.set_counts(id, sample_counts());

    let path = "/FinFlow/customers/CUST0012-sticky-co";
    store.create_folder(path).await.unwrap();
    repo.set_folder_path(id, path);
    store.inject_failure("delete_folder", StorageError::unavailable("down"));

    let deleter = deleter(&repo, &store);
    let err = deleter
        .delete(
            id,
            DeleteOptions {
                actor_id: None,
                delete_folder: true,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ProvisioningError::Storage(_)));

    // Nothing was removed: preview still returns the original counts.
    let preview = deleter.preview(id).await.unwrap();
    assert_eq!(preview.counts, sample_counts());
    assert_eq!(store.folder_count(), 1);

    let details = repo.audit_details();
    assert!(details
        .iter()
        .any(|d| d.get("status").and_then(JsonValue::as_str) == Some("failed")));
}

#[tokio::test]
async fn successful_deletion_removes_everything() {
    let repo = Arc::new(MockRepository::new());
    let store = Arc::new(InMemoryFolderStore::new());
    let id = repo.insert_customer("CUST0013", "Gone Inc");
    repo.set_counts(id, sample_counts());

    let path = "/FinFlow/customers/CUST0013-gone-inc";
    store.create_folder(path).await.unwrap();
    repo.set_folder_path(id, path);

    let deleter = deleter(&repo, &store);
    let outcome = deleter
        .delete(
            id,
            DeleteOptions {
                actor_id: Some(Uuid::new_v4()),
                delete_folder: true,
            },
        )
        .await
        .unwrap();

    assert!(outcome.folder_deleted);
    assert!(!outcome.folder_not_found);
    assert_eq!(outcome.counts, sample_counts());
    assert_eq!(store.folder_count(), 0);

    let err = deleter.preview(id).await.unwrap_err();
    assert!(matches!(err, ProvisioningError::CustomerNotFound(_)));
}

#[tokio::test]
async fn missing_remote_folder_is_already_satisfied() {
    let repo = Arc::new(MockRepository::new());
    let store = Arc::new(InMemoryFolderStore::new());
    let id = repo.insert_customer("CUST0014", "Ghost LLC");
    repo.set_folder_path(id, "/FinFlow/customers/CUST0014-ghost-llc");

    let outcome = deleter(&repo, &store)
        .delete(
            id,
            DeleteOptions {
                actor_id: None,
                delete_folder: true,
            },
        )
        .await
        .unwrap();

    assert!(!outcome.folder_deleted);
    assert!(outcome.folder_not_found);
    assert!(repo.get_customer(id).is_none());
}

#[tokio::test]
async fn cascade_failure_rolls_back_and_audits() {
    let repo = Arc::new(MockRepository::new());
    let store = Arc::new(InMemoryFolderStore::new());
    let id = repo.insert_customer("CUST0015", "Survivor SA");
    repo.fail_cascade.store(true, Ordering::SeqCst);

    let err = deleter(&repo, &store)
        .delete(id, DeleteOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ProvisioningError::Database(_)));

    // The customer row survived, and the failure was audited.
    assert!(repo.get_customer(id).is_some());
    let details = repo.audit_details();
    assert!(details
        .iter()
        .any(|d| d.get("status").and_then(JsonValue::as_str) == Some("failed")));
}
