//! Append-only audit log.
//!
//! Writes are best-effort everywhere except inside the customer-deletion
//! transaction, where the summary entry participates in atomicity. The
//! best-effort policy lives at the call sites; this model just inserts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::{FromRow, PgExecutor};
use uuid::Uuid;

/// An audit log entry.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AuditLog {
    /// Unique identifier.
    pub id: Uuid,
    /// Acting user, when known.
    pub actor_id: Option<Uuid>,
    /// Customer the action concerned, when applicable.
    ///
    /// Deliberately not a foreign key: deletion audit entries must outlive
    /// the customer row they describe.
    pub customer_id: Option<Uuid>,
    /// Action name, dot-separated (`customer.delete`, `folder.provision`).
    pub action: String,
    /// Structured details.
    pub details: Option<JsonValue>,
    /// When the action occurred.
    pub created_at: DateTime<Utc>,
}

/// Input for creating an audit log entry.
#[derive(Debug, Clone)]
pub struct CreateAuditEntry {
    pub actor_id: Option<Uuid>,
    pub customer_id: Option<Uuid>,
    pub action: String,
    pub details: Option<JsonValue>,
}

impl AuditLog {
    /// Append an entry.
    pub async fn create<'e, E>(executor: E, input: CreateAuditEntry) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Self>(
            r"
            INSERT INTO audit_log (actor_id, customer_id, action, details)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            ",
        )
        .bind(input.actor_id)
        .bind(input.customer_id)
        .bind(input.action)
        .bind(input.details)
        .fetch_one(executor)
        .await
    }

    /// List entries for a customer, newest first.
    pub async fn list_for_customer<'e, E>(
        executor: E,
        customer_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Self>(
            r"
            SELECT * FROM audit_log
            WHERE customer_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            ",
        )
        .bind(customer_id)
        .bind(limit)
        .fetch_all(executor)
        .await
    }
}
