//! Dependent-row counting and ordered deletion.
//!
//! The deletion protocol needs two things from the dependent tables: a
//! read-only impact count for the pre-deletion preview, and an ordered
//! cascade delete inside the deletion transaction. The dependent tables'
//! own CRUD lives elsewhere.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor, Postgres, Transaction};
use uuid::Uuid;

/// Counts of rows that would be removed alongside a customer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct DependentCounts {
    pub loans: i64,
    pub documents: i64,
    pub notes: i64,
    pub tasks: i64,
    pub collaborators: i64,
}

impl DependentCounts {
    /// Count dependent rows for a customer. Read-only, no locks.
    pub async fn count<'e, E>(executor: E, customer_id: Uuid) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Self>(
            r"
            SELECT
                (SELECT COUNT(*) FROM loans WHERE customer_id = $1) AS loans,
                (SELECT COUNT(*) FROM customer_documents WHERE customer_id = $1) AS documents,
                (SELECT COUNT(*) FROM customer_notes WHERE customer_id = $1) AS notes,
                (SELECT COUNT(*) FROM customer_tasks WHERE customer_id = $1) AS tasks,
                (SELECT COUNT(*) FROM collaborator_assignments WHERE customer_id = $1) AS collaborators
            ",
        )
        .bind(customer_id)
        .fetch_one(executor)
        .await
    }

    /// Total number of dependent rows.
    #[must_use]
    pub fn total(&self) -> i64 {
        self.loans + self.documents + self.notes + self.tasks + self.collaborators
    }
}

/// Delete all dependent rows for a customer, in dependency order:
/// tasks, notes, documents, loans, collaborator assignments.
///
/// Must run inside the deletion transaction so a failure anywhere rolls
/// everything back.
pub async fn delete_dependents(
    tx: &mut Transaction<'_, Postgres>,
    customer_id: Uuid,
) -> Result<(), sqlx::Error> {
    for table in [
        "customer_tasks",
        "customer_notes",
        "customer_documents",
        "loans",
        "collaborator_assignments",
    ] {
        sqlx::query(&format!("DELETE FROM {table} WHERE customer_id = $1"))
            .bind(customer_id)
            .execute(&mut **tx)
            .await?;
    }
    Ok(())
}
