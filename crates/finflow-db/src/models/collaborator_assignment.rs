//! Collaborator assignment model.
//!
//! One row per non-primary collaborator on a customer; the primary agent is
//! implied by `customers.primary_agent_id` and never has a row here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor};
use uuid::Uuid;

/// Access level recorded for a collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    View,
    Edit,
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Permission::View => write!(f, "view"),
            Permission::Edit => write!(f, "edit"),
        }
    }
}

impl std::str::FromStr for Permission {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "view" => Ok(Permission::View),
            "edit" => Ok(Permission::Edit),
            _ => Err(format!("Invalid permission: {s}")),
        }
    }
}

/// A collaborator assignment row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CollaboratorAssignment {
    /// Unique identifier.
    pub id: Uuid,
    /// Customer the assignment belongs to.
    pub customer_id: Uuid,
    /// Assigned agent.
    pub agent_id: Uuid,
    /// Access level (stored as text).
    pub permission: String,
    /// Record creation time.
    pub created_at: DateTime<Utc>,
}

/// A collaborator joined with its agent details, as needed for membership
/// reconciliation.
#[derive(Debug, Clone, FromRow)]
pub struct CollaboratorWithAgent {
    pub agent_id: Uuid,
    pub email: String,
    pub permission: String,
}

impl CollaboratorAssignment {
    /// List the collaborators of a customer together with agent emails.
    ///
    /// Inactive agents are excluded; they should not hold folder access.
    pub async fn list_with_agents<'e, E>(
        executor: E,
        customer_id: Uuid,
    ) -> Result<Vec<CollaboratorWithAgent>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, CollaboratorWithAgent>(
            r"
            SELECT ca.agent_id, a.email, ca.permission
            FROM collaborator_assignments ca
            JOIN agents a ON a.id = ca.agent_id
            WHERE ca.customer_id = $1 AND a.is_active
            ORDER BY a.email
            ",
        )
        .bind(customer_id)
        .fetch_all(executor)
        .await
    }

    /// Get the permission column as an enum.
    #[must_use]
    pub fn permission_enum(&self) -> Option<Permission> {
        self.permission.parse().ok()
    }
}
