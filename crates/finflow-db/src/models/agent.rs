//! Agent account model.
//!
//! Agents are the staff accounts that own and collaborate on customers.
//! Administrators (role `admin`) are granted edit access to every customer
//! folder during membership reconciliation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor};
use uuid::Uuid;

/// Agent role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    Admin,
    Agent,
}

impl std::fmt::Display for AgentRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentRole::Admin => write!(f, "admin"),
            AgentRole::Agent => write!(f, "agent"),
        }
    }
}

impl std::str::FromStr for AgentRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(AgentRole::Admin),
            "agent" => Ok(AgentRole::Agent),
            _ => Err(format!("Invalid agent role: {s}")),
        }
    }
}

/// An agent row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Agent {
    /// Unique identifier.
    pub id: Uuid,
    /// Login / collaboration email, unique.
    pub email: String,
    /// Display name.
    pub display_name: String,
    /// Role (stored as text).
    pub role: String,
    /// Whether the account is active.
    pub is_active: bool,
    /// Record creation time.
    pub created_at: DateTime<Utc>,
}

impl Agent {
    /// Get an agent by ID.
    pub async fn get_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Self>("SELECT * FROM agents WHERE id = $1")
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// List all active administrators.
    pub async fn list_active_admins<'e, E>(executor: E) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM agents WHERE role = 'admin' AND is_active ORDER BY email",
        )
        .fetch_all(executor)
        .await
    }

    /// Get the role column as an enum.
    #[must_use]
    pub fn role_enum(&self) -> Option<AgentRole> {
        self.role.parse().ok()
    }
}
