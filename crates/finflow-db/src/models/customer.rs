//! Customer model and the customer-code sequence allocator.
//!
//! The customer row carries the six provisioning columns that are the only
//! durable state owned by the folder provisioning engine: `folder_id`,
//! `shared_folder_id`, `folder_path`, `provisioning_status` and
//! `last_error`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor, Postgres, Transaction};
use uuid::Uuid;

/// Tri-state summary of whether a customer's remote folder is known to be
/// correctly set up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisioningStatus {
    Pending,
    Ok,
    Failed,
}

impl std::fmt::Display for ProvisioningStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProvisioningStatus::Pending => write!(f, "pending"),
            ProvisioningStatus::Ok => write!(f, "ok"),
            ProvisioningStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for ProvisioningStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ProvisioningStatus::Pending),
            "ok" => Ok(ProvisioningStatus::Ok),
            "failed" => Ok(ProvisioningStatus::Failed),
            _ => Err(format!("Invalid provisioning status: {s}")),
        }
    }
}

/// A customer row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Customer {
    /// Unique identifier.
    pub id: Uuid,
    /// Human-readable business code (`CUST0001` style), unique.
    pub code: String,
    /// Display name.
    pub display_name: String,
    /// The agent primarily responsible for this customer.
    pub primary_agent_id: Option<Uuid>,
    /// Stable remote folder identifier, once provisioned.
    pub folder_id: Option<String>,
    /// Shared-folder identifier, once sharing is enabled.
    pub shared_folder_id: Option<String>,
    /// Cached display path of the remote folder.
    pub folder_path: Option<String>,
    /// Provisioning status (stored as text).
    pub provisioning_status: String,
    /// Human-readable summary of the last provisioning failure.
    pub last_error: Option<String>,
    /// Record creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a customer.
#[derive(Debug, Clone)]
pub struct CreateCustomer {
    pub display_name: String,
    pub primary_agent_id: Option<Uuid>,
}

/// The provisioning triple persisted after a successful provisioning pass.
#[derive(Debug, Clone)]
pub struct ProvisioningResult {
    pub folder_id: String,
    pub shared_folder_id: Option<String>,
    pub folder_path: String,
}

const CODE_PREFIX: &str = "CUST";

/// Allocate the next customer code inside the caller's transaction.
///
/// Reads the current maximum code `FOR UPDATE` so that two concurrent
/// customer-creation transactions serialize on this read instead of both
/// computing the same next value. Ordering is by code length first, then
/// lexicographic, so codes widened past the four-digit padding still sort
/// last. The lock is held for the lifetime of the enclosing transaction
/// only. On an empty table there is no row to lock; the unique index on
/// `customers.code` backstops that one race.
pub async fn next_customer_code(
    tx: &mut Transaction<'_, Postgres>,
) -> Result<String, sqlx::Error> {
    let current: Option<(String,)> = sqlx::query_as(
        r"
        SELECT code FROM customers
        ORDER BY LENGTH(code) DESC, code DESC
        LIMIT 1
        FOR UPDATE
        ",
    )
    .fetch_optional(&mut **tx)
    .await?;

    let next = match current {
        Some((code,)) => parse_code_suffix(&code) + 1,
        None => 1,
    };

    Ok(format_code(next))
}

/// Parse the numeric suffix of a customer code; unparseable codes count as 0.
fn parse_code_suffix(code: &str) -> u64 {
    code.strip_prefix(CODE_PREFIX)
        .and_then(|suffix| suffix.parse::<u64>().ok())
        .unwrap_or(0)
}

/// Format a sequence number as a customer code, zero-padded to four digits.
/// Numbers past 9999 widen naturally.
fn format_code(n: u64) -> String {
    format!("{CODE_PREFIX}{n:04}")
}

impl Customer {
    /// Create a customer inside the given transaction, allocating its code.
    pub async fn create(
        tx: &mut Transaction<'_, Postgres>,
        input: CreateCustomer,
    ) -> Result<Self, sqlx::Error> {
        let code = next_customer_code(tx).await?;

        sqlx::query_as::<_, Self>(
            r"
            INSERT INTO customers (code, display_name, primary_agent_id)
            VALUES ($1, $2, $3)
            RETURNING *
            ",
        )
        .bind(code)
        .bind(input.display_name)
        .bind(input.primary_agent_id)
        .fetch_one(&mut **tx)
        .await
    }

    /// Get a customer by ID.
    pub async fn get_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Self>("SELECT * FROM customers WHERE id = $1")
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Set the provisioning status, optionally recording a failure summary.
    ///
    /// Passing `last_error = None` clears any previous failure message.
    pub async fn set_provisioning_status<'e, E>(
        executor: E,
        id: Uuid,
        status: ProvisioningStatus,
        last_error: Option<&str>,
    ) -> Result<(), sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query(
            r"
            UPDATE customers
            SET provisioning_status = $2, last_error = $3, updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(status.to_string())
        .bind(last_error)
        .execute(executor)
        .await?;
        Ok(())
    }

    /// Persist a successful provisioning outcome.
    pub async fn save_provisioning_result<'e, E>(
        executor: E,
        id: Uuid,
        result: &ProvisioningResult,
    ) -> Result<(), sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query(
            r"
            UPDATE customers
            SET folder_id = $2,
                shared_folder_id = $3,
                folder_path = $4,
                provisioning_status = 'ok',
                last_error = NULL,
                updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(&result.folder_id)
        .bind(&result.shared_folder_id)
        .bind(&result.folder_path)
        .execute(executor)
        .await?;
        Ok(())
    }

    /// Null out a stored folder path (used when a legacy-scheme path is
    /// detected and must be re-resolved).
    pub async fn clear_folder_path<'e, E>(executor: E, id: Uuid) -> Result<(), sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query(
            "UPDATE customers SET folder_path = NULL, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .execute(executor)
        .await?;
        Ok(())
    }

    /// Delete the customer row. Dependent rows must already be gone.
    pub async fn delete(tx: &mut Transaction<'_, Postgres>, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM customers WHERE id = $1")
            .bind(id)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    /// Get the status column as an enum.
    #[must_use]
    pub fn status(&self) -> Option<ProvisioningStatus> {
        self.provisioning_status.parse().ok()
    }
}
