//! # FinFlow database layer
//!
//! Connection pooling, embedded migrations and the sqlx models backing the
//! folder provisioning engine. All SQL in the workspace lives in this
//! crate; the engine reaches it through the `CustomerRepository` seam in
//! `finflow-provisioning`.

pub mod error;
pub mod migrations;
pub mod models;
pub mod pool;

pub use error::{DbError, DbResult};
pub use migrations::run_migrations;
pub use pool::DbPool;
