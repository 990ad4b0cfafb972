//! Database models.

pub mod agent;
pub mod audit_log;
pub mod collaborator_assignment;
pub mod customer;
pub mod dependents;

pub use agent::{Agent, AgentRole};
pub use audit_log::{AuditLog, CreateAuditEntry};
pub use collaborator_assignment::{CollaboratorAssignment, CollaboratorWithAgent, Permission};
pub use customer::{
    next_customer_code, CreateCustomer, Customer, ProvisioningResult, ProvisioningStatus,
};
pub use dependents::{delete_dependents, DependentCounts};
