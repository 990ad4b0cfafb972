//! # FinFlow folder provisioning engine
//!
//! Keeps a per-customer folder in a remote cloud-storage service
//! consistent with the customer's database record: identity, canonical
//! path, and sharing membership.
//!
//! The engine guarantees:
//! - **Idempotent folder creation** — racing provisioners converge on the
//!   same folder identifier ([`folder::FolderProvisioner`]).
//! - **Convergent membership** — actual membership is diffed against the
//!   always-recomputed desired set, never against stored state, so the
//!   system self-heals from external drift
//!   ([`membership::MembershipReconciler`]).
//! - **De-duplicated background provisioning** — at most one queued job
//!   per customer per process ([`coordinator::ProvisioningCoordinator`]).
//! - **All-or-nothing deletion** — a customer row is only removed once the
//!   remote folder's fate is known, inside one transaction
//!   ([`deletion::DeletionCoordinator`]).
//!
//! Legacy folder paths from the deprecated naming scheme are detected by
//! prefix and always re-resolved rather than trusted ([`path`]).

pub mod coordinator;
pub mod deletion;
pub mod error;
pub mod folder;
pub mod membership;
pub mod path;
pub mod repository;

pub use coordinator::{
    ProvisionOptions, ProvisionOutcome, ProvisionTrigger, ProvisioningCoordinator,
};
pub use deletion::{
    DeleteOptions, DeletionCoordinator, DeletionOutcome, DeletionPreview, FolderPreview,
};
pub use error::{ProvisioningError, ProvisioningResult};
pub use folder::{EnsuredFolder, FolderProvisioner};
pub use membership::{
    compute_desired_membership, DesiredMember, MembershipDelta, MembershipReconciler,
};
pub use path::{build_folder_path, is_legacy_path, PathConfig};
pub use repository::{CustomerRepository, PgCustomerRepository, ProvisioningContext};
