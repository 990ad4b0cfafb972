//! Shared types for the folder store capability.

use serde::{Deserialize, Serialize};

/// Access level of a folder member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessType {
    Viewer,
    Editor,
    /// Set by the remote service on the sharing account. Never requested
    /// by this system and never revoked by reconciliation.
    Owner,
}

impl std::fmt::Display for AccessType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccessType::Viewer => write!(f, "viewer"),
            AccessType::Editor => write!(f, "editor"),
            AccessType::Owner => write!(f, "owner"),
        }
    }
}

impl std::str::FromStr for AccessType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "viewer" => Ok(AccessType::Viewer),
            "editor" => Ok(AccessType::Editor),
            "owner" => Ok(AccessType::Owner),
            _ => Err(format!("Invalid access type: {s}")),
        }
    }
}

/// A member of a shared folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    /// Member email. Remote services are case-preserving here; consumers
    /// normalize to lower case before comparing.
    pub email: String,
    /// Access level.
    pub access: AccessType,
}

impl Member {
    /// Create a member entry.
    pub fn new(email: impl Into<String>, access: AccessType) -> Self {
        Self {
            email: email.into(),
            access,
        }
    }
}

/// Metadata snapshot of a remote folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderMetadata {
    /// Stable, rename-proof identifier.
    pub id: String,
    /// Current display path.
    pub path_display: String,
    /// Shared-folder identifier, present once sharing is enabled.
    pub shared_folder_id: Option<String>,
}
