//! Error taxonomy for revision selection.

use crate::capability::{ClientCapability, ClientKind};

/// Errors produced while selecting revisions or resolving configuration.
#[derive(Debug, thiserror::Error)]
pub enum RevselError {
    /// An object could not be read while ordering or inspecting commits.
    /// Fatal to the current cycle: it means repository corruption or a race
    /// with garbage collection.
    #[error("repository error: failed to parse {object}: {reason}")]
    Repository { object: String, reason: String },

    #[error("git error: {0}")]
    Git(String),

    #[error("client capability conflict: {left} vs {right}")]
    CapabilityConflict {
        left: ClientCapability,
        right: ClientCapability,
    },

    #[error("no {0} client is available in this build")]
    UnsupportedClient(ClientKind),

    #[error("invalid branch spec '{spec}': {reason}")]
    InvalidBranchSpec { spec: String, reason: String },

    #[error("invalid object id: {0}")]
    InvalidObjectId(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("poll task failed: {0}")]
    Task(String),
}

impl RevselError {
    /// Returns `true` for errors that must abort the running cycle rather than
    /// being absorbed as warnings.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            RevselError::Repository { .. } | RevselError::CapabilityConflict { .. }
        )
    }
}

/// Result type for revision selection operations.
pub type Result<T> = std::result::Result<T, RevselError>;
