//! Client capability negotiation.
//!
//! Independently configured policies may each need a particular repository
//! access backend. Their requirements are merged into one before any handle
//! is opened; two policies that need different backends are a configuration
//! error and fail immediately.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::error::{Result, RevselError};

/// A concrete repository access backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientKind {
    /// Shells out to the `git` executable.
    Cli,
    /// In-process implementation.
    Embedded,
}

impl fmt::Display for ClientKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientKind::Cli => write!(f, "cli"),
            ClientKind::Embedded => write!(f, "embedded"),
        }
    }
}

/// What a policy needs from the repository access backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientCapability {
    /// Requires the `git` executable backend.
    Cli,
    /// Requires the in-process backend.
    Embedded,
    /// Works with either.
    #[default]
    Any,
}

impl ClientCapability {
    /// Combine two requirements.
    ///
    /// `Any` is the identity; equal requirements collapse; `Cli` with
    /// `Embedded` is a conflict. Commutative and associative, so folding a
    /// whole policy list gives the same answer in any order.
    pub fn merge(self, other: ClientCapability) -> Result<ClientCapability> {
        use ClientCapability::*;
        match (self, other) {
            (Any, x) | (x, Any) => Ok(x),
            (Cli, Cli) => Ok(Cli),
            (Embedded, Embedded) => Ok(Embedded),
            (left, right) => Err(RevselError::CapabilityConflict { left, right }),
        }
    }

    /// Fold every requirement, starting from `Any`.
    pub fn merge_all<I>(requirements: I) -> Result<ClientCapability>
    where
        I: IntoIterator<Item = ClientCapability>,
    {
        requirements
            .into_iter()
            .try_fold(ClientCapability::Any, ClientCapability::merge)
    }

    /// The backend to use: the required one, or `default` when anything goes.
    pub fn resolve(self, default: ClientKind) -> ClientKind {
        match self {
            ClientCapability::Cli => ClientKind::Cli,
            ClientCapability::Embedded => ClientKind::Embedded,
            ClientCapability::Any => default,
        }
    }
}

impl fmt::Display for ClientCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientCapability::Cli => write!(f, "cli"),
            ClientCapability::Embedded => write!(f, "embedded"),
            ClientCapability::Any => write!(f, "any"),
        }
    }
}
