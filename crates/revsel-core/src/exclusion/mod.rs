//! Exclusion policies consulted per commit while polling.
//!
//! Policies are evaluated strictly in configured order. The first verdict
//! that is not [`ExclusionVerdict::Abstain`] decides; when every policy
//! abstains the commit counts as a change.

pub mod branch;
pub mod message;
pub mod path;
pub mod poll;
pub mod user;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::branch_spec::EnvVars;
use crate::capability::ClientCapability;
use crate::domain::change::CommitChange;
use crate::domain::error::Result;
use crate::history::BuildHistory;
use crate::log::BuildLog;
use crate::repository::RepositoryAccess;

pub use branch::BranchRestriction;
pub use message::MessageExclusion;
pub use path::PathRestriction;
pub use poll::PollExclusion;
pub use user::UserExclusion;

/// Decision of one policy about one commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExclusionVerdict {
    /// Ignore the commit; stop evaluating.
    Exclude,
    /// Count the commit as a change; stop evaluating.
    Include,
    /// No opinion; ask the next policy.
    Abstain,
}

impl fmt::Display for ExclusionVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExclusionVerdict::Exclude => write!(f, "exclude"),
            ExclusionVerdict::Include => write!(f, "include"),
            ExclusionVerdict::Abstain => write!(f, "abstain"),
        }
    }
}

/// What a policy may consult besides the commit itself.
#[derive(Clone, Copy)]
pub struct ExclusionContext<'a> {
    pub repo: &'a dyn RepositoryAccess,
    pub history: &'a dyn BuildHistory,
    pub env: &'a EnvVars,
    pub log: &'a dyn BuildLog,
}

/// A pluggable rule that may veto or force-include a commit.
///
/// A policy keeps no state between commits. An `Err` means the policy could
/// not read the repository; the caller decides how to treat the commit.
pub trait ExclusionPolicy: Send + Sync {
    /// Stable identifier, used in logs and structured events.
    fn name(&self) -> &'static str;

    fn evaluate(&self, commit: &CommitChange, ctx: &ExclusionContext<'_>)
        -> Result<ExclusionVerdict>;

    /// Repository access backend this policy needs.
    fn required_client(&self) -> ClientCapability {
        ClientCapability::Any
    }

    /// Whether polling must inspect commits in a workspace.
    fn requires_workspace_for_polling(&self) -> bool {
        false
    }
}

/// Ordered list of exclusion policies.
#[derive(Default)]
pub struct ExclusionChain {
    policies: Vec<Box<dyn ExclusionPolicy>>,
}

impl ExclusionChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style append.
    pub fn with_policy(mut self, policy: Box<dyn ExclusionPolicy>) -> Self {
        self.policies.push(policy);
        self
    }

    pub fn push(&mut self, policy: Box<dyn ExclusionPolicy>) {
        self.policies.push(policy);
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.policies.iter().map(|p| p.name()).collect()
    }

    /// First non-abstaining verdict, or `Abstain` when every policy abstains.
    pub fn evaluate(
        &self,
        commit: &CommitChange,
        ctx: &ExclusionContext<'_>,
    ) -> Result<ExclusionVerdict> {
        for policy in &self.policies {
            let verdict = policy.evaluate(commit, ctx)?;
            if verdict != ExclusionVerdict::Abstain {
                tracing::debug!(
                    policy = policy.name(),
                    commit = %commit.id,
                    verdict = %verdict,
                    "exclusion chain decided"
                );
                return Ok(verdict);
            }
        }
        Ok(ExclusionVerdict::Abstain)
    }

    /// True only for an explicit `Exclude`; `Include` and abstention both
    /// mean the commit counts.
    pub fn is_excluded(&self, commit: &CommitChange, ctx: &ExclusionContext<'_>) -> Result<bool> {
        Ok(self.evaluate(commit, ctx)? == ExclusionVerdict::Exclude)
    }

    /// A revision is excluded only when every commit leading to it is.
    ///
    /// An empty change list is not excluded. Evaluation stops at the first
    /// commit that counts as a change.
    pub fn is_revision_excluded(
        &self,
        changes: &[CommitChange],
        ctx: &ExclusionContext<'_>,
    ) -> Result<bool> {
        if changes.is_empty() {
            return Ok(false);
        }
        for change in changes {
            if !self.is_excluded(change, ctx)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Fold every policy's requirement; fails on `Cli` vs `Embedded`.
    pub fn required_client(&self) -> Result<ClientCapability> {
        ClientCapability::merge_all(self.policies.iter().map(|p| p.required_client()))
    }

    pub fn requires_workspace_for_polling(&self) -> bool {
        self.policies
            .iter()
            .any(|p| p.requires_workspace_for_polling())
    }
}

impl fmt::Debug for ExclusionChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExclusionChain")
            .field("policies", &self.names())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// The concrete policy a config entry describes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PolicyKind {
    /// Newline-separated author names.
    UserExclusion { excluded_users: String },
    /// Regular expression searched in the commit message.
    MessageExclusion { excluded_message: String },
    /// Newline-separated path regexes.
    PathRestriction {
        #[serde(default)]
        included_regions: String,
        #[serde(default)]
        excluded_regions: String,
    },
    /// Ignore every commit of the repository.
    PollExclusion,
    /// Comma-separated branch names, matched without the remote prefix.
    BranchRestriction {
        #[serde(default)]
        whitelist: String,
        #[serde(default)]
        blacklist: String,
    },
}

/// One `[[policies]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyConfig {
    #[serde(flatten)]
    pub kind: PolicyKind,
    /// Overrides the policy's own backend requirement unless `any`.
    #[serde(default)]
    pub requires_client: ClientCapability,
}

impl PolicyConfig {
    pub fn new(kind: PolicyKind) -> Self {
        Self {
            kind,
            requires_client: ClientCapability::Any,
        }
    }

    pub fn requiring(mut self, capability: ClientCapability) -> Self {
        self.requires_client = capability;
        self
    }

    pub fn build(&self) -> Result<Box<dyn ExclusionPolicy>> {
        let policy: Box<dyn ExclusionPolicy> = match &self.kind {
            PolicyKind::UserExclusion { excluded_users } => {
                Box::new(UserExclusion::new(excluded_users))
            }
            PolicyKind::MessageExclusion { excluded_message } => {
                Box::new(MessageExclusion::new(excluded_message))
            }
            PolicyKind::PathRestriction {
                included_regions,
                excluded_regions,
            } => Box::new(PathRestriction::new(included_regions, excluded_regions)?),
            PolicyKind::PollExclusion => Box::new(PollExclusion),
            PolicyKind::BranchRestriction {
                whitelist,
                blacklist,
            } => Box::new(BranchRestriction::new(whitelist, blacklist)),
        };
        Ok(match self.requires_client {
            ClientCapability::Any => policy,
            capability => Box::new(RequiresClient {
                inner: policy,
                capability,
            }),
        })
    }
}

/// Build a chain from config entries, in order.
pub fn build_chain(configs: &[PolicyConfig]) -> Result<ExclusionChain> {
    let mut chain = ExclusionChain::new();
    for config in configs {
        chain.push(config.build()?);
    }
    Ok(chain)
}

/// Pins a policy to a specific backend.
struct RequiresClient {
    inner: Box<dyn ExclusionPolicy>,
    capability: ClientCapability,
}

impl ExclusionPolicy for RequiresClient {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn evaluate(
        &self,
        commit: &CommitChange,
        ctx: &ExclusionContext<'_>,
    ) -> Result<ExclusionVerdict> {
        self.inner.evaluate(commit, ctx)
    }

    fn required_client(&self) -> ClientCapability {
        self.capability
    }

    fn requires_workspace_for_polling(&self) -> bool {
        self.inner.requires_workspace_for_polling()
    }
}
