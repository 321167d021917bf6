//! Build choosers: turn a repository snapshot into the revisions to build.

pub mod ancestry;
pub mod default;
pub mod inverse;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::branch_spec::{BranchSpec, EnvVars};
use crate::domain::error::Result;
use crate::domain::revision::Revision;
use crate::history::BuildHistory;
use crate::log::BuildLog;
use crate::repository::RepositoryAccess;

pub use ancestry::{AncestryChooser, AncestryOptions};
pub use default::DefaultChooser;
pub use inverse::InverseChooser;

/// Implicit spec for the symbolic default-branch ref (`origin/HEAD`).
pub(crate) const HEAD_SPEC: &str = "*/HEAD";

/// Everything a chooser reads besides the repository itself.
///
/// Borrowed for one selection pass.
pub struct ChooserContext<'a> {
    /// Configured branch specs, in configured order.
    pub branches: &'a [BranchSpec],
    /// Remote names used to qualify single-branch hints.
    pub remotes: &'a [String],
    pub env: &'a EnvVars,
    pub history: &'a dyn BuildHistory,
    pub log: &'a dyn BuildLog,
}

/// Strategy that produces the candidate revisions for a poll or build.
pub trait BuildChooser: Send + Sync {
    fn name(&self) -> &'static str;

    /// Candidate revisions, oldest first.
    ///
    /// `is_poll` is true when only checking for new work. `single_branch` is
    /// a branch hint for choosers that support building one named branch.
    /// Repository errors abort the pass.
    fn candidate_revisions(
        &self,
        is_poll: bool,
        single_branch: Option<&str>,
        repo: &dyn RepositoryAccess,
        ctx: &ChooserContext<'_>,
    ) -> Result<Vec<Revision>>;
}

/// Which chooser a configuration selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChooserKind {
    /// Build branches matching the configured specs.
    #[default]
    Default,
    /// Build every branch except the ones matching the configured specs.
    Inverse,
    /// Default selection limited by commit age and a required ancestor.
    Ancestry,
}

impl ChooserKind {
    /// The chooser with its default options; an ancestry chooser built this
    /// way filters nothing.
    pub fn build(self) -> Box<dyn BuildChooser> {
        match self {
            ChooserKind::Default => Box::new(DefaultChooser),
            ChooserKind::Inverse => Box::new(InverseChooser),
            ChooserKind::Ancestry => Box::new(AncestryChooser::default()),
        }
    }
}

impl fmt::Display for ChooserKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChooserKind::Default => write!(f, "default"),
            ChooserKind::Inverse => write!(f, "inverse"),
            ChooserKind::Ancestry => write!(f, "ancestry"),
        }
    }
}
