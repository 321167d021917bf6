//! Decide by the branches that contain a commit.

use std::collections::BTreeSet;

use crate::domain::change::CommitChange;
use crate::domain::error::Result;
use crate::obs;

use super::{ExclusionContext, ExclusionPolicy, ExclusionVerdict};

/// Whitelists or blacklists commits by branch name.
///
/// Names are compared without their remote, so `origin/release` is checked
/// as `release`. Branches containing the commit are visited in repository
/// order:
///
/// - with a whitelist, the first branch decides: `Include` when it is
///   listed, `Exclude` otherwise;
/// - without one, the first blacklisted branch excludes the commit.
///
/// Anything else abstains. This is the only built-in policy that can force
/// a commit in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchRestriction {
    whitelist: BTreeSet<String>,
    blacklist: BTreeSet<String>,
}

fn split_names(list: &str) -> BTreeSet<String> {
    list.split(',')
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .collect()
}

fn local_name(branch: &str) -> &str {
    branch.split_once('/').map_or(branch, |(_, name)| name)
}

fn render(names: &BTreeSet<String>) -> String {
    format!("[{}]", names.iter().map(String::as_str).collect::<Vec<_>>().join(", "))
}

impl BranchRestriction {
    /// Parse comma-separated branch names. Entries are trimmed and blanks
    /// dropped.
    pub fn new(whitelist: &str, blacklist: &str) -> Self {
        Self {
            whitelist: split_names(whitelist),
            blacklist: split_names(blacklist),
        }
    }

    pub fn whitelist(&self) -> &BTreeSet<String> {
        &self.whitelist
    }

    pub fn blacklist(&self) -> &BTreeSet<String> {
        &self.blacklist
    }
}

impl ExclusionPolicy for BranchRestriction {
    fn name(&self) -> &'static str {
        "branch_restriction"
    }

    fn evaluate(
        &self,
        commit: &CommitChange,
        ctx: &ExclusionContext<'_>,
    ) -> Result<ExclusionVerdict> {
        if self.whitelist.is_empty() && self.blacklist.is_empty() {
            return Ok(ExclusionVerdict::Abstain);
        }

        for branch in ctx.repo.branches_containing(&commit.id)? {
            let name = local_name(&branch);
            let (verdict, result) = if !self.whitelist.is_empty() {
                if self.whitelist.contains(name) {
                    (Some(ExclusionVerdict::Include), "whitelisted.")
                } else {
                    (Some(ExclusionVerdict::Exclude), "not in whitelist.")
                }
            } else if self.blacklist.contains(name) {
                (Some(ExclusionVerdict::Exclude), "blacklisted.")
            } else {
                (None, "not in blacklist.")
            };

            ctx.log.info(&format!(
                "Checking branch {name} against whitelist {} and blacklist {} with result: {result}",
                render(&self.whitelist),
                render(&self.blacklist),
            ));

            match verdict {
                Some(ExclusionVerdict::Exclude) => {
                    obs::emit_commit_excluded(self.name(), commit.id.as_str(), name);
                    return Ok(ExclusionVerdict::Exclude);
                }
                Some(verdict) => return Ok(verdict),
                None => continue,
            }
        }
        Ok(ExclusionVerdict::Abstain)
    }

    fn requires_workspace_for_polling(&self) -> bool {
        true
    }
}
