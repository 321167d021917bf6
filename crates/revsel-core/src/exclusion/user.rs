//! Ignore commits made by specific authors.

use std::collections::BTreeSet;

use crate::domain::change::CommitChange;
use crate::domain::error::Result;
use crate::obs;

use super::{ExclusionContext, ExclusionPolicy, ExclusionVerdict};

/// Vetoes commits whose author name is in a configured set.
///
/// Never force-includes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserExclusion {
    excluded: BTreeSet<String>,
}

impl UserExclusion {
    /// Parse newline-separated author names. Each line is trimmed; blank lines
    /// and duplicates are dropped.
    pub fn new(excluded_users: &str) -> Self {
        let excluded = excluded_users
            .split(['\r', '\n'])
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(str::to_string)
            .collect();
        Self { excluded }
    }

    pub fn excluded_users(&self) -> &BTreeSet<String> {
        &self.excluded
    }
}

impl ExclusionPolicy for UserExclusion {
    fn name(&self) -> &'static str {
        "user_exclusion"
    }

    fn evaluate(
        &self,
        commit: &CommitChange,
        ctx: &ExclusionContext<'_>,
    ) -> Result<ExclusionVerdict> {
        let author = commit.author_name.as_str();
        if !self.excluded.contains(author) {
            return Ok(ExclusionVerdict::Abstain);
        }
        ctx.log.info(&format!(
            "Ignored commit {}: Found excluded author: {author}",
            commit.id
        ));
        obs::emit_commit_excluded(self.name(), commit.id.as_str(), author);
        Ok(ExclusionVerdict::Exclude)
    }

    fn requires_workspace_for_polling(&self) -> bool {
        true
    }
}
