//! Ignore every commit of a repository.

use crate::domain::change::CommitChange;
use crate::domain::error::Result;
use crate::obs;

use super::{ExclusionContext, ExclusionPolicy, ExclusionVerdict};

/// Vetoes every commit, so polling never reports a change.
///
/// Builds started some other way still pick revisions normally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollExclusion;

impl ExclusionPolicy for PollExclusion {
    fn name(&self) -> &'static str {
        "poll_exclusion"
    }

    fn evaluate(
        &self,
        commit: &CommitChange,
        ctx: &ExclusionContext<'_>,
    ) -> Result<ExclusionVerdict> {
        ctx.log
            .info(&format!("Ignored commit {}: Repository excluded", commit.id));
        obs::emit_commit_excluded(self.name(), commit.id.as_str(), "repository excluded");
        Ok(ExclusionVerdict::Exclude)
    }
}
