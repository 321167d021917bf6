//! Inverse chooser: build every branch except the configured ones.

use crate::branch_spec::{compile_specs, BranchSpec};
use crate::commit_order::CommitOrder;
use crate::domain::error::Result;
use crate::domain::revision::{revisions_from_tips, Revision};
use crate::obs;
use crate::repository::RepositoryAccess;

use super::{BuildChooser, ChooserContext, HEAD_SPEC};

pub const EVERYTHING_EXCLUDED: &str =
    "All branches were excluded from being built. The branch specifiers may be too broad; \
     the default chooser builds only the matching branches instead.";

pub const BUILDING_LAST_REVISION: &str =
    "No new revisions were found; building the most recently built revision again.";

/// Selects every branch tip that matches none of the configured specs.
///
/// The symbolic `*/HEAD` ref is always excluded. The single-branch hint is
/// ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct InverseChooser;

impl BuildChooser for InverseChooser {
    fn name(&self) -> &'static str {
        "inverse"
    }

    fn candidate_revisions(
        &self,
        is_poll: bool,
        _single_branch: Option<&str>,
        repo: &dyn RepositoryAccess,
        ctx: &ChooserContext<'_>,
    ) -> Result<Vec<Revision>> {
        let tips = repo.list_branch_tips()?;
        obs::emit_selection_started(self.name(), is_poll, tips.len());

        let mut excluded = compile_specs(ctx.branches, ctx.env)?;
        excluded.push(BranchSpec::new(HEAD_SPEC).pattern(ctx.env)?);

        // Drop excluded names from each working copy, then revisions left
        // with no name at all.
        let mut revisions = revisions_from_tips(tips);
        for rev in revisions.iter_mut() {
            rev.branches
                .retain(|b| !excluded.iter().any(|p| p.is_match(&b.name)));
        }
        revisions.retain(|r| !r.branches.is_empty());

        let mut revisions = repo.filter_tip_branches(revisions)?;

        if revisions.is_empty() {
            ctx.log.warn(EVERYTHING_EXCLUDED);
            obs::emit_all_excluded(self.name());
        }

        revisions.retain(|r| !ctx.history.has_been_built(&r.sha1));

        if !is_poll && revisions.is_empty() {
            if let Some(last) = ctx.history.last_built_revision() {
                ctx.log.info(BUILDING_LAST_REVISION);
                obs::emit_rerun_last_build(self.name(), last.sha1.as_str());
                obs::emit_selection_finished(self.name(), is_poll, 1);
                return Ok(vec![last]);
            }
        }

        let sorted = CommitOrder::new(repo).sort(revisions)?;
        obs::emit_selection_finished(self.name(), is_poll, sorted.len());
        Ok(sorted)
    }
}
